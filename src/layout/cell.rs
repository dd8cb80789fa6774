use crate::config::LayoutConfig;
use crate::text_metrics::{FontRole, TextMetrics};

use super::text::{measure_text, return_text};
use super::types::{
    CellKind, CommentKind, DocKind, GroupKind, ScopeEdge, ScopePart, StatementKind,
};

/// Spacing constants plus the text metrics used to size cells.
pub struct Style<'a> {
    pub config: &'a LayoutConfig,
    pub metrics: &'a dyn TextMetrics,
}

impl<'a> Style<'a> {
    pub fn new(config: &'a LayoutConfig, metrics: &'a dyn TextMetrics) -> Self {
        Self { config, metrics }
    }

    fn text_box(&self, text: &str) -> (f32, f32) {
        let block = measure_text(text, FontRole::Text, self.metrics);
        (block.width, block.height)
    }

    /// Size of a keyword badge or of the label of a minimized item.
    pub fn badge_size(&self, text: &str) -> (f32, f32) {
        let block = measure_text(text, FontRole::Badge, self.metrics);
        (
            block.width + 2.0 * self.config.badge_h_spacing,
            block.height + 2.0 * self.config.badge_v_spacing,
        )
    }

    /// Standard box around text: cell padding plus text padding on each side.
    fn boxed(&self, text: &str) -> (f32, f32) {
        let c = self.config;
        let (tw, th) = self.text_box(text);
        (
            tw + 2.0 * (c.h_cell_padding + c.h_text_padding),
            th + 2.0 * (c.v_cell_padding + c.v_text_padding),
        )
    }
}

pub const COMMENT_BADGE: &str = "...";
pub const DOC_BADGE: &str = "doc";

/// Intrinsic `(min_width, min_height)` of a cell. `nested` is the rendered
/// size of the canvas held by a canvas cell.
pub(super) fn intrinsic_size(
    kind: &CellKind,
    h_shift: usize,
    nested: Option<(f32, f32)>,
    style: &Style<'_>,
) -> (f32, f32) {
    let c = style.config;
    let (width, height) = match kind {
        CellKind::Vacant => (0.0, 0.0),
        CellKind::VSpacer => (0.0, c.v_spacer),
        CellKind::HGroupSpacer { count } => (c.group_shift(*count), 0.0),
        CellKind::ScopeEdge { edge, .. } => match edge {
            ScopeEdge::Side => (c.scope_rect_radius + c.h_cell_padding, 0.0),
            ScopeEdge::Corner => (
                c.scope_rect_radius + c.h_cell_padding,
                c.scope_rect_radius + c.v_cell_padding,
            ),
        },
        CellKind::Scope {
            part,
            content,
            side_comment,
            ..
        } => match part {
            ScopePart::TopLeft => (
                c.scope_rect_radius + c.h_cell_padding,
                c.scope_rect_radius + c.v_cell_padding,
            ),
            ScopePart::Declaration => {
                let (tw, th) = style.text_box(&content.text);
                let mut width = tw + c.h_header_padding - c.scope_rect_radius;
                let mut height = th + 2.0 * c.v_header_padding - c.scope_rect_radius;
                if *side_comment {
                    width += c.h_cell_padding;
                    height += 2.0 * c.v_text_padding;
                }
                (width, height)
            }
            ScopePart::Docstring => {
                let (tw, th) = style.text_box(&content.text);
                (
                    tw + 2.0 * (c.h_header_padding - c.scope_rect_radius),
                    th + 2.0 * c.v_header_padding,
                )
            }
        },
        CellKind::Statement { kind, content } => {
            let text = match kind {
                StatementKind::Return => return_text(&content.text),
                _ => content.text.clone(),
            };
            let (tw, th) = style.text_box(&text);
            let height = th + 2.0 * (c.v_cell_padding + c.v_text_padding);
            let plain = tw + 2.0 * (c.h_cell_padding + c.h_text_padding);
            let width = match kind {
                StatementKind::CodeBlock => plain.max(c.min_width),
                StatementKind::Return | StatementKind::Raise | StatementKind::SysExit => {
                    tw + 2.0 * c.h_cell_padding
                        + 3.0 * c.h_text_padding
                        + c.return_rect_radius
                        + c.icon_width
                }
                StatementKind::Break | StatementKind::Continue => plain,
                StatementKind::Assert => {
                    let marker = style.metrics.line_width("W", FontRole::Text);
                    plain + 2.0 * c.if_width + marker + 2.0 * c.h_text_padding
                }
                StatementKind::Import => {
                    tw + 2.0 * c.h_cell_padding + 4.0 * c.h_text_padding + c.icon_width
                }
            };
            (width, height)
        }
        CellKind::If { content, .. } => {
            let (width, height) = style.boxed(&content.text);
            (width + 2.0 * c.if_width, height)
        }
        CellKind::Comment {
            content, minimized, ..
        } => {
            if *minimized {
                let (bw, bh) = style.badge_size(COMMENT_BADGE);
                (bw + 2.0 * c.h_cell_padding, bh + 2.0 * c.v_cell_padding)
            } else {
                let (width, height) = style.boxed(&content.text);
                (width.max(c.min_width), height)
            }
        }
        CellKind::Doc { doc, minimized, .. } => {
            if *minimized {
                let (bw, bh) = style.badge_size(DOC_BADGE);
                (bw + 2.0 * c.h_cell_padding, bh + 2.0 * c.v_cell_padding)
            } else {
                style.boxed(doc.display_text())
            }
        }
        CellKind::Connector(connector) => {
            let width = if connector.has_vertical() {
                c.main_line + c.h_cell_padding
            } else {
                0.0
            };
            let height = if connector.has_horizontal() {
                2.0 * c.v_cell_padding
            } else {
                0.0
            };
            (width, height)
        }
        CellKind::Canvas(_) => nested.unwrap_or((0.0, 0.0)),
        CellKind::Group(group) => match group.kind {
            GroupKind::OpenBegin | GroupKind::OpenEnd => (0.0, c.open_group_v_spacer),
            GroupKind::Empty | GroupKind::Collapsed => {
                let (width, height) = style.boxed(group.display_title());
                (width + c.group_marker_shift, height + c.group_marker_shift)
            }
        },
    };
    (width + c.group_shift(h_shift), height)
}

/// Width a comment-like cell needs for its box before borrowing space from
/// the cell on its left.
pub(super) fn comment_box_width(kind: &CellKind, min_width: f32, config: &LayoutConfig) -> f32 {
    match kind {
        CellKind::Comment {
            minimized: true, ..
        } => min_width - 2.0 * config.h_cell_padding,
        _ => min_width,
    }
}

/// Whether a comment-like cell borrows spare width from its left
/// neighbour, and how that spare is computed.
pub(super) enum Borrow {
    /// Spare is the neighbour width past the main line.
    PastMainLine,
    /// Spare is the neighbour width past its intrinsic width.
    PastIntrinsic,
    /// Only when the neighbour is a connector; spare past its intrinsic width.
    FromConnector,
    /// Only when the neighbour is a connector; spare past the main line.
    FromConnectorPastMainLine,
}

pub(super) fn borrow_rule(kind: &CellKind) -> Option<Borrow> {
    match kind {
        CellKind::Comment {
            kind, minimized, ..
        } => match (kind, minimized) {
            (CommentKind::Above, _) => None,
            (_, true) => Some(Borrow::FromConnectorPastMainLine),
            (CommentKind::Leading, false) => Some(Borrow::PastMainLine),
            (CommentKind::Side, false) => Some(Borrow::PastIntrinsic),
            (CommentKind::Independent, false) => Some(Borrow::FromConnector),
        },
        CellKind::Doc { kind, .. } => match kind {
            DocKind::Above => None,
            _ => Some(Borrow::FromConnector),
        },
        _ => None,
    }
}
