use super::cell::Style;
use super::error::LayoutError;
use super::types::{
    BadgeLayout, CanvasId, Cell, CellKind, ConnectorRole, ConnectorSegment, Dir, GroupKind,
    GroupRect, Grid, ScopePart,
};

#[derive(Debug, Default)]
pub(super) struct Drawing {
    pub connectors: Vec<ConnectorSegment>,
    pub badges: Vec<BadgeLayout>,
    pub groups: Vec<GroupRect>,
}

/// Assigns absolute coordinates to every canvas and cell, top-left first,
/// and collects the line segments, badges and group frames.
pub(super) fn place(grid: &mut Grid, style: &Style<'_>) -> Result<Drawing, LayoutError> {
    let mut drawing = Drawing::default();
    draw_canvas(grid, Grid::ROOT, 0.0, 0.0, style, &mut drawing)?;
    Ok(drawing)
}

fn draw_canvas(
    grid: &mut Grid,
    canvas: CanvasId,
    base_x: f32,
    base_y: f32,
    style: &Style<'_>,
    drawing: &mut Drawing,
) -> Result<(), LayoutError> {
    let mut nested = Vec::new();
    let current = grid.canvas_mut(canvas)?;
    current.x = base_x;
    current.y = base_y;
    let mut y = base_y;
    for cells in current.rows.iter_mut() {
        let height = cells.first().map(|cell| cell.height).unwrap_or(0.0);
        let mut x = base_x;
        for cell in cells.iter_mut() {
            cell.x = x;
            cell.y = y;
            if let Some(child) = cell.nested_canvas() {
                nested.push((child, x, y));
            }
            x += cell.width;
        }
        y += height;
    }

    let rows = &grid.canvas(canvas)?.rows;
    for (row, cells) in rows.iter().enumerate() {
        for column in 0..cells.len() {
            emit_cell(canvas, rows, row, column, style, drawing);
        }
    }
    for (child, x, y) in nested {
        draw_canvas(grid, child, x, y, style, drawing)?;
    }
    Ok(())
}

/// Vertical position of the horizontal flow through a row: the middle of the
/// nearest content box to the left, or the middle of the row.
fn flow_y(cells: &[Cell], column: usize) -> f32 {
    let row_top = cells.first().map(|cell| cell.y).unwrap_or(0.0);
    let content = cells[..column].iter().rev().find(|cell| {
        !matches!(
            cell.kind,
            CellKind::Connector(_)
                | CellKind::Vacant
                | CellKind::VSpacer
                | CellKind::HGroupSpacer { .. }
        )
    });
    match content {
        Some(cell) => row_top + cell.min_height / 2.0,
        None => cells
            .get(column)
            .map(|cell| cell.y + cell.height / 2.0)
            .unwrap_or(row_top),
    }
}

fn emit_cell(
    canvas: CanvasId,
    rows: &[Vec<Cell>],
    row: usize,
    column: usize,
    style: &Style<'_>,
    drawing: &mut Drawing,
) {
    let c = style.config;
    let cells = &rows[row];
    let cell = &cells[column];
    let main_x = cell.x + c.main_line + c.group_shift(cell.h_shift);
    let segment = |role: ConnectorRole, points: Vec<(f32, f32)>| ConnectorSegment {
        canvas,
        column,
        row,
        role,
        points,
    };
    match &cell.kind {
        CellKind::Connector(connector) => {
            let center_y = flow_y(cells, column);
            let point = |dir: Dir| match dir {
                Dir::North => (main_x, cell.y),
                Dir::South => (main_x, cell.y + cell.height),
                Dir::West => (cell.x, center_y),
                Dir::East => (cell.x + cell.width, center_y),
                Dir::Center => (main_x, center_y),
            };
            for &(from, to) in &connector.connections {
                let straight = from == Dir::Center
                    || to == Dir::Center
                    || (from.is_vertical() && to.is_vertical())
                    || (from.is_horizontal() && to.is_horizontal());
                let points = if straight {
                    vec![point(from), point(to)]
                } else {
                    vec![point(from), point(Dir::Center), point(to)]
                };
                drawing.connectors.push(segment(connector.role, points));
            }
        }
        CellKind::Statement { .. } | CellKind::If { .. } => {
            let top = cell.y + c.v_cell_padding;
            drawing
                .connectors
                .push(segment(ConnectorRole::Plain, vec![(main_x, cell.y), (main_x, top)]));
            if !cell.is_terminal() {
                let bottom = cell.y + cell.min_height - c.v_cell_padding;
                drawing.connectors.push(segment(
                    ConnectorRole::Plain,
                    vec![(main_x, bottom), (main_x, cell.y + cell.height)],
                ));
            }
        }
        CellKind::Scope {
            scope,
            part: ScopePart::TopLeft,
            content,
            ..
        } => {
            if scope.has_declaration(&content.text) {
                return;
            }
            let Some(text) = scope.badge() else {
                return;
            };
            let (width, height) = style.badge_size(text);
            drawing.badges.push(BadgeLayout {
                text: text.to_string(),
                canvas,
                column,
                row,
                x: cell.x + c.scope_rect_radius,
                y: cell.y - height / 2.0,
                width,
                height,
            });
        }
        CellKind::Group(group) if group.kind == GroupKind::OpenBegin => {
            let end_height = group
                .end
                .and_then(|(end_row, _)| rows.get(end_row))
                .and_then(|end| end.first())
                .map(|first| first.height)
                .unwrap_or(0.0);
            drawing.groups.push(GroupRect {
                id: group.id.clone(),
                title: group.title.clone(),
                colors: group.colors,
                depth: group.self_max,
                x: cell.x,
                y: cell.y,
                width: group.group_width,
                height: cell.height + group.group_height + end_height,
            });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Colors;
    use crate::config::LayoutConfig;
    use crate::ir::SourceRange;
    use crate::layout::builder::put;
    use crate::layout::measure::render;
    use crate::layout::types::{Connector, Content, ScopeKind, StatementKind, CONN_N_S, CONN_W_S};
    use crate::text_metrics::MonospaceMetrics;

    fn metrics() -> MonospaceMetrics {
        MonospaceMetrics {
            text_size: 10.0,
            badge_size: 5.0,
            line_height: 1.0,
        }
    }

    fn statement(kind: StatementKind, text: &str) -> CellKind {
        CellKind::Statement {
            kind,
            content: Content {
                text: text.to_string(),
                range: SourceRange::line(1),
                colors: Colors::default(),
            },
        }
    }

    #[test]
    fn cells_are_placed_left_to_right_top_to_bottom() {
        let mut grid = Grid::default();
        let root = grid.add_canvas(None, 0, 0);
        grid.canvas_mut(root).unwrap().is_no_scope = true;
        put(&mut grid, root, 0, 0, statement(StatementKind::CodeBlock, "a")).unwrap();
        put(&mut grid, root, 0, 1, statement(StatementKind::CodeBlock, "b")).unwrap();
        put(&mut grid, root, 1, 0, statement(StatementKind::Return, "x")).unwrap();
        let config = LayoutConfig::default();
        let metrics = metrics();
        let style = Style::new(&config, &metrics);
        render(&mut grid, root, &style).unwrap();
        let drawing = place(&mut grid, &style).unwrap();

        let canvas = grid.canvas(root).unwrap();
        assert_eq!(canvas.rows[0][1].x, canvas.rows[0][0].width);
        assert_eq!(canvas.rows[1][0].y, canvas.rows[0][0].height);
        // Two stubs per non-terminal statement, one for the return.
        assert_eq!(drawing.connectors.len(), 5);
    }

    #[test]
    fn angled_connectors_route_through_the_center() {
        let mut grid = Grid::default();
        let root = grid.add_canvas(None, 0, 0);
        grid.canvas_mut(root).unwrap().is_no_scope = true;
        put(
            &mut grid,
            root,
            0,
            0,
            CellKind::Connector(Connector::new(CONN_W_S)),
        )
        .unwrap();
        put(
            &mut grid,
            root,
            1,
            0,
            CellKind::Connector(Connector::new(CONN_N_S)),
        )
        .unwrap();
        let config = LayoutConfig::default();
        let metrics = metrics();
        let style = Style::new(&config, &metrics);
        render(&mut grid, root, &style).unwrap();
        let drawing = place(&mut grid, &style).unwrap();
        assert_eq!(drawing.connectors[0].points.len(), 3);
        assert_eq!(drawing.connectors[1].points.len(), 2);
        let (x, _) = drawing.connectors[1].points[0];
        assert_eq!(x, config.main_line);
    }

    #[test]
    fn keyword_scopes_get_a_badge() {
        let mut grid = Grid::default();
        let root = grid.add_canvas(None, 0, 0);
        grid.canvas_mut(root).unwrap().scope = Some(ScopeKind::Finally);
        put(
            &mut grid,
            root,
            0,
            0,
            CellKind::Scope {
                scope: ScopeKind::Finally,
                part: ScopePart::TopLeft,
                content: Content {
                    text: String::new(),
                    range: SourceRange::line(1),
                    colors: Colors::default(),
                },
                leader: Some(1),
                side_comment: false,
            },
        )
        .unwrap();
        let config = LayoutConfig::default();
        let metrics = metrics();
        let style = Style::new(&config, &metrics);
        render(&mut grid, root, &style).unwrap();
        let drawing = place(&mut grid, &style).unwrap();
        assert_eq!(drawing.badges.len(), 1);
        assert_eq!(drawing.badges[0].text, "finally");
    }
}
