use serde::{Deserialize, Serialize};

use crate::annotation::{Color, Colors};
use crate::layout::{CellKind, CommentKind, GroupKind, ScopeKind, StatementKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub background: String,
    pub line_color: String,
    pub box_background: String,
    pub box_foreground: String,
    pub badge_background: String,
    pub badge_foreground: String,
    pub comment_background: String,
    pub comment_foreground: String,
    pub comment_line_color: String,
    pub doc_link_background: String,
    pub doc_link_foreground: String,
    pub file_scope_background: String,
    pub function_scope_background: String,
    pub class_scope_background: String,
    pub decorator_scope_background: String,
    pub for_scope_background: String,
    pub while_scope_background: String,
    pub else_scope_background: String,
    pub with_scope_background: String,
    pub try_scope_background: String,
    pub except_scope_background: String,
    pub finally_scope_background: String,
    pub break_background: String,
    pub continue_background: String,
    pub if_background: String,
    pub return_background: String,
    pub raise_background: String,
    pub assert_background: String,
    pub sys_exit_background: String,
    pub import_background: String,
    pub group_background: String,
    pub group_border: String,
}

/// Fill, text and border colors resolved for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellColors {
    pub background: String,
    pub foreground: String,
    pub border: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            background: "#ffffff".to_string(),
            line_color: "#101010".to_string(),
            box_background: "#fafafa".to_string(),
            box_foreground: "#000000".to_string(),
            badge_background: "#e6e6e6".to_string(),
            badge_foreground: "#000000".to_string(),
            comment_background: "#ffff99".to_string(),
            comment_foreground: "#000000".to_string(),
            comment_line_color: "#66663d".to_string(),
            doc_link_background: "#e6f2ff".to_string(),
            doc_link_foreground: "#1a1a99".to_string(),
            file_scope_background: "#ffffe6".to_string(),
            function_scope_background: "#e6e6ff".to_string(),
            class_scope_background: "#e6ffe6".to_string(),
            decorator_scope_background: "#e6ffff".to_string(),
            for_scope_background: "#bbdefb".to_string(),
            while_scope_background: "#bbdefb".to_string(),
            else_scope_background: "#d1c4e9".to_string(),
            with_scope_background: "#ffffff".to_string(),
            try_scope_background: "#ffffff".to_string(),
            except_scope_background: "#ffffff".to_string(),
            finally_scope_background: "#c0c0c0".to_string(),
            break_background: "#90caf9".to_string(),
            continue_background: "#90caf9".to_string(),
            if_background: "#ffe57f".to_string(),
            return_background: "#fff7bc".to_string(),
            raise_background: "#ffb380".to_string(),
            assert_background: "#ffe57f".to_string(),
            sys_exit_background: "#ff9c9c".to_string(),
            import_background: "#fafafa".to_string(),
            group_background: "#f5ffff".to_string(),
            group_border: "#969696".to_string(),
        }
    }

    pub fn monochrome() -> Self {
        let light = "#ffffff".to_string();
        let shade = "#eeeeee".to_string();
        Self {
            background: light.clone(),
            line_color: "#000000".to_string(),
            box_background: light.clone(),
            box_foreground: "#000000".to_string(),
            badge_background: shade.clone(),
            badge_foreground: "#000000".to_string(),
            comment_background: light.clone(),
            comment_foreground: "#333333".to_string(),
            comment_line_color: "#666666".to_string(),
            doc_link_background: light.clone(),
            doc_link_foreground: "#000000".to_string(),
            file_scope_background: light.clone(),
            function_scope_background: shade.clone(),
            class_scope_background: shade.clone(),
            decorator_scope_background: light.clone(),
            for_scope_background: shade.clone(),
            while_scope_background: shade.clone(),
            else_scope_background: light.clone(),
            with_scope_background: light.clone(),
            try_scope_background: light.clone(),
            except_scope_background: light.clone(),
            finally_scope_background: shade.clone(),
            break_background: shade.clone(),
            continue_background: shade.clone(),
            if_background: shade.clone(),
            return_background: light.clone(),
            raise_background: shade.clone(),
            assert_background: shade.clone(),
            sys_exit_background: shade.clone(),
            import_background: light.clone(),
            group_background: light,
            group_border: "#808080".to_string(),
        }
    }

    pub fn scope_background(&self, scope: ScopeKind) -> &str {
        match scope {
            ScopeKind::File => &self.file_scope_background,
            ScopeKind::Function => &self.function_scope_background,
            ScopeKind::Class => &self.class_scope_background,
            ScopeKind::Decorator => &self.decorator_scope_background,
            ScopeKind::For => &self.for_scope_background,
            ScopeKind::While => &self.while_scope_background,
            ScopeKind::Else(_) => &self.else_scope_background,
            ScopeKind::With => &self.with_scope_background,
            ScopeKind::Try => &self.try_scope_background,
            ScopeKind::Except => &self.except_scope_background,
            ScopeKind::Finally => &self.finally_scope_background,
        }
    }

    fn statement_background(&self, kind: StatementKind) -> &str {
        match kind {
            StatementKind::CodeBlock => &self.box_background,
            StatementKind::Break => &self.break_background,
            StatementKind::Continue => &self.continue_background,
            StatementKind::Return => &self.return_background,
            StatementKind::Raise => &self.raise_background,
            StatementKind::Assert => &self.assert_background,
            StatementKind::SysExit => &self.sys_exit_background,
            StatementKind::Import => &self.import_background,
        }
    }

    /// Colors for a cell after applying its `cc` overrides. Cells that paint
    /// nothing get `None`.
    pub fn colors_for(&self, kind: &CellKind, overrides: &Colors) -> Option<CellColors> {
        let (background, foreground, border) = match kind {
            CellKind::Vacant
            | CellKind::VSpacer
            | CellKind::HGroupSpacer { .. }
            | CellKind::Canvas(_) => return None,
            CellKind::Connector(_) => (
                self.background.as_str(),
                self.line_color.as_str(),
                self.line_color.as_str(),
            ),
            CellKind::ScopeEdge { scope, .. } | CellKind::Scope { scope, .. } => (
                self.scope_background(*scope),
                self.box_foreground.as_str(),
                self.line_color.as_str(),
            ),
            CellKind::Statement { kind, .. } => (
                self.statement_background(*kind),
                self.box_foreground.as_str(),
                self.line_color.as_str(),
            ),
            CellKind::If { .. } => (
                self.if_background.as_str(),
                self.box_foreground.as_str(),
                self.line_color.as_str(),
            ),
            CellKind::Comment {
                kind, minimized, ..
            } => {
                if *minimized {
                    (
                        self.badge_background.as_str(),
                        self.badge_foreground.as_str(),
                        self.comment_line_color.as_str(),
                    )
                } else if *kind == CommentKind::Leading || *kind == CommentKind::Side {
                    (
                        self.comment_background.as_str(),
                        self.comment_foreground.as_str(),
                        self.comment_line_color.as_str(),
                    )
                } else {
                    (
                        self.comment_background.as_str(),
                        self.comment_foreground.as_str(),
                        self.line_color.as_str(),
                    )
                }
            }
            CellKind::Doc { .. } => (
                self.doc_link_background.as_str(),
                self.doc_link_foreground.as_str(),
                self.comment_line_color.as_str(),
            ),
            CellKind::Group(group) => match group.kind {
                GroupKind::OpenBegin | GroupKind::OpenEnd => (
                    self.group_background.as_str(),
                    self.box_foreground.as_str(),
                    self.group_border.as_str(),
                ),
                GroupKind::Empty | GroupKind::Collapsed => (
                    self.box_background.as_str(),
                    self.box_foreground.as_str(),
                    self.group_border.as_str(),
                ),
            },
        };
        Some(resolve(overrides, background, foreground, border))
    }

    /// Colors of an open group frame after its `gb` overrides.
    pub fn group_frame_colors(&self, overrides: &Colors) -> CellColors {
        resolve(
            overrides,
            &self.group_background,
            &self.box_foreground,
            &self.group_border,
        )
    }
}

fn resolve(overrides: &Colors, background: &str, foreground: &str, border: &str) -> CellColors {
    let pick = |custom: Option<Color>, base: &str| {
        custom.map(|color| color.to_hex()).unwrap_or_else(|| base.to_string())
    };
    CellColors {
        background: pick(overrides.background, background),
        foreground: pick(overrides.foreground, foreground),
        border: pick(overrides.border, border),
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
