use crate::annotation::{Colors, DocLink, Warning};
use crate::ir::{FragmentKind, SourceRange};

use super::error::LayoutError;

#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
}

/// Index of a canvas in the [`Grid`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanvasId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElseOf {
    For,
    While,
    Try,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    File,
    Function,
    Class,
    Decorator,
    For,
    While,
    Try,
    With,
    Except,
    Else(ElseOf),
    Finally,
}

impl ScopeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Class => "class",
            Self::Decorator => "decorator",
            Self::For => "for",
            Self::While => "while",
            Self::Try => "try",
            Self::With => "with",
            Self::Except => "except",
            Self::Else(ElseOf::For) => "for-else",
            Self::Else(ElseOf::While) => "while-else",
            Self::Else(ElseOf::Try) => "try-else",
            Self::Finally => "finally",
        }
    }

    /// Keyword badge drawn on the top-left corner of scopes that have no
    /// declaration text of their own.
    pub fn badge(self) -> Option<&'static str> {
        match self {
            Self::Try => Some("try"),
            Self::Except => Some("except"),
            Self::Else(_) => Some("else"),
            Self::Finally => Some("finally"),
            _ => None,
        }
    }

    /// Whether a scope with this declaration text gets a declaration row.
    pub fn has_declaration(self, text: &str) -> bool {
        match self {
            Self::Try | Self::Else(_) | Self::Finally => false,
            Self::Except | Self::File => !text.trim().is_empty(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePart {
    TopLeft,
    Declaration,
    Docstring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEdge {
    Side,
    Corner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CodeBlock,
    Break,
    Continue,
    Return,
    Raise,
    Assert,
    SysExit,
    Import,
}

impl StatementKind {
    pub fn from_fragment(kind: FragmentKind) -> Option<Self> {
        match kind {
            FragmentKind::CodeBlock => Some(Self::CodeBlock),
            FragmentKind::Break => Some(Self::Break),
            FragmentKind::Continue => Some(Self::Continue),
            FragmentKind::Return => Some(Self::Return),
            FragmentKind::Raise => Some(Self::Raise),
            FragmentKind::Assert => Some(Self::Assert),
            FragmentKind::SysExit => Some(Self::SysExit),
            FragmentKind::Import => Some(Self::Import),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Break | Self::Continue | Self::Return | Self::Raise | Self::SysExit
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CodeBlock => "code-block",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Return => "return",
            Self::Raise => "raise",
            Self::Assert => "assert",
            Self::SysExit => "sys-exit",
            Self::Import => "import",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Leading,
    Side,
    Above,
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Leading,
    Above,
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    North,
    South,
    West,
    East,
    Center,
}

impl Dir {
    pub fn is_vertical(self) -> bool {
        matches!(self, Self::North | Self::South)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::West | Self::East)
    }
}

pub type Connection = (Dir, Dir);

pub const CONN_N_S: &[Connection] = &[(Dir::North, Dir::South)];
pub const CONN_W_S: &[Connection] = &[(Dir::West, Dir::South)];
pub const CONN_E_S: &[Connection] = &[(Dir::East, Dir::South)];
pub const CONN_N_W: &[Connection] = &[(Dir::North, Dir::West)];
pub const CONN_N_C: &[Connection] = &[(Dir::North, Dir::Center)];
pub const CONN_MERGE: &[Connection] = &[(Dir::North, Dir::South), (Dir::East, Dir::Center)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorRole {
    Plain,
    TopIf,
    BottomIf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    pub connections: Vec<Connection>,
    pub role: ConnectorRole,
}

impl Connector {
    pub fn new(connections: &[Connection]) -> Self {
        Self {
            connections: connections.to_vec(),
            role: ConnectorRole::Plain,
        }
    }

    pub fn with_role(connections: &[Connection], role: ConnectorRole) -> Self {
        Self {
            connections: connections.to_vec(),
            role,
        }
    }

    pub fn has_vertical(&self) -> bool {
        self.connections
            .iter()
            .any(|(from, to)| from.is_vertical() || to.is_vertical())
    }

    pub fn has_horizontal(&self) -> bool {
        self.connections
            .iter()
            .any(|(from, to)| from.is_horizontal() || to.is_horizontal())
    }

    /// A north-to-center stub replaces a suppressed terminal statement.
    pub fn is_half(&self) -> bool {
        self.connections.as_slice() == CONN_N_C
    }

    pub fn is_merge(&self) -> bool {
        self.connections.as_slice() == CONN_MERGE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub text: String,
    pub range: SourceRange,
    pub colors: Colors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    OpenBegin,
    OpenEnd,
    Empty,
    Collapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupCell {
    pub kind: GroupKind,
    pub id: String,
    pub title: Option<String>,
    pub colors: Colors,
    pub line: usize,
    pub nested: usize,
    /// Kind of the last enclosed fragment; `None` when the last enclosed item
    /// was a marker of a nested group.
    pub last_nested: Option<FragmentKind>,
    /// Address (row, column) of the begin marker, set on end markers.
    pub begin: Option<(usize, usize)>,
    /// Address (row, column) of the end marker, set on begin markers.
    pub end: Option<(usize, usize)>,
    pub self_and_deeper: usize,
    pub self_max: usize,
    pub is_terminal: bool,
    pub group_width: f32,
    pub group_height: f32,
}

impl GroupCell {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    Vacant,
    VSpacer,
    HGroupSpacer {
        count: usize,
    },
    ScopeEdge {
        scope: ScopeKind,
        edge: ScopeEdge,
    },
    Scope {
        scope: ScopeKind,
        part: ScopePart,
        content: Content,
        /// First line of the statement an else/except/finally scope belongs to.
        leader: Option<usize>,
        side_comment: bool,
    },
    Statement {
        kind: StatementKind,
        content: Content,
    },
    If {
        content: Content,
        switched: bool,
    },
    Comment {
        kind: CommentKind,
        content: Content,
        minimized: bool,
    },
    Doc {
        kind: DocKind,
        doc: DocLink,
        range: SourceRange,
        minimized: bool,
    },
    Connector(Connector),
    Canvas(CanvasId),
    Group(Box<GroupCell>),
}

impl CellKind {
    pub fn name(&self) -> String {
        match self {
            Self::Vacant => "vacant".to_string(),
            Self::VSpacer => "v-spacer".to_string(),
            Self::HGroupSpacer { .. } => "h-group-spacer".to_string(),
            Self::ScopeEdge {
                edge: ScopeEdge::Side,
                ..
            } => "scope-side-edge".to_string(),
            Self::ScopeEdge {
                edge: ScopeEdge::Corner,
                ..
            } => "scope-corner".to_string(),
            Self::Scope { scope, part, .. } => {
                let part = match part {
                    ScopePart::TopLeft => "top-left",
                    ScopePart::Declaration => "declaration",
                    ScopePart::Docstring => "docstring",
                };
                format!("{}-scope-{part}", scope.name())
            }
            Self::Statement { kind, .. } => kind.name().to_string(),
            Self::If { .. } => "if".to_string(),
            Self::Comment {
                kind, minimized, ..
            } => {
                let kind = match kind {
                    CommentKind::Leading => "leading",
                    CommentKind::Side => "side",
                    CommentKind::Above => "above",
                    CommentKind::Independent => "independent",
                };
                if *minimized {
                    format!("{kind}-minimized-comment")
                } else {
                    format!("{kind}-comment")
                }
            }
            Self::Doc { kind, .. } => match kind {
                DocKind::Leading => "leading-doc".to_string(),
                DocKind::Above => "above-doc".to_string(),
                DocKind::Independent => "independent-doc".to_string(),
            },
            Self::Connector(_) => "connector".to_string(),
            Self::Canvas(_) => "canvas".to_string(),
            Self::Group(group) => match group.kind {
                GroupKind::OpenBegin => "opened-group-begin".to_string(),
                GroupKind::OpenEnd => "opened-group-end".to_string(),
                GroupKind::Empty => "empty-group".to_string(),
                GroupKind::Collapsed => "collapsed-group".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub kind: CellKind,
    pub column: usize,
    pub row: usize,
    pub owner: CanvasId,
    pub min_width: f32,
    pub min_height: f32,
    pub width: f32,
    pub height: f32,
    pub x: f32,
    pub y: f32,
    pub h_shift: usize,
    pub tail_comment: bool,
}

impl Cell {
    pub fn new(kind: CellKind, owner: CanvasId, column: usize, row: usize) -> Self {
        Self {
            kind,
            column,
            row,
            owner,
            min_width: 0.0,
            min_height: 0.0,
            width: 0.0,
            height: 0.0,
            x: 0.0,
            y: 0.0,
            h_shift: 0,
            tail_comment: false,
        }
    }

    pub fn vacant(owner: CanvasId, column: usize, row: usize) -> Self {
        Self::new(CellKind::Vacant, owner, column, row)
    }

    pub fn is_terminal(&self) -> bool {
        match &self.kind {
            CellKind::Statement { kind, .. } => kind.is_terminal(),
            CellKind::Connector(connector) => connector.is_half(),
            _ => false,
        }
    }

    /// Connectors have no content of their own; interaction goes to the
    /// content cell they belong to. Badges are the other proxies, but they
    /// are emitted as [`BadgeLayout`] at placement time and never occupy a
    /// grid slot.
    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, CellKind::Connector(_))
    }

    pub fn is_vacant(&self) -> bool {
        matches!(self.kind, CellKind::Vacant)
    }

    pub fn is_comment_like(&self) -> bool {
        matches!(self.kind, CellKind::Comment { .. } | CellKind::Doc { .. })
    }

    pub fn is_scope_element(&self) -> bool {
        matches!(self.kind, CellKind::Scope { .. } | CellKind::ScopeEdge { .. })
    }

    pub fn group(&self) -> Option<&GroupCell> {
        match &self.kind {
            CellKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn group_mut(&mut self) -> Option<&mut GroupCell> {
        match &mut self.kind {
            CellKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        self.group().map(|group| group.kind)
    }

    pub fn is_open_group_marker(&self) -> bool {
        matches!(
            self.group_kind(),
            Some(GroupKind::OpenBegin | GroupKind::OpenEnd)
        )
    }

    pub fn nested_canvas(&self) -> Option<CanvasId> {
        match self.kind {
            CellKind::Canvas(id) => Some(id),
            _ => None,
        }
    }

    pub fn range(&self) -> Option<SourceRange> {
        match &self.kind {
            CellKind::Scope { content, .. }
            | CellKind::Statement { content, .. }
            | CellKind::If { content, .. }
            | CellKind::Comment { content, .. } => Some(content.range),
            CellKind::Doc { range, .. } => Some(*range),
            CellKind::Group(group) => Some(SourceRange::line(group.line)),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            CellKind::Scope { content, .. }
            | CellKind::Statement { content, .. }
            | CellKind::If { content, .. }
            | CellKind::Comment { content, .. } => Some(content.text.as_str()),
            CellKind::Doc { doc, .. } => Some(doc.display_text()),
            CellKind::Group(group) => Some(group.display_title()),
            _ => None,
        }
    }

    pub fn colors(&self) -> Colors {
        match &self.kind {
            CellKind::Scope { content, .. }
            | CellKind::Statement { content, .. }
            | CellKind::If { content, .. }
            | CellKind::Comment { content, .. } => content.colors,
            CellKind::Doc { doc, .. } => doc.colors,
            CellKind::Group(group) => group.colors,
            _ => Colors::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Canvas {
    pub id: CanvasId,
    pub parent: Option<CanvasId>,
    pub column: usize,
    pub row: usize,
    pub scope: Option<ScopeKind>,
    pub rows: Vec<Vec<Cell>>,
    /// Inclusive row ranges sharing per-column widths, ordered by start row.
    pub dependent_regions: Vec<(usize, usize)>,
    pub is_no_scope: bool,
    pub is_if_below_layout: bool,
    pub is_outer_if_layout: bool,
    pub lines_in_header: usize,
    pub max_local_open_group_depth: usize,
    pub max_global_open_group_depth: usize,
    pub width: f32,
    pub height: f32,
    pub x: f32,
    pub y: f32,
}

impl Canvas {
    pub fn new(id: CanvasId, parent: Option<CanvasId>, column: usize, row: usize) -> Self {
        Self {
            id,
            parent,
            column,
            row,
            scope: None,
            rows: Vec::new(),
            dependent_regions: Vec::new(),
            is_no_scope: false,
            is_if_below_layout: false,
            is_outer_if_layout: false,
            lines_in_header: 0,
            max_local_open_group_depth: 0,
            max_global_open_group_depth: 0,
            width: 0.0,
            height: 0.0,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn has_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    pub fn row_height(&self, row: usize) -> f32 {
        self.rows
            .get(row)
            .and_then(|cells| cells.first())
            .map(|cell| cell.height)
            .unwrap_or(0.0)
    }

    /// Index of the last row that is not closing an open group.
    pub fn last_meaningful_row(&self) -> Option<usize> {
        let mut index = self.rows.len().checked_sub(1)?;
        loop {
            let closes_group = self.rows[index]
                .last()
                .map(Cell::is_open_group_marker)
                .unwrap_or(false);
            if !closes_group {
                return Some(index);
            }
            index = index.checked_sub(1)?;
        }
    }
}

/// Arena of canvases; the root canvas is always `CanvasId(0)`.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub canvases: Vec<Canvas>,
}

impl Grid {
    pub const ROOT: CanvasId = CanvasId(0);

    pub fn add_canvas(&mut self, parent: Option<CanvasId>, column: usize, row: usize) -> CanvasId {
        let id = CanvasId(self.canvases.len());
        self.canvases.push(Canvas::new(id, parent, column, row));
        id
    }

    pub fn canvas(&self, id: CanvasId) -> Result<&Canvas, LayoutError> {
        self.canvases
            .get(id.0)
            .ok_or(LayoutError::MissingCanvas { id: id.0 })
    }

    pub fn canvas_mut(&mut self, id: CanvasId) -> Result<&mut Canvas, LayoutError> {
        self.canvases
            .get_mut(id.0)
            .ok_or(LayoutError::MissingCanvas { id: id.0 })
    }

    pub fn cell(&self, id: CanvasId, row: usize, column: usize) -> Result<&Cell, LayoutError> {
        self.canvas(id)?
            .cell(row, column)
            .ok_or(LayoutError::CellOutOfRange {
                canvas: id.0,
                row,
                column,
            })
    }

    pub fn cell_mut(
        &mut self,
        id: CanvasId,
        row: usize,
        column: usize,
    ) -> Result<&mut Cell, LayoutError> {
        self.canvas_mut(id)?
            .rows
            .get_mut(row)
            .and_then(|cells| cells.get_mut(column))
            .ok_or(LayoutError::CellOutOfRange {
                canvas: id.0,
                row,
                column,
            })
    }

    /// Canvas ids from the root down to `id`.
    pub fn scope_path(&self, id: CanvasId) -> Vec<CanvasId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.canvases.get(current.0).and_then(|canvas| canvas.parent) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.canvases
            .iter()
            .flat_map(|canvas| canvas.rows.iter().flatten())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectorSegment {
    pub canvas: CanvasId,
    pub column: usize,
    pub row: usize,
    pub role: ConnectorRole,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone)]
pub struct BadgeLayout {
    pub text: String,
    pub canvas: CanvasId,
    pub column: usize,
    pub row: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct GroupRect {
    pub id: String,
    pub title: Option<String>,
    pub colors: Colors,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
    pub grid: Grid,
    pub connectors: Vec<ConnectorSegment>,
    pub badges: Vec<BadgeLayout>,
    pub groups: Vec<GroupRect>,
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellKind) -> Cell {
        Cell::new(kind, CanvasId(0), 0, 0)
    }

    #[test]
    fn only_connectors_are_proxies() {
        let content = Content {
            text: "x".to_string(),
            range: SourceRange::line(1),
            colors: Colors::default(),
        };
        assert!(cell(CellKind::Connector(Connector::new(CONN_N_S))).is_proxy());
        assert!(cell(CellKind::Connector(Connector::new(CONN_N_C))).is_proxy());
        assert!(!cell(CellKind::VSpacer).is_proxy());
        assert!(!cell(CellKind::HGroupSpacer { count: 1 }).is_proxy());
        let comment = cell(CellKind::Comment {
            kind: CommentKind::Side,
            content: content.clone(),
            minimized: false,
        });
        assert!(!comment.is_proxy());
        let block = cell(CellKind::Statement {
            kind: StatementKind::CodeBlock,
            content,
        });
        assert!(!block.is_proxy());
    }
}
