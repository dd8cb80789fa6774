//! Turns a fragment tree into a grid of canvases. Every suite is laid out
//! top to bottom in one column of its canvas; nested scopes and `if`
//! statements become canvases of their own held by a canvas cell.

use std::collections::BTreeSet;

use crate::annotation::ItemAnnotations;
use crate::config::FlowToggles;
use crate::ir::{AnnotationSource, Fragment, FragmentKind, SourceRange};

use super::error::LayoutError;
use super::groups::{GroupStack, MatchedMarkers};
use super::text::{dedent, shift_down};
use super::types::{
    CanvasId, Cell, CellKind, CommentKind, Connection, Connector, ConnectorRole, Content,
    DocKind, ElseOf, Grid, ScopeEdge, ScopeKind, ScopePart, StatementKind, CONN_E_S, CONN_MERGE,
    CONN_N_C, CONN_N_S, CONN_N_W, CONN_W_S,
};

/// Grows `canvas` so that `(row, column)` exists. New rows of a scope canvas
/// start with a side edge unless `scope_edge` is false; gaps are vacant.
pub(super) fn allocate(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    column: usize,
    scope_edge: bool,
) -> Result<(), LayoutError> {
    let current = grid.canvas_mut(canvas)?;
    let scope = current.scope;
    while current.rows.len() <= row {
        let index = current.rows.len();
        let mut cells = Vec::new();
        if let (Some(scope), true) = (scope, scope_edge) {
            cells.push(Cell::new(
                CellKind::ScopeEdge {
                    scope,
                    edge: ScopeEdge::Side,
                },
                canvas,
                0,
                index,
            ));
        }
        current.rows.push(cells);
    }
    let cells = &mut current.rows[row];
    while cells.len() <= column {
        let index = cells.len();
        cells.push(Cell::vacant(canvas, index, row));
    }
    Ok(())
}

/// Places `kind` at `(row, column)`, replacing whatever was there.
pub(super) fn put(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    column: usize,
    kind: CellKind,
) -> Result<(), LayoutError> {
    place(grid, canvas, row, column, kind, true)
}

fn place(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    column: usize,
    kind: CellKind,
    scope_edge: bool,
) -> Result<(), LayoutError> {
    allocate(grid, canvas, row, column, scope_edge)?;
    *grid.cell_mut(canvas, row, column)? = Cell::new(kind, canvas, column, row);
    Ok(())
}

/// Whether control cannot fall through the cell at `(row, column)`. Rows
/// holding only an open group marker are skipped upwards.
pub(super) fn is_terminal_at(grid: &Grid, canvas: CanvasId, row: usize, column: usize) -> bool {
    let Ok(current) = grid.canvas(canvas) else {
        return false;
    };
    if row >= current.rows.len() {
        return false;
    }
    let Some(row) = current.rows[..=row]
        .iter()
        .rposition(|cells| !cells.last().is_some_and(Cell::is_open_group_marker))
    else {
        return false;
    };
    let Some(cell) = current.cell(row, column) else {
        return false;
    };
    match &cell.kind {
        CellKind::Group(group) => group.last_nested.is_some_and(FragmentKind::is_terminal),
        CellKind::Canvas(child) => {
            let Ok(nested) = grid.canvas(*child) else {
                return false;
            };
            if nested.has_scope() {
                return false;
            }
            nested
                .last_meaningful_row()
                .is_some_and(|last| is_terminal_at(grid, *child, last, 0))
        }
        _ => cell.is_terminal(),
    }
}

pub(super) fn is_vacant_at(grid: &Grid, canvas: CanvasId, row: usize, column: usize) -> bool {
    grid.cell(canvas, row, column)
        .map(Cell::is_vacant)
        .unwrap_or(true)
}

enum NoBranch<'f> {
    Absent,
    Elif(CanvasId),
    Else(&'f Fragment),
}

struct Builder<'a> {
    grid: Grid,
    flow: &'a FlowToggles,
    collapsed: &'a BTreeSet<String>,
    markers: &'a MatchedMarkers,
}

/// Builds the grid for a module fragment. The root canvas holds a spacer
/// row, the module's own comments and the file scope canvas.
pub(super) fn build_grid(
    module: &Fragment,
    flow: &FlowToggles,
    collapsed: &BTreeSet<String>,
    markers: &MatchedMarkers,
) -> Result<Grid, LayoutError> {
    if module.kind != FragmentKind::Module {
        return Err(LayoutError::NotAModule {
            kind: module.kind.name().to_string(),
        });
    }
    let mut builder = Builder {
        grid: Grid::default(),
        flow,
        collapsed,
        markers,
    };
    builder.layout_module(module)?;
    Ok(builder.grid)
}

fn content_of(item: &Fragment) -> Content {
    let annotations =
        ItemAnnotations::resolve(item.leading_annotations.iter().chain(&item.side_annotations));
    Content {
        text: annotations.replacement.unwrap_or_else(|| item.text.clone()),
        range: item.range,
        colors: annotations.colors,
    }
}

fn scope_of_loop(kind: FragmentKind) -> (ScopeKind, ScopeKind) {
    match kind {
        FragmentKind::While => (ScopeKind::While, ScopeKind::Else(ElseOf::While)),
        _ => (ScopeKind::For, ScopeKind::Else(ElseOf::For)),
    }
}

impl<'a> Builder<'a> {
    fn comments_visible(&self) -> bool {
        !self.flow.no_comment && !self.flow.hide_comments
    }

    fn need_side_comment(&self, item: &Fragment) -> bool {
        self.comments_visible() && item.side_comment.is_some()
    }

    fn put(
        &mut self,
        canvas: CanvasId,
        row: usize,
        column: usize,
        kind: CellKind,
    ) -> Result<(), LayoutError> {
        put(&mut self.grid, canvas, row, column, kind)
    }

    fn connector(
        &mut self,
        canvas: CanvasId,
        row: usize,
        column: usize,
        connections: &[Connection],
    ) -> Result<(), LayoutError> {
        self.put(canvas, row, column, CellKind::Connector(Connector::new(connections)))
    }

    fn attach(
        &mut self,
        parent: CanvasId,
        child: CanvasId,
        row: usize,
        column: usize,
    ) -> Result<(), LayoutError> {
        let nested = self.grid.canvas_mut(child)?;
        nested.parent = Some(parent);
        nested.row = row;
        nested.column = column;
        self.put(parent, row, column, CellKind::Canvas(child))
    }

    fn side_comment_cell(&self, item: &Fragment) -> Option<CellKind> {
        if !self.need_side_comment(item) {
            return None;
        }
        let comment = item.side_comment.as_ref()?;
        Some(CellKind::Comment {
            kind: CommentKind::Side,
            content: Content {
                text: shift_down(&comment.text, item.side_comment_offset()),
                range: comment.range,
                colors: Default::default(),
            },
            minimized: false,
        })
    }

    fn put_side_comment(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        column: usize,
    ) -> Result<bool, LayoutError> {
        match self.side_comment_cell(item) {
            Some(cell) => {
                self.put(canvas, row, column, cell)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn doc_cell(item: &Fragment, kind: DocKind, minimized: bool) -> Option<CellKind> {
        let (line, doc) = ItemAnnotations::resolve(&item.leading_annotations).doc?;
        Some(CellKind::Doc {
            kind,
            doc,
            range: SourceRange::line(line),
            minimized,
        })
    }

    fn comment_cell(item: &Fragment, kind: CommentKind, minimized: bool) -> Option<CellKind> {
        let comment = item.leading_comment.as_ref()?;
        Some(CellKind::Comment {
            kind,
            content: Content {
                text: comment.text.clone(),
                range: comment.range,
                colors: Default::default(),
            },
            minimized,
        })
    }

    /// Rows a leading doc link and a leading comment of `item` take.
    fn leading_rows(&self, item: &Fragment) -> usize {
        if !self.comments_visible() {
            return 0;
        }
        let doc = Self::doc_cell(item, DocKind::Leading, false).is_some() as usize;
        doc + item.leading_comment.is_some() as usize
    }

    /// Leading doc link and leading comment rows: a connector on the main
    /// line with the box to its right.
    fn leading_comment_rows(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        mut row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        if !self.comments_visible() {
            return Ok(row);
        }
        if let Some(doc) = Self::doc_cell(item, DocKind::Leading, false) {
            self.connector(canvas, row, column, CONN_N_S)?;
            self.put(canvas, row, column + 1, doc)?;
            row += 1;
        }
        if let Some(comment) = Self::comment_cell(item, CommentKind::Leading, false) {
            self.connector(canvas, row, column, CONN_N_S)?;
            self.put(canvas, row, column + 1, comment)?;
            row += 1;
        }
        Ok(row)
    }

    /// Doc link and comment boxes stacked right above a scope, ending at
    /// `row + max_rows`. The rows above them get `filler` connectors.
    fn above_rows(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        max_rows: usize,
        column: usize,
        filler: bool,
    ) -> Result<(), LayoutError> {
        let own = self.leading_rows(item);
        let mut current = row + (max_rows - own);
        if filler {
            for filler_row in row..current {
                self.connector(canvas, filler_row, column, CONN_N_S)?;
            }
        }
        if own == 0 {
            return Ok(());
        }
        if let Some(doc) = Self::doc_cell(item, DocKind::Above, false) {
            self.put(canvas, current, column, doc)?;
            current += 1;
        }
        if let Some(comment) = Self::comment_cell(item, CommentKind::Above, false) {
            self.put(canvas, current, column, comment)?;
        }
        Ok(())
    }

    fn set_leader(&mut self, canvas: CanvasId, line: usize) -> Result<(), LayoutError> {
        if let CellKind::Scope { leader, .. } = &mut self.grid.cell_mut(canvas, 0, 0)?.kind {
            *leader = Some(line);
        }
        Ok(())
    }

    fn layout_module(&mut self, module: &Fragment) -> Result<(), LayoutError> {
        let root = self.grid.add_canvas(None, 0, 0);
        self.grid.canvas_mut(root)?.is_no_scope = true;
        self.put(root, 0, 1, CellKind::VSpacer)?;
        let mut row = 1;
        if self.comments_visible() {
            if let Some(doc) = Self::doc_cell(module, DocKind::Above, false) {
                self.put(root, row, 1, doc)?;
                row += 1;
            }
            if let Some(comment) = Self::comment_cell(module, CommentKind::Above, false) {
                self.put(root, row, 1, comment)?;
                row += 1;
            }
        }
        let file = self.scope_canvas(module, ScopeKind::File)?;
        self.attach(root, file, row, 1)
    }

    fn scope_canvas(&mut self, item: &Fragment, scope: ScopeKind) -> Result<CanvasId, LayoutError> {
        let canvas = self.grid.add_canvas(None, 0, 0);
        self.layout_scope(canvas, item, scope)?;
        Ok(canvas)
    }

    fn place_scope(
        &mut self,
        parent: CanvasId,
        item: &Fragment,
        scope: ScopeKind,
        row: usize,
        column: usize,
    ) -> Result<CanvasId, LayoutError> {
        let canvas = self.scope_canvas(item, scope)?;
        self.attach(parent, canvas, row, column)?;
        Ok(canvas)
    }

    /// Header rows (top-left corner, declaration, docstring), a spacer, the
    /// suite one column in and the bottom corner.
    fn layout_scope(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        scope: ScopeKind,
    ) -> Result<(), LayoutError> {
        self.grid.canvas_mut(canvas)?.scope = Some(scope);
        let content = content_of(item);
        let side_comment = self.need_side_comment(item);
        place(
            &mut self.grid,
            canvas,
            0,
            0,
            CellKind::Scope {
                scope,
                part: ScopePart::TopLeft,
                content: content.clone(),
                leader: None,
                side_comment: false,
            },
            false,
        )?;
        let mut header = 1;
        let mut row = 1;
        if scope.has_declaration(&content.text) {
            self.put(
                canvas,
                row,
                1,
                CellKind::Scope {
                    scope,
                    part: ScopePart::Declaration,
                    content,
                    leader: None,
                    side_comment,
                },
            )?;
            row += 1;
            header += 1;
        }
        if let Some(docstring) = &item.docstring {
            let text = dedent(&docstring.text);
            if !self.flow.no_docstring && !self.flow.hide_docstrings && !text.is_empty() {
                let annotations = ItemAnnotations::resolve(
                    docstring
                        .leading_annotations
                        .iter()
                        .chain(&docstring.side_annotations),
                );
                self.put(
                    canvas,
                    row,
                    1,
                    CellKind::Scope {
                        scope,
                        part: ScopePart::Docstring,
                        content: Content {
                            text: annotations.replacement.unwrap_or(text),
                            range: docstring.range,
                            colors: annotations.colors,
                        },
                        leader: None,
                        side_comment: false,
                    },
                )?;
                row += 1;
                header += 1;
            }
        }
        self.grid.canvas_mut(canvas)?.lines_in_header = header;
        self.put(canvas, row, 1, CellKind::VSpacer)?;
        row += 1;

        let prelude: &[AnnotationSource] = if scope == ScopeKind::File {
            &item.leading_annotations
        } else {
            &[]
        };
        row = self.layout_suite(canvas, row, &item.suite, 1, prelude)?;
        place(
            &mut self.grid,
            canvas,
            row,
            0,
            CellKind::ScopeEdge {
                scope,
                edge: ScopeEdge::Corner,
            },
            false,
        )
    }

    /// Lays out `suite` in `column` from `row` on. Returns the next vacant row.
    fn layout_suite(
        &mut self,
        canvas: CanvasId,
        mut row: usize,
        suite: &[Fragment],
        column: usize,
        prelude: &[AnnotationSource],
    ) -> Result<usize, LayoutError> {
        let mut groups = GroupStack::default();
        if !self.flow.no_group && !prelude.is_empty() {
            let markers = self.markers.markers_of(prelude);
            let collapsed = self.collapsed;
            (_, row) = groups.handle(
                &mut self.grid,
                canvas,
                &markers,
                None,
                row,
                column,
                collapsed,
            )?;
        }
        for item in suite {
            if !self.flow.no_group {
                let markers = self.markers.markers_of(item.group_annotations());
                let collapsed = self.collapsed;
                let (hidden, next) = groups.handle(
                    &mut self.grid,
                    canvas,
                    &markers,
                    Some(item),
                    row,
                    column,
                    collapsed,
                )?;
                row = next;
                if hidden {
                    continue;
                }
            }
            row = self.layout_item(canvas, item, row, column)?;
        }
        Ok(row)
    }

    fn suppressed(&self, kind: StatementKind) -> Option<&'static [Connection]> {
        let flow = self.flow;
        let dropped = match kind {
            StatementKind::CodeBlock => flow.no_block,
            StatementKind::Import => flow.no_import,
            StatementKind::Assert => flow.no_assert,
            StatementKind::Break => flow.no_break,
            StatementKind::Continue => flow.no_continue,
            StatementKind::Return => flow.no_return,
            StatementKind::Raise => flow.no_raise,
            StatementKind::SysExit => flow.no_sys_exit,
        };
        if !dropped {
            return None;
        }
        Some(if kind.is_terminal() { CONN_N_C } else { CONN_N_S })
    }

    fn layout_item(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        let flow = self.flow;
        match item.kind {
            FragmentKind::Annotation => self.layout_standalone_doc(canvas, item, row, column),
            FragmentKind::Comment => self.layout_standalone_comment(canvas, item, row, column),
            FragmentKind::With if flow.no_with => Ok(row),
            FragmentKind::With => self.layout_with(canvas, item, row, column),
            FragmentKind::Function | FragmentKind::Class => {
                self.layout_definition(canvas, item, row, column)
            }
            FragmentKind::For if flow.no_for => Ok(row),
            FragmentKind::While if flow.no_while => Ok(row),
            FragmentKind::For | FragmentKind::While => self.layout_loop(canvas, item, row, column),
            FragmentKind::Try if flow.no_try => Ok(row),
            FragmentKind::Try => self.layout_try(canvas, item, row, column),
            FragmentKind::If if flow.no_if => Ok(row),
            FragmentKind::If => self.layout_if(canvas, item, row, column),
            kind => {
                let Some(statement) = StatementKind::from_fragment(kind) else {
                    tracing::debug!(
                        ?kind,
                        line = item.range.begin_line,
                        "fragment outside of a suite slot"
                    );
                    return Ok(row);
                };
                if let Some(connections) = self.suppressed(statement) {
                    self.connector(canvas, row, column, connections)?;
                    return Ok(row + 1);
                }
                let row = self.leading_comment_rows(canvas, item, row, column)?;
                self.put(
                    canvas,
                    row,
                    column,
                    CellKind::Statement {
                        kind: statement,
                        content: content_of(item),
                    },
                )?;
                self.put_side_comment(canvas, item, row, column + 1)?;
                Ok(row + 1)
            }
        }
    }

    fn layout_standalone_doc(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        if self.flow.no_comment {
            return Ok(row);
        }
        let Some(doc) = Self::doc_cell(item, DocKind::Independent, self.flow.hide_comments) else {
            return Ok(row);
        };
        self.connector(canvas, row, column, CONN_N_S)?;
        self.put(canvas, row, column + 1, doc)?;
        Ok(row + 1)
    }

    fn layout_standalone_comment(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        if self.flow.no_comment {
            return Ok(row);
        }
        let text = match &item.leading_comment {
            Some(comment) if item.text.is_empty() => comment.text.clone(),
            _ => item.text.clone(),
        };
        self.connector(canvas, row, column, CONN_N_S)?;
        self.put(
            canvas,
            row,
            column + 1,
            CellKind::Comment {
                kind: CommentKind::Independent,
                content: Content {
                    text,
                    range: item.range,
                    colors: Default::default(),
                },
                minimized: self.flow.hide_comments,
            },
        )?;
        Ok(row + 1)
    }

    fn layout_with(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        let row = self.leading_comment_rows(canvas, item, row, column)?;
        self.place_scope(canvas, item, ScopeKind::With, row, column)?;
        self.put_side_comment(canvas, item, row, column + 1)?;
        Ok(row + 1)
    }

    /// Functions and classes. Shown decorators wrap the scope canvas, the
    /// first decorator outermost.
    fn layout_definition(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        mut row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        let show_decorators =
            !self.flow.no_decor && !self.flow.hide_decors && !item.decorators.is_empty();
        if show_decorators {
            row = self.leading_comment_rows(canvas, &item.decorators[0], row, column)?;
        }
        row = self.leading_comment_rows(canvas, item, row, column)?;

        let scope = if item.kind == FragmentKind::Class {
            ScopeKind::Class
        } else {
            ScopeKind::Function
        };
        let mut inner = self.scope_canvas(item, scope)?;
        if show_decorators {
            for (index, decorator) in item.decorators.iter().enumerate().rev() {
                inner = self.decorator_canvas(decorator, inner, index == 0)?;
            }
        }
        self.attach(canvas, inner, row, column)?;
        self.put_side_comment(canvas, item, row, column + 1)?;
        Ok(row + 1)
    }

    fn decorator_canvas(
        &mut self,
        decorator: &Fragment,
        inner: CanvasId,
        first: bool,
    ) -> Result<CanvasId, LayoutError> {
        let canvas = self.grid.add_canvas(None, 0, 0);
        self.grid.canvas_mut(canvas)?.scope = Some(ScopeKind::Decorator);
        let content = content_of(decorator);
        place(
            &mut self.grid,
            canvas,
            0,
            0,
            CellKind::Scope {
                scope: ScopeKind::Decorator,
                part: ScopePart::TopLeft,
                content: content.clone(),
                leader: None,
                side_comment: false,
            },
            false,
        )?;
        let mut row = 1;
        // The first decorator's comments go above the whole definition.
        if !first {
            let rows = self.leading_rows(decorator);
            self.above_rows(canvas, decorator, row, rows, 1, false)?;
            row += rows;
        }
        let side_comment = self.need_side_comment(decorator);
        self.put(
            canvas,
            row,
            1,
            CellKind::Scope {
                scope: ScopeKind::Decorator,
                part: ScopePart::Declaration,
                content,
                leader: None,
                side_comment,
            },
        )?;
        self.put_side_comment(canvas, decorator, row, 2)?;
        self.grid.canvas_mut(canvas)?.lines_in_header = 2;
        row += 1;
        self.attach(canvas, inner, row, 1)?;
        row += 1;
        place(
            &mut self.grid,
            canvas,
            row,
            0,
            CellKind::ScopeEdge {
                scope: ScopeKind::Decorator,
                edge: ScopeEdge::Corner,
            },
            false,
        )?;
        Ok(canvas)
    }

    /// `for`/`while` with an optional `else` scope to the right. Comments of
    /// both go above them, bottom aligned.
    fn layout_loop(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        mut row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        let (scope, else_scope) = scope_of_loop(item.kind);
        let else_part = item.else_part.as_deref();
        let main_rows = self.leading_rows(item);
        let else_rows = else_part.map(|part| self.leading_rows(part)).unwrap_or(0);
        let max_rows = main_rows.max(else_rows);
        if max_rows > 0 {
            self.above_rows(canvas, item, row, max_rows, column, true)?;
            if let Some(part) = else_part {
                let else_column = column + 1 + self.need_side_comment(item) as usize;
                self.above_rows(canvas, part, row, max_rows, else_column, false)?;
            }
        }
        if else_part.is_some() {
            self.grid
                .canvas_mut(canvas)?
                .dependent_regions
                .push((row, row + max_rows));
        }
        row += max_rows;

        self.place_scope(canvas, item, scope, row, column)?;
        let mut vacant_column = column + 1;
        if self.put_side_comment(canvas, item, row, vacant_column)? {
            vacant_column += 1;
        }
        if let Some(part) = else_part {
            let nested = self.place_scope(canvas, part, else_scope, row, vacant_column)?;
            self.set_leader(nested, item.range.begin_line)?;
            self.put_side_comment(canvas, part, row, vacant_column + 1)?;
        }
        Ok(row + 1)
    }

    /// `try` with its `except` scopes side by side; `else` and `finally`
    /// below.
    fn layout_try(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        mut row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        let excepts: &[Fragment] = if self.flow.hide_excepts {
            &[]
        } else {
            &item.except_parts
        };
        let main_rows = self.leading_rows(item);
        let max_rows = excepts
            .iter()
            .map(|part| self.leading_rows(part))
            .fold(main_rows, usize::max);
        if max_rows > 0 {
            self.above_rows(canvas, item, row, max_rows, column, true)?;
        }
        if !excepts.is_empty() {
            self.grid
                .canvas_mut(canvas)?
                .dependent_regions
                .push((row, row + max_rows));
        }
        let scope_row = row + max_rows;
        self.place_scope(canvas, item, ScopeKind::Try, scope_row, column)?;
        let mut vacant_column = column + 1;
        if self.put_side_comment(canvas, item, scope_row, vacant_column)? {
            vacant_column += 1;
        }
        for part in excepts {
            if max_rows > 0 {
                self.above_rows(canvas, part, row, max_rows, vacant_column, false)?;
            }
            let nested =
                self.place_scope(canvas, part, ScopeKind::Except, scope_row, vacant_column)?;
            self.set_leader(nested, item.range.begin_line)?;
            if self.put_side_comment(canvas, part, scope_row, vacant_column + 1)? {
                vacant_column += 1;
            }
            vacant_column += 1;
        }
        row = scope_row;

        let tails = [
            (item.else_part.as_deref(), ScopeKind::Else(ElseOf::Try)),
            (item.finally_part.as_deref(), ScopeKind::Finally),
        ];
        for (part, scope) in tails {
            let Some(part) = part else {
                continue;
            };
            row = self.leading_comment_rows(canvas, part, row + 1, column)?;
            let nested = self.place_scope(canvas, part, scope, row, column)?;
            self.set_leader(nested, item.range.begin_line)?;
            self.put_side_comment(canvas, part, row, column + 1)?;
        }
        Ok(row + 1)
    }

    /// An `if` chain becomes nested branch canvases, built innermost first.
    /// The outermost one is placed at `(row, column)`.
    fn layout_if(
        &mut self,
        canvas: CanvasId,
        item: &Fragment,
        row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        let (conditions, else_part) = match item.parts.split_last() {
            Some((last, rest)) if last.kind == FragmentKind::Else => (rest, Some(last)),
            _ => (item.parts.as_slice(), None),
        };
        let Some((last, outer)) = conditions.split_last() else {
            tracing::debug!(line = item.range.begin_line, "if without a condition part");
            return Ok(row);
        };

        let mut current = self.grid.add_canvas(None, 0, 0);
        self.grid.canvas_mut(current)?.is_no_scope = true;
        let no = else_part.map(NoBranch::Else).unwrap_or(NoBranch::Absent);
        self.layout_if_branch(current, last, no)?;
        for part in outer.iter().rev() {
            let branch = self.grid.add_canvas(None, 0, 0);
            self.grid.canvas_mut(branch)?.is_no_scope = true;
            self.layout_if_branch(branch, part, NoBranch::Elif(current))?;
            current = branch;
        }

        let outermost = self.grid.canvas_mut(current)?;
        outermost.is_if_below_layout = true;
        outermost.is_outer_if_layout = true;
        self.attach(canvas, current, row, column)?;
        Ok(row + 1)
    }

    fn layout_if_branch(
        &mut self,
        canvas: CanvasId,
        yes: &Fragment,
        no: NoBranch<'_>,
    ) -> Result<(), LayoutError> {
        let mut row = self.leading_comment_rows(canvas, yes, 0, 0)?;
        let annotations =
            ItemAnnotations::resolve(yes.leading_annotations.iter().chain(&yes.side_annotations));
        let yes_below = annotations.switch_branches;
        self.put(
            canvas,
            row,
            0,
            CellKind::If {
                content: content_of(yes),
                switched: yes_below,
            },
        )?;
        let region_begin = row;
        self.put(
            canvas,
            row,
            1,
            CellKind::Connector(Connector::with_role(CONN_W_S, ConnectorRole::TopIf)),
        )?;
        self.put_side_comment(canvas, yes, row, 2)?;
        row += 1;

        let yes_canvas = self.grid.add_canvas(None, 0, 0);
        {
            let branch = self.grid.canvas_mut(yes_canvas)?;
            branch.is_no_scope = true;
            branch.is_if_below_layout = yes_below;
        }
        self.layout_suite(yes_canvas, 0, &yes.suite, 0, &[])?;
        let (yes_column, no_column) = if yes_below { (0, 1) } else { (1, 0) };
        self.attach(canvas, yes_canvas, row, yes_column)?;

        match no {
            NoBranch::Absent => {
                if yes_below {
                    self.connector(canvas, row, 1, CONN_N_S)?;
                    row += 1;
                    self.put(
                        canvas,
                        row,
                        1,
                        CellKind::Connector(Connector::with_role(
                            CONN_N_W,
                            ConnectorRole::BottomIf,
                        )),
                    )?;
                    let closed = is_terminal_at(&self.grid, canvas, row - 1, 0)
                        || is_vacant_at(&self.grid, canvas, row - 1, 0);
                    self.connector(canvas, row, 0, if closed { CONN_E_S } else { CONN_MERGE })?;
                } else {
                    self.connector(canvas, row, 0, CONN_N_S)?;
                    let open = !is_terminal_at(&self.grid, canvas, row, 1)
                        && !is_vacant_at(&self.grid, canvas, row, 1);
                    if open {
                        row += 1;
                        self.put(
                            canvas,
                            row,
                            1,
                            CellKind::Connector(Connector::with_role(
                                CONN_N_W,
                                ConnectorRole::BottomIf,
                            )),
                        )?;
                        self.connector(canvas, row, 0, CONN_MERGE)?;
                    }
                }
            }
            NoBranch::Elif(nested) => {
                if no_column == 0 {
                    self.grid.canvas_mut(nested)?.is_if_below_layout = true;
                }
                self.attach(canvas, nested, row, no_column)?;
                row = self.close_branches(canvas, row)?;
            }
            NoBranch::Else(part) => {
                let else_canvas = self.grid.add_canvas(None, 0, 0);
                {
                    let branch = self.grid.canvas_mut(else_canvas)?;
                    branch.is_no_scope = true;
                    branch.is_if_below_layout = no_column == 0;
                }
                let mut else_row = 0;
                if !self.flow.no_comment {
                    let minimized = self.flow.hide_comments;
                    let comments = [
                        part.leading_comment.as_ref(),
                        part.side_comment.as_ref(),
                    ];
                    for comment in comments.into_iter().flatten() {
                        self.connector(else_canvas, else_row, 0, CONN_N_S)?;
                        self.put(
                            else_canvas,
                            else_row,
                            1,
                            CellKind::Comment {
                                kind: CommentKind::Independent,
                                content: Content {
                                    text: comment.text.clone(),
                                    range: comment.range,
                                    colors: Default::default(),
                                },
                                minimized,
                            },
                        )?;
                        else_row += 1;
                    }
                }
                self.layout_suite(else_canvas, else_row, &part.suite, 0, &[])?;
                self.attach(canvas, else_canvas, row, no_column)?;
                row = self.close_branches(canvas, row)?;
            }
        }
        self.grid
            .canvas_mut(canvas)?
            .dependent_regions
            .push((region_begin, row));
        Ok(())
    }

    /// Merges the two branches at `row` back into the main line unless
    /// control leaves both.
    fn close_branches(&mut self, canvas: CanvasId, row: usize) -> Result<usize, LayoutError> {
        let closed = |column| {
            is_terminal_at(&self.grid, canvas, row, column)
                || is_vacant_at(&self.grid, canvas, row, column)
        };
        let (left, right) = (closed(0), closed(1));
        if right {
            return Ok(row);
        }
        let row = row + 1;
        self.put(
            canvas,
            row,
            1,
            CellKind::Connector(Connector::with_role(CONN_N_W, ConnectorRole::BottomIf)),
        )?;
        self.connector(canvas, row, 0, if left { CONN_E_S } else { CONN_MERGE })?;
        Ok(row)
    }
}
