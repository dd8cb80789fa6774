//! Open/collapsed groups: pairing of `gb`/`ge` markers, the per-suite group
//! stack used while building, and the horizontal shifting that makes room
//! for nested group borders.

use std::collections::{BTreeSet, HashSet};

use crate::annotation::{group_markers, GroupMarker, Warning};
use crate::ir::{AnnotationSource, Fragment, FragmentKind};

use super::builder::{is_terminal_at, put};
use super::error::LayoutError;
use super::types::{CanvasId, Cell, CellKind, GroupCell, GroupKind, Grid, ScopeEdge};

/// Positions of the group markers that pair up inside their own suite.
#[derive(Debug, Clone, Default)]
pub(super) struct MatchedMarkers {
    pub valid: HashSet<(usize, usize)>,
    pub warnings: Vec<Warning>,
}

impl MatchedMarkers {
    pub fn markers_of(&self, sources: &[AnnotationSource]) -> Vec<GroupMarker> {
        group_markers(sources)
            .into_iter()
            .filter(|marker| self.valid.contains(&marker.key()))
            .collect()
    }
}

/// Pairs group markers suite by suite. The file suite also sees the markers
/// attached to the module itself, ahead of its first item.
pub(super) fn match_markers(module: &Fragment) -> MatchedMarkers {
    let mut matched = MatchedMarkers::default();
    match_suite(&module.leading_annotations, &module.suite, &mut matched);
    matched
}

fn match_suite(prelude: &[AnnotationSource], suite: &[Fragment], matched: &mut MatchedMarkers) {
    let mut open: Vec<GroupMarker> = Vec::new();
    let markers = group_markers(prelude)
        .into_iter()
        .chain(suite.iter().flat_map(|item| group_markers(item.group_annotations())));
    for marker in markers {
        pair_marker(marker, &mut open, matched);
    }
    for marker in open {
        matched.warnings.push(Warning::new(
            marker.line,
            marker.column,
            format!(
                "Invalid CML comment: group '{}' is not closed in its suite",
                marker.id
            ),
        ));
    }
    for item in suite {
        for child in item.child_suites() {
            match_suite(&[], child, matched);
        }
    }
}

fn pair_marker(marker: GroupMarker, open: &mut Vec<GroupMarker>, matched: &mut MatchedMarkers) {
    if marker.begin {
        if open.iter().any(|other| other.id == marker.id) {
            matched.warnings.push(Warning::new(
                marker.line,
                marker.column,
                format!("Invalid CML comment: group '{}' is already open", marker.id),
            ));
            return;
        }
        open.push(marker);
        return;
    }
    match open.last() {
        Some(top) if top.id == marker.id => {
            if let Some(begin) = open.pop() {
                matched.valid.insert(begin.key());
                matched.valid.insert(marker.key());
            }
        }
        _ => matched.warnings.push(Warning::new(
            marker.line,
            marker.column,
            format!(
                "Invalid CML comment: group end '{}' does not close the innermost open group",
                marker.id
            ),
        )),
    }
}

#[derive(Debug, Clone)]
struct OpenGroup {
    id: String,
    row: usize,
    column: usize,
    collapsed: bool,
    nested: usize,
    last_nested: Option<FragmentKind>,
}

/// Groups opened in the suite currently being laid out.
#[derive(Debug, Default)]
pub(super) struct GroupStack {
    open: Vec<OpenGroup>,
}

impl GroupStack {
    /// Places the cells for `markers` starting at `row` and records `item` in
    /// the innermost open group. Returns whether `item` is hidden by a
    /// collapsed group and the next vacant row.
    #[allow(clippy::too_many_arguments)]
    pub fn handle(
        &mut self,
        grid: &mut Grid,
        canvas: CanvasId,
        markers: &[GroupMarker],
        item: Option<&Fragment>,
        mut row: usize,
        column: usize,
        collapsed: &BTreeSet<String>,
    ) -> Result<(bool, usize), LayoutError> {
        for marker in markers {
            if let Some(top) = self.open.last_mut() {
                if top.id != marker.id {
                    top.nested += 1;
                    top.last_nested = None;
                }
            }
            row = if marker.begin {
                self.begin(grid, canvas, marker, row, column, collapsed)?
            } else {
                self.end(grid, canvas, marker, row, column)?
            };
        }

        let (Some(item), Some(top)) = (item, self.open.last_mut()) else {
            return Ok((false, row));
        };
        let own_marker = item.kind == FragmentKind::Annotation
            && markers.iter().any(|marker| marker.id == top.id);
        if !own_marker {
            top.nested += 1;
            top.last_nested = Some(item.kind);
        }
        Ok((top.collapsed, row))
    }

    fn begin(
        &mut self,
        grid: &mut Grid,
        canvas: CanvasId,
        marker: &GroupMarker,
        row: usize,
        column: usize,
        collapsed: &BTreeSet<String>,
    ) -> Result<usize, LayoutError> {
        if self.open.last().is_some_and(|top| top.collapsed) {
            return Ok(row);
        }
        let is_collapsed = collapsed.contains(&marker.id);
        let cell = GroupCell {
            kind: if is_collapsed {
                GroupKind::Collapsed
            } else {
                GroupKind::OpenBegin
            },
            id: marker.id.clone(),
            title: marker.title.clone(),
            colors: marker.colors,
            line: marker.line,
            nested: 0,
            last_nested: None,
            begin: None,
            end: None,
            self_and_deeper: 0,
            self_max: 0,
            is_terminal: row
                .checked_sub(1)
                .is_some_and(|above| is_terminal_at(grid, canvas, above, column)),
            group_width: 0.0,
            group_height: 0.0,
        };
        put(grid, canvas, row, column, CellKind::Group(Box::new(cell)))?;
        self.open.push(OpenGroup {
            id: marker.id.clone(),
            row,
            column,
            collapsed: is_collapsed,
            nested: 0,
            last_nested: None,
        });
        Ok(row + 1)
    }

    fn end(
        &mut self,
        grid: &mut Grid,
        canvas: CanvasId,
        marker: &GroupMarker,
        mut row: usize,
        column: usize,
    ) -> Result<usize, LayoutError> {
        if self.open.last().map(|top| top.id.as_str()) != Some(marker.id.as_str()) {
            return Ok(row);
        }
        let Some(top) = self.open.pop() else {
            return Ok(row);
        };
        let is_terminal = row
            .checked_sub(1)
            .is_some_and(|above| is_terminal_at(grid, canvas, above, column));
        let begin = grid
            .cell_mut(canvas, top.row, top.column)?
            .group_mut()
            .ok_or(LayoutError::UnpairedGroupMarker {
                canvas: canvas.0,
                row: top.row,
                column: top.column,
            })?;
        begin.nested = top.nested;
        begin.last_nested = top.last_nested;
        if top.nested == 0 {
            begin.kind = GroupKind::Empty;
            return Ok(row);
        }
        if top.collapsed {
            return Ok(row);
        }
        begin.end = Some((row, column));
        let end = GroupCell {
            kind: GroupKind::OpenEnd,
            begin: Some((top.row, top.column)),
            end: None,
            is_terminal,
            ..begin.clone()
        };
        put(grid, canvas, row, column, CellKind::Group(Box::new(end)))?;
        row += 1;
        Ok(row)
    }
}

enum RowShift {
    Regular(usize),
    Begin(usize),
    End(usize),
    Nested(usize, CanvasId),
}

enum Mark {
    Begin(usize, usize),
    End,
    Child(CanvasId),
}

fn row_marks(cells: &[Cell]) -> Vec<Mark> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(index, cell)| match &cell.kind {
            CellKind::Canvas(child) => Some(Mark::Child(*child)),
            CellKind::Group(group) => match group.kind {
                GroupKind::OpenBegin => {
                    Some(Mark::Begin(index, group.end.map(|(row, _)| row).unwrap_or(0)))
                }
                GroupKind::OpenEnd => Some(Mark::End),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Inserts group spacers so that every open group has room for its border
/// on both sides of the rows it encloses.
pub(super) fn adjust_open_groups(grid: &mut Grid, canvas: CanvasId) -> Result<(), LayoutError> {
    open_groups_adjustments(grid, canvas)?;
    Ok(())
}

/// Returns the open-group depth an if-below canvas contributes to its
/// parent. Other canvases are shifted in place and report zero.
fn open_groups_adjustments(grid: &mut Grid, canvas: CanvasId) -> Result<usize, LayoutError> {
    let mut level = 0usize;
    let mut max_local = 0usize;
    let mut stack_max = 0usize;
    let row_count = grid.canvas(canvas)?.rows.len();
    for row in 0..row_count {
        let marks = row_marks(&grid.canvas(canvas)?.rows[row]);
        for mark in marks {
            match mark {
                Mark::Child(child) => {
                    let nested = open_groups_adjustments(grid, child)?;
                    if grid.canvas(child)?.is_if_below_layout {
                        stack_max = stack_max.max(level + nested);
                    }
                }
                Mark::Begin(..) => {
                    level += 1;
                    stack_max = stack_max.max(level);
                    max_local = max_local.max(level);
                }
                Mark::End => level = level.saturating_sub(1),
            }
        }
    }

    let current = grid.canvas_mut(canvas)?;
    current.max_local_open_group_depth = max_local;
    if current.is_if_below_layout {
        return Ok(stack_max);
    }
    insert_open_group_shift(grid, canvas, stack_max, 0)?;
    Ok(0)
}

/// Open-group depth over the rows in `start..end`: the deepest level reached
/// including nested if-below canvases, and the deepest level local to this
/// canvas. Stores both on every begin marker found on the way.
fn update_group_nest_level(
    grid: &mut Grid,
    canvas: CanvasId,
    start: usize,
    end: usize,
) -> Result<(usize, usize), LayoutError> {
    let mut current = 0usize;
    let mut max_with_children = 0usize;
    let mut max_local = 0usize;
    for row in start..end {
        let marks = row_marks(&grid.canvas(canvas)?.rows[row]);
        for mark in marks {
            match mark {
                Mark::Begin(column, end_row) => {
                    current += 1;
                    max_with_children = max_with_children.max(current);
                    max_local = max_local.max(current);
                    let (deeper, self_max) =
                        update_group_nest_level(grid, canvas, row + 1, end_row)?;
                    if let Some(group) = grid.cell_mut(canvas, row, column)?.group_mut() {
                        group.self_and_deeper = deeper + 1;
                        group.self_max = self_max + 1;
                    }
                }
                Mark::End => current = current.saturating_sub(1),
                Mark::Child(child) => {
                    if grid.canvas(child)?.is_if_below_layout {
                        let rows = grid.canvas(child)?.rows.len();
                        let (level, _) = update_group_nest_level(grid, child, 0, rows)?;
                        max_with_children = max_with_children.max(current + level);
                    }
                }
            }
        }
    }
    Ok((max_with_children, max_local))
}

fn insert_index(
    grid: &Grid,
    canvas: CanvasId,
    row: usize,
) -> Result<Option<RowShift>, LayoutError> {
    let current = grid.canvas(canvas)?;
    for (index, cell) in current.rows[row].iter().enumerate() {
        match &cell.kind {
            CellKind::Canvas(child) => {
                if grid.canvas(*child)?.is_if_below_layout {
                    return Ok(Some(RowShift::Nested(index, *child)));
                }
            }
            CellKind::Scope { .. }
            | CellKind::ScopeEdge {
                edge: ScopeEdge::Corner,
                ..
            } => return Ok(None),
            CellKind::Group(group) if group.kind == GroupKind::OpenBegin => {
                return Ok(Some(RowShift::Begin(index)))
            }
            CellKind::Group(group) if group.kind == GroupKind::OpenEnd => {
                return Ok(Some(RowShift::End(index)))
            }
            _ => {}
        }
    }
    let index = if current.is_no_scope { 0 } else { 1 };
    Ok(Some(RowShift::Regular(index)))
}

/// Inserts a spacer at `index` and moves everything after it one column to
/// the right, nested canvases included.
fn insert_spacer(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    index: usize,
    count: usize,
) -> Result<(), LayoutError> {
    let current = grid.canvas_mut(canvas)?;
    let cells = &mut current.rows[row];
    let index = index.min(cells.len());
    cells.insert(
        index,
        Cell::new(CellKind::HGroupSpacer { count }, canvas, index, row),
    );
    let mut moved = Vec::new();
    for cell in cells.iter_mut().skip(index + 1) {
        cell.column += 1;
        if let Some(child) = cell.nested_canvas() {
            moved.push(child);
        }
    }
    for child in moved {
        grid.canvas_mut(child)?.column += 1;
    }
    Ok(())
}

fn append_spacer(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    count: usize,
) -> Result<(), LayoutError> {
    let cells = &mut grid.canvas_mut(canvas)?.rows[row];
    let column = cells.len();
    cells.push(Cell::new(CellKind::HGroupSpacer { count }, canvas, column, row));
    Ok(())
}

fn insert_open_group_shift(
    grid: &mut Grid,
    canvas: CanvasId,
    depth: usize,
    inserted_by_upper: usize,
) -> Result<(), LayoutError> {
    if depth == 0 {
        return Ok(());
    }
    grid.canvas_mut(canvas)?.max_global_open_group_depth = depth;

    let mut level = 0usize;
    let mut counts: Vec<usize> = Vec::new();
    let row_count = grid.canvas(canvas)?.rows.len();
    for row in 0..row_count {
        let Some(shift) = insert_index(grid, canvas, row)? else {
            continue;
        };
        match shift {
            RowShift::Begin(index) => {
                let end_row = grid
                    .cell(canvas, row, index)?
                    .group()
                    .and_then(|group| group.end)
                    .map(|(end_row, _)| end_row)
                    .ok_or(LayoutError::UnpairedGroupMarker {
                        canvas: canvas.0,
                        row,
                        column: index,
                    })?;
                let (deeper, self_max) = update_group_nest_level(grid, canvas, row + 1, end_row)?;
                if let Some(group) = grid.cell_mut(canvas, row, index)?.group_mut() {
                    group.self_and_deeper = deeper + 1;
                    group.self_max = self_max + 1;
                }
                level += 1;
                let count = depth.saturating_sub(deeper + 1 + inserted_by_upper);
                counts.push(count);
                if count > 0 {
                    insert_spacer(grid, canvas, row, index, count)?;
                }
            }
            RowShift::End(index) => {
                let count = counts.pop().unwrap_or(0);
                let mut index = index;
                if count > 0 {
                    insert_spacer(grid, canvas, row, index, count)?;
                    index += 1;
                }
                level = level.saturating_sub(1);
                let mut begin = grid
                    .cell(canvas, row, index)?
                    .group()
                    .and_then(|group| group.begin)
                    .ok_or(LayoutError::UnpairedGroupMarker {
                        canvas: canvas.0,
                        row,
                        column: index,
                    })?;
                if count > 0 {
                    // Both markers moved right by the spacer inserted before them.
                    begin.1 += 1;
                    if let Some(group) = grid.cell_mut(canvas, row, index)?.group_mut() {
                        group.begin = Some(begin);
                    }
                    if let Some(group) = grid.cell_mut(canvas, begin.0, begin.1)?.group_mut() {
                        group.end = Some((row, index));
                    }
                }
                let self_and_deeper = grid
                    .cell(canvas, begin.0, begin.1)?
                    .group()
                    .map(|group| group.self_and_deeper)
                    .unwrap_or(0);
                if let Some(group) = grid.cell_mut(canvas, row, index)?.group_mut() {
                    group.self_and_deeper = self_and_deeper;
                }
            }
            RowShift::Nested(index, child) => {
                let mut count = 0;
                if grid.canvas(child)?.is_outer_if_layout {
                    let max_local = grid.canvas(canvas)?.max_local_open_group_depth;
                    count = max_local.saturating_sub(1).max(level);
                }
                if count > 0 {
                    insert_spacer(grid, canvas, row, index, count)?;
                    append_spacer(grid, canvas, row, count)?;
                }
                insert_open_group_shift(grid, child, depth, inserted_by_upper + count)?;
            }
            RowShift::Regular(index) => {
                let count = depth.saturating_sub(inserted_by_upper);
                if grid.canvas(canvas)?.is_outer_if_layout {
                    for cell in grid.canvas_mut(canvas)?.rows[row].iter_mut().skip(index) {
                        cell.h_shift = count;
                    }
                } else if count > 0 {
                    insert_spacer(grid, canvas, row, index, count)?;
                    append_spacer(grid, canvas, row, count)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SourceRange;

    fn marker(line: usize, text: &str) -> AnnotationSource {
        AnnotationSource::Text {
            line,
            column: 1,
            text: text.to_string(),
        }
    }

    fn block(line: usize) -> Fragment {
        let mut item = Fragment::new(FragmentKind::CodeBlock);
        item.range = SourceRange::line(line);
        item.text = format!("x{line} = {line}");
        item
    }

    fn annotation(line: usize, text: &str) -> Fragment {
        let mut item = Fragment::new(FragmentKind::Annotation);
        item.range = SourceRange::line(line);
        item.leading_annotations.push(marker(line, text));
        item
    }

    #[test]
    fn pairs_markers_within_a_suite() {
        let mut module = Fragment::new(FragmentKind::Module);
        module.suite = vec![
            annotation(1, "# cml 1 gb id=outer"),
            annotation(2, "# cml 1 gb id=inner"),
            block(3),
            annotation(4, "# cml 1 ge id=inner"),
            annotation(5, "# cml 1 ge id=outer"),
        ];
        let matched = match_markers(&module);
        assert!(matched.warnings.is_empty());
        assert_eq!(matched.valid.len(), 4);
    }

    #[test]
    fn crossing_and_unclosed_markers_are_reported() {
        let mut module = Fragment::new(FragmentKind::Module);
        module.suite = vec![
            annotation(1, "# cml 1 gb id=a"),
            annotation(2, "# cml 1 gb id=b"),
            annotation(3, "# cml 1 ge id=a"),
            block(4),
        ];
        let matched = match_markers(&module);
        assert!(matched.valid.is_empty());
        assert_eq!(matched.warnings.len(), 3);
        assert_eq!(matched.warnings[0].line, 3);
    }

    #[test]
    fn markers_do_not_pair_across_suites() {
        let mut function = Fragment::new(FragmentKind::Function);
        function.suite = vec![annotation(2, "# cml 1 ge id=a")];
        let mut module = Fragment::new(FragmentKind::Module);
        module.suite = vec![annotation(1, "# cml 1 gb id=a"), function];
        let matched = match_markers(&module);
        assert!(matched.valid.is_empty());
        assert_eq!(matched.warnings.len(), 2);
    }

    #[test]
    fn module_prelude_opens_groups_for_the_file_suite() {
        let mut module = Fragment::new(FragmentKind::Module);
        module.leading_annotations.push(marker(1, "# cml 1 gb id=top"));
        module.suite = vec![block(2), annotation(3, "# cml 1 ge id=top")];
        let matched = match_markers(&module);
        assert!(matched.warnings.is_empty());
        assert!(matched.valid.contains(&(1, 1)));
        assert!(matched.valid.contains(&(3, 1)));
    }
}
