//! Two-stage measurement: every cell gets its intrinsic size, then rows and
//! dependent regions are made uniform and open groups are sized around the
//! rows they enclose.

use super::cell::{borrow_rule, comment_box_width, intrinsic_size, Borrow, Style};
use super::error::LayoutError;
use super::types::{CanvasId, Cell, CellKind, GroupKind, Grid};

/// Measures `canvas` and everything nested in it. Returns its size.
pub(super) fn render(
    grid: &mut Grid,
    canvas: CanvasId,
    style: &Style<'_>,
) -> Result<(f32, f32), LayoutError> {
    let row_count = grid.canvas(canvas)?.rows.len();
    let mut regions = grid.canvas(canvas)?.dependent_regions.clone();
    regions.sort_unstable();
    for &(begin, end) in &regions {
        if begin > end || end >= row_count {
            return Err(LayoutError::RegionOutOfRange {
                canvas: canvas.0,
                begin,
                end,
                rows: row_count,
            });
        }
    }

    let mut pending = regions.into_iter().peekable();
    let mut row = 0;
    while row < row_count {
        while pending.peek().is_some_and(|&(begin, _)| begin < row) {
            pending.next();
        }
        match pending.peek().copied() {
            Some((begin, end)) if begin == row => {
                pending.next();
                render_region(grid, canvas, begin, end, style)?;
                row = end + 1;
            }
            _ => {
                for column in 0..grid.canvas(canvas)?.rows[row].len() {
                    measure_cell(grid, canvas, row, column, style)?;
                }
                uniform_row_height(grid, canvas, row)?;
                row += 1;
            }
        }
    }

    size_open_groups(grid, canvas, style)?;

    let c = style.config;
    let current = grid.canvas_mut(canvas)?;
    let mut width = current
        .rows
        .iter()
        .map(|cells| cells.iter().map(|cell| cell.width).sum::<f32>())
        .fold(0.0, f32::max);
    if current.has_scope() {
        width += c.scope_rect_radius + c.h_cell_padding;
    }
    let height = (0..current.rows.len()).map(|row| current.row_height(row)).sum();
    current.width = width;
    current.height = height;
    Ok((width, height))
}

fn measure_cell(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    column: usize,
    style: &Style<'_>,
) -> Result<(), LayoutError> {
    let nested = match grid.cell(canvas, row, column)?.nested_canvas() {
        Some(child) => Some(render(grid, child, style)?),
        None => None,
    };
    let cell = grid.cell_mut(canvas, row, column)?;
    let (width, height) = intrinsic_size(&cell.kind, cell.h_shift, nested, style);
    cell.min_width = width;
    cell.min_height = height;
    cell.width = width;
    cell.height = height;
    if cell.is_comment_like() && !cell.is_scope_element() {
        adjust_width(grid, canvas, row, column, style)?;
    }
    Ok(())
}

/// Lets a comment box use the spare width of its left neighbour so that it
/// does not push the column further right than needed.
fn adjust_width(
    grid: &mut Grid,
    canvas: CanvasId,
    row: usize,
    column: usize,
    style: &Style<'_>,
) -> Result<(), LayoutError> {
    let Some(left) = column.checked_sub(1) else {
        return Ok(());
    };
    let c = style.config;
    let cell = grid.cell(canvas, row, column)?;
    let Some(rule) = borrow_rule(&cell.kind) else {
        return Ok(());
    };
    let left = grid.cell(canvas, row, left)?;
    let spare = match rule {
        Borrow::PastMainLine => left.width - c.main_line - c.h_cell_padding,
        Borrow::PastIntrinsic => left.width - left.min_width,
        Borrow::FromConnector if left.is_proxy() => left.width - left.min_width,
        Borrow::FromConnectorPastMainLine if left.is_proxy() => {
            left.width - c.main_line - c.h_cell_padding
        }
        Borrow::FromConnector | Borrow::FromConnectorPastMainLine => return Ok(()),
    };
    let boxed = comment_box_width(&cell.kind, cell.min_width, c);
    let cell = grid.cell_mut(canvas, row, column)?;
    cell.min_width = if spare >= boxed { 0.0 } else { boxed - spare };
    cell.width = cell.min_width;
    Ok(())
}

/// Rows `begin..=end` share their column widths. A trailing comment keeps
/// its own width so that it cannot widen the region.
fn render_region(
    grid: &mut Grid,
    canvas: CanvasId,
    begin: usize,
    end: usize,
    style: &Style<'_>,
) -> Result<(), LayoutError> {
    let mut columns = 0;
    for row in begin..=end {
        let cells = &mut grid.canvas_mut(canvas)?.rows[row];
        columns = columns.max(cells.len());
        if let Some(last) = cells.last_mut() {
            last.tail_comment = matches!(last.kind, CellKind::Comment { .. });
        }
    }

    for column in 0..columns {
        let mut widest = 0.0f32;
        for row in begin..=end {
            if column >= grid.canvas(canvas)?.rows[row].len() {
                continue;
            }
            measure_cell(grid, canvas, row, column, style)?;
            let cell = grid.cell(canvas, row, column)?;
            if !cell.tail_comment {
                widest = widest.max(cell.width);
            }
        }
        for row in begin..=end {
            if let Some(cell) = grid.canvas_mut(canvas)?.rows[row].get_mut(column) {
                if !cell.tail_comment {
                    cell.width = widest;
                }
            }
        }
    }

    for row in begin..=end {
        uniform_row_height(grid, canvas, row)?;
    }
    Ok(())
}

/// Gives every cell of `row` the row's maximum height. Nested canvases
/// without a scope stretch their last row to match.
fn uniform_row_height(grid: &mut Grid, canvas: CanvasId, row: usize) -> Result<(), LayoutError> {
    let cells = &mut grid.canvas_mut(canvas)?.rows[row];
    let tallest = cells.iter().map(|cell| cell.height).fold(0.0, f32::max);
    let mut stretched = Vec::new();
    for cell in cells.iter_mut() {
        cell.height = tallest;
        if let Some(child) = cell.nested_canvas() {
            stretched.push(child);
        }
    }
    for child in stretched {
        if !grid.canvas(child)?.has_scope() {
            adjust_last_cell_height(grid, child, tallest)?;
        }
    }
    Ok(())
}

/// Stretches the last meaningful row of `canvas` so that the canvas is
/// `target` high.
fn adjust_last_cell_height(
    grid: &mut Grid,
    canvas: CanvasId,
    target: f32,
) -> Result<(), LayoutError> {
    let current = grid.canvas(canvas)?;
    let Some(last) = current.last_meaningful_row() else {
        return Ok(());
    };
    let rest: f32 = (0..current.rows.len())
        .filter(|&row| row != last)
        .map(|row| current.row_height(row))
        .sum();

    let mut stretched = Vec::new();
    let current = grid.canvas_mut(canvas)?;
    for cell in current.rows[last].iter_mut() {
        if rest + cell.height < target {
            cell.height = target - rest;
            if let Some(child) = cell.nested_canvas() {
                stretched.push((child, cell.height));
            }
        }
    }
    current.height = current.height.max(target);
    for (child, height) in stretched {
        if !grid.canvas(child)?.has_scope() {
            adjust_last_cell_height(grid, child, height)?;
        }
    }
    Ok(())
}

/// Sizes every open group begin cell: the enclosed rows' height and the
/// widest of them from the group's column on, plus room for nested borders.
fn size_open_groups(
    grid: &mut Grid,
    canvas: CanvasId,
    style: &Style<'_>,
) -> Result<(), LayoutError> {
    let spacing = 4.0 * style.config.open_group_h_spacer;
    let current = grid.canvas_mut(canvas)?;
    let mut spans = Vec::new();
    for cells in &current.rows {
        for cell in cells {
            let Some(group) = cell.group() else {
                continue;
            };
            if group.kind != GroupKind::OpenEnd {
                continue;
            }
            if let Some(begin) = group.begin {
                spans.push((begin, cell.row));
            }
        }
    }

    for ((begin_row, begin_column), end_row) in spans {
        let mut height = 0.0;
        let mut width = 0.0f32;
        for row in begin_row + 1..end_row {
            height += current.row_height(row);
            let row_width: f32 = current.rows[row]
                .iter()
                .skip(begin_column)
                .filter(|cell| !matches!(cell.kind, CellKind::HGroupSpacer { .. }))
                .map(|cell| cell.width)
                .sum();
            width = width.max(row_width);
        }
        let Some(group) = current
            .rows
            .get_mut(begin_row)
            .and_then(|cells| cells.get_mut(begin_column))
            .and_then(Cell::group_mut)
        else {
            return Err(LayoutError::UnpairedGroupMarker {
                canvas: canvas.0,
                row: begin_row,
                column: begin_column,
            });
        };
        group.group_height = height;
        group.group_width = width + group.self_max.saturating_sub(1) as f32 * spacing;
    }
    Ok(())
}
