use crate::annotation::Warning;
use crate::ir::SourceRange;
use crate::layout::Layout;
use crate::theme::{CellColors, Theme};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub canvases: Vec<CanvasDump>,
    pub cells: Vec<CellDump>,
    pub connectors: Vec<ConnectorDump>,
    pub badges: Vec<BadgeDump>,
    pub groups: Vec<GroupDump>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDump {
    pub id: usize,
    pub parent: Option<usize>,
    pub scope: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rows: usize,
    pub dependent_regions: Vec<[usize; 2]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDump {
    pub canvas: usize,
    pub row: usize,
    pub column: usize,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_width: f32,
    pub min_height: f32,
    pub h_shift: usize,
    /// Canvas ids from the root down to the owning canvas.
    pub scope_path: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<CellColors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDump {
    pub canvas: usize,
    pub row: usize,
    pub column: usize,
    pub role: String,
    pub points: Vec<[f32; 2]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDump {
    pub text: String,
    pub canvas: usize,
    pub row: usize,
    pub column: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDump {
    pub id: String,
    pub title: Option<String>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub colors: CellColors,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout, theme: &Theme) -> Self {
        let canvases = layout
            .grid
            .canvases
            .iter()
            .map(|canvas| CanvasDump {
                id: canvas.id.0,
                parent: canvas.parent.map(|parent| parent.0),
                scope: canvas.scope.map(|scope| scope.name().to_string()),
                x: canvas.x,
                y: canvas.y,
                width: canvas.width,
                height: canvas.height,
                rows: canvas.rows.len(),
                dependent_regions: canvas
                    .dependent_regions
                    .iter()
                    .map(|&(begin, end)| [begin, end])
                    .collect(),
            })
            .collect();

        let cells = layout
            .grid
            .cells()
            .map(|cell| CellDump {
                canvas: cell.owner.0,
                row: cell.row,
                column: cell.column,
                kind: cell.kind.name(),
                x: cell.x,
                y: cell.y,
                width: cell.width,
                height: cell.height,
                min_width: cell.min_width,
                min_height: cell.min_height,
                h_shift: cell.h_shift,
                scope_path: layout
                    .grid
                    .scope_path(cell.owner)
                    .into_iter()
                    .map(|id| id.0)
                    .collect(),
                text: cell.text().map(str::to_string),
                range: cell.range(),
                colors: theme.colors_for(&cell.kind, &cell.colors()),
                nested: cell.nested_canvas().map(|id| id.0),
            })
            .collect();

        let connectors = layout
            .connectors
            .iter()
            .map(|segment| ConnectorDump {
                canvas: segment.canvas.0,
                row: segment.row,
                column: segment.column,
                role: format!("{:?}", segment.role),
                points: segment.points.iter().map(|(x, y)| [*x, *y]).collect(),
            })
            .collect();

        let badges = layout
            .badges
            .iter()
            .map(|badge| BadgeDump {
                text: badge.text.clone(),
                canvas: badge.canvas.0,
                row: badge.row,
                column: badge.column,
                x: badge.x,
                y: badge.y,
                width: badge.width,
                height: badge.height,
            })
            .collect();

        let groups = layout
            .groups
            .iter()
            .map(|group| GroupDump {
                id: group.id.clone(),
                title: group.title.clone(),
                depth: group.depth,
                x: group.x,
                y: group.y,
                width: group.width,
                height: group.height,
                colors: theme.group_frame_colors(&group.colors),
            })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            canvases,
            cells,
            connectors,
            badges,
            groups,
            warnings: layout.warnings.clone(),
        }
    }
}

/// Writes the dump to `path`, or pretty-printed to stdout when `path` is
/// `None`.
pub fn write_layout_dump(
    path: Option<&Path>,
    layout: &Layout,
    theme: &Theme,
) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout, theme);
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
