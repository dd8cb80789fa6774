/// Structural failures. Any of these aborts the layout run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("canvas {id} does not exist")]
    MissingCanvas { id: usize },
    #[error("cell ({row}, {column}) is outside canvas {canvas}")]
    CellOutOfRange {
        canvas: usize,
        row: usize,
        column: usize,
    },
    #[error("dependent region {begin}..={end} is outside canvas {canvas} with {rows} rows")]
    RegionOutOfRange {
        canvas: usize,
        begin: usize,
        end: usize,
        rows: usize,
    },
    #[error("top level fragment must be a module, got {kind}")]
    NotAModule { kind: String },
    #[error("group marker at ({row}, {column}) of canvas {canvas} has no counterpart")]
    UnpairedGroupMarker {
        canvas: usize,
        row: usize,
        column: usize,
    },
}
