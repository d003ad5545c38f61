use thiserror::Error;

/// Coarse classification of [`LayerError`], used by callers and tests that
/// care about *why* a recognition result was rejected rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedSegment,
    Unsorted,
    Alignment,
    Geometry,
    Structural,
}

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("{what}: expected exactly one text segment, found {found}")]
    SegmentCount { what: String, found: usize },
    #[error("{what}: text segment has no {field}")]
    MissingOffset { what: String, field: &'static str },
    #[error("{what}: invalid text offset {value:?}")]
    InvalidOffset { what: String, value: String },
    #[error("{what}: text segment {start}-{end} does not fit a text of {len} characters")]
    SegmentOutOfRange {
        what: String,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("last word in line {range} should end with \\n, got {text:?}")]
    MissingLineBreak { range: String, text: String },
    #[error("{what} unsorted: entry {index} starts at {current}, before {previous}")]
    Unsorted {
        what: &'static str,
        index: usize,
        previous: usize,
        current: usize,
    },
    #[error(
        "start or end not found exactly: {line} vs first token: {first} to {last}: {line_text:?} vs. {token_texts:?}"
    )]
    Alignment {
        line: String,
        first: String,
        last: String,
        line_text: String,
        token_texts: Vec<String>,
    },
    #[error("{what}: no bounding quad")]
    MissingQuad { what: String },
    #[error("{what}: expected 4 normalized vertices, found {found}")]
    QuadCorners { what: String, found: usize },
    #[error("page has no pixel width or height")]
    MissingDimensions,
    #[error("not exactly one transform: found {0}")]
    TransformCount(usize),
    #[error("transform is not a f64 matrix (type {0:?})")]
    TransformType(Option<i32>),
    #[error("transform has wrong size: {rows:?}x{cols:?}, expected 2x3")]
    TransformShape { rows: Option<i32>, cols: Option<i32> },
    #[error("transform payload invalid: {0}")]
    TransformData(String),
    #[error("dpi not square: {x}x{y}")]
    NonSquareDpi { x: f64, y: f64 },
    #[error("not exactly one page: found {0}")]
    PageCount(usize),
    #[error("document has no text")]
    EmptyText,
    #[error("page has no lines")]
    MissingLines,
}

impl LayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayerError::SegmentCount { .. }
            | LayerError::MissingOffset { .. }
            | LayerError::InvalidOffset { .. }
            | LayerError::SegmentOutOfRange { .. }
            | LayerError::MissingLineBreak { .. } => ErrorKind::MalformedSegment,
            LayerError::Unsorted { .. } => ErrorKind::Unsorted,
            LayerError::Alignment { .. } => ErrorKind::Alignment,
            LayerError::MissingQuad { .. }
            | LayerError::QuadCorners { .. }
            | LayerError::MissingDimensions
            | LayerError::TransformType(_)
            | LayerError::TransformShape { .. }
            | LayerError::TransformData(_)
            | LayerError::NonSquareDpi { .. } => ErrorKind::Geometry,
            LayerError::TransformCount(_)
            | LayerError::PageCount(_)
            | LayerError::EmptyText
            | LayerError::MissingLines => ErrorKind::Structural,
        }
    }
}
