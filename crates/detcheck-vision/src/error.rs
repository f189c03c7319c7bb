use thiserror::Error;

/// Malformed-input failures of the postprocessing core. Geometry that merely
/// degenerates (zero-area boxes) and empty results are not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VisionError {
    #[error("image has zero extent: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("image buffer size mismatch: expected {expected} bytes, got {got}")]
    BufferSize { expected: usize, got: usize },

    #[error("letterbox input size must be > 0")]
    ZeroInputSize,

    #[error("unexpected tensor shape {shape:?} holding {len} values")]
    TensorShape { shape: Vec<usize>, len: usize },

    #[error("{len} values do not split into rows of {columns}")]
    RowLength { len: usize, columns: usize },

    #[error("tensor byte length {0} is not a multiple of 4")]
    ByteLength(usize),

    #[error("tensor has {got} columns, expected 5 + {num_classes} = {expected}")]
    ColumnMismatch { got: usize, expected: usize, num_classes: usize },

    #[error("class count must be > 0")]
    NoClasses,
}

pub type VisionResult<T> = Result<T, VisionError>;
