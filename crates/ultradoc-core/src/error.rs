use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures raised by the core.
///
/// Absence (empty index, missing snapshot, rejected answer) is never an
/// error; those cases come back as empty collections or `None`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid chunking: chunk_size={chunk_size}, overlap={overlap} (need chunk_size > 0 and overlap < chunk_size)")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    #[error("invalid embedding dimension: {0}")]
    InvalidDimension(usize),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("length mismatch: {vectors} vectors for {chunks} chunks")]
    LengthMismatch { vectors: usize, chunks: usize },

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
