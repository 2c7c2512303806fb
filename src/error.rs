use thiserror::Error;

/// Failure taxonomy for the extraction pipeline.
///
/// Per-document failures (`TextExtraction`, `OracleViolation`) are isolated:
/// the offending document is dropped and the batch continues. `EmptyBatch`
/// and `OracleUnavailable` are batch-level conditions.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no extractable text in {document}: {reason}")]
    TextExtraction { document: String, reason: String },

    #[error("oracle response for {document} violates the extraction contract: {reason}")]
    OracleViolation { document: String, reason: String },

    #[error("extraction oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("no rows extracted from any document in the batch")]
    EmptyBatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
