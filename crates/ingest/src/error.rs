use thiserror::Error;

/// Failures that abort ingestion of a document (and therefore the request).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to download file: {url} ({reason})")]
    Fetch { url: String, reason: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to extract text from {format} document: {reason}")]
    Extraction { format: String, reason: String },

    #[error("Temporary storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid chunk window configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("overlap ({overlap} words) must be smaller than chunk size ({max} words)")]
    InvalidWindow { max: usize, overlap: usize },
}
