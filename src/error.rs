//! Error taxonomy for the pipeline.
//!
//! Ingestion errors propagate to the caller so batch-level policy stays
//! with it; query answering catches everything and degrades to a fallback
//! reply (see [`crate::query`]).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    /// Input could not be turned into text (corrupt file, bad encoding).
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// URL fetch failed: network error, timeout, or non-2xx status.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Embedding provider unavailable or returned a malformed response.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Vector index storage error.
    #[error("vector index error: {0}")]
    Index(#[from] sqlx::Error),

    /// Generation provider unavailable or returned a malformed response.
    #[error("generation provider error: {0}")]
    Generation(String),

    /// Document-record store error.
    #[error("document store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, RagError>;
