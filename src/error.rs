//! Error kinds raised while ingesting a single document.
//!
//! Every variant is caught at the pipeline boundary and turned into an
//! `error` status on the document record. Skipped events are not errors;
//! see [`IngestOutcome::Skipped`](crate::pipeline::IngestOutcome::Skipped).

use thiserror::Error;

/// Message stored on a record whose extraction produced no usable text.
pub const EMPTY_EXTRACTION_MESSAGE: &str = "Extracted text is empty";

/// Text extraction failure. The document body is malformed or of a kind
/// the extractor cannot read.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("unsupported document kind: {0}")]
    UnsupportedKind(String),
    /// The extractor panicked on the document body.
    #[error("text extraction aborted: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("{}", EMPTY_EXTRACTION_MESSAGE)]
    EmptyContent,

    #[error("failed to fetch object: {0}")]
    Fetch(String),

    #[error("knowledge store rejected batch: {0}")]
    Write(String),

    #[error("status update failed: {0}")]
    StatusUpdate(String),
}

impl IngestError {
    /// Short machine-friendly label used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Extraction(_) => "extraction",
            IngestError::EmptyContent => "empty_content",
            IngestError::Fetch(_) => "fetch",
            IngestError::Write(_) => "write",
            IngestError::StatusUpdate(_) => "status_update",
        }
    }
}
