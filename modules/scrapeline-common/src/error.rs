//! Typed errors for the scrape pipeline.

use thiserror::Error;

/// Every way a scrape request can end badly.
///
/// Only `InvalidInput` carries a user-facing message. `ExtractionFailed` never
/// leaves the pipeline: it is absorbed into a fallback attempt. The remaining
/// kinds are terminal and reported to callers as one generic failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeError {
    #[error("Invalid input")]
    InvalidInput,

    #[error("primary extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("fallback extraction failed: {0}")]
    FallbackFailed(String),

    #[error("fallback output could not be ingested: {0}")]
    IngestFailed(String),

    #[error("persisting records failed: {0}")]
    PersistFailed(String),
}

impl ScrapeError {
    /// Stable kind label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::InvalidInput => "invalid_input",
            ScrapeError::ExtractionFailed(_) => "extraction_failed",
            ScrapeError::FallbackFailed(_) => "fallback_failed",
            ScrapeError::IngestFailed(_) => "ingest_failed",
            ScrapeError::PersistFailed(_) => "persist_failed",
        }
    }
}

/// An extracted item that does not satisfy its record type's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record rejected: {0}")]
pub struct RecordRejected(pub String);

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
