//! Diagnostic reporting for the scrape pipeline.
//!
//! Every warning and progress note the pipeline emits goes through the
//! `Diagnostics` trait, at fixed points. `TracingDiagnostics` forwards to
//! `tracing`; tests swap in `testing::RecordingDiagnostics`.

use tracing::{error, info, warn};

use scrapeline_common::{RecordType, ScrapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Why the primary path handed over to the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NoRecords,
    PrimaryFailed(String),
}

pub trait Diagnostics: Send + Sync {
    /// A page was extracted successfully but produced no valid records.
    fn empty_page(&self, record_type: RecordType, page: u32, url: &str);

    /// Extracted items failed schema validation and were dropped.
    fn records_rejected(&self, record_type: RecordType, rejected: usize, first_reason: &str);

    /// The whole primary run finished with zero records.
    fn empty_result(&self, record_type: RecordType);

    fn session_close_failed(&self, record_type: RecordType, error: &str);

    fn fallback_triggered(&self, record_type: RecordType, reason: &FallbackReason);

    /// One line of the fallback process's output.
    fn fallback_output(&self, stream: OutputStream, line: &str);

    fn terminal_failure(&self, record_type: RecordType, error: &ScrapeError);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn empty_page(&self, record_type: RecordType, page: u32, url: &str) {
        warn!(%record_type, page, url, "No items found on page");
    }

    fn records_rejected(&self, record_type: RecordType, rejected: usize, first_reason: &str) {
        warn!(%record_type, rejected, first_reason, "Dropped records failing schema validation");
    }

    fn empty_result(&self, record_type: RecordType) {
        warn!(%record_type, "Primary extraction returned no records");
    }

    fn session_close_failed(&self, record_type: RecordType, error: &str) {
        warn!(%record_type, error, "Failed to close browser session");
    }

    fn fallback_triggered(&self, record_type: RecordType, reason: &FallbackReason) {
        match reason {
            FallbackReason::NoRecords => {
                warn!(%record_type, "Primary extraction returned nothing, falling back")
            }
            FallbackReason::PrimaryFailed(e) => {
                warn!(%record_type, error = %e, "Primary extraction failed, falling back")
            }
        }
    }

    fn fallback_output(&self, stream: OutputStream, line: &str) {
        info!(target: "scrapeline::fallback", stream = stream.as_str(), "{line}");
    }

    fn terminal_failure(&self, record_type: RecordType, error: &ScrapeError) {
        error!(%record_type, kind = error.kind(), error = %error, "Scrape failed");
    }
}
