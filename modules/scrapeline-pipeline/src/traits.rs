// Trait abstractions for the scrape pipeline's external collaborators.
//
// SessionProvider / BrowserSession: the remote, instruction-driven extractor.
// FallbackRunner: the out-of-process scraper that writes a CSV.
// RecordStore: truncate + bulk insert on a named table.
//
// Each has a production impl (Stagehand, subprocess, Postgres) and a mock in
// `testing` so the handler can be exercised without network, processes or DB.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use scrapeline_common::{ExtractedRecord, ScrapeResult};

/// When a navigation counts as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    Load,
    NetworkIdle,
}

// ---------------------------------------------------------------------------
// Remote extractor
// ---------------------------------------------------------------------------

/// One managed browser session, exclusively owned by a single request.
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str, wait: WaitPolicy) -> Result<()>;

    /// Run an instruction-driven extraction on the current page and return the
    /// raw, unvalidated items.
    async fn extract(
        &mut self,
        instruction: &str,
        schema: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Acquire and initialize a fresh session.
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

// ---------------------------------------------------------------------------
// Fallback process
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FallbackRunner: Send + Sync {
    /// Run the fallback scraper against `url`, writing its CSV to `output_path`.
    /// Resolves only if the process exits with code 0.
    async fn run(&self, url: &str, output_path: &Path) -> ScrapeResult<()>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn truncate(&self, table: &str) -> Result<()>;

    /// Insert `records`, writing `columns` in order. Returns rows inserted.
    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        records: &[ExtractedRecord],
    ) -> Result<u64>;

    /// Replace a table's contents. The default is the bare two-step sequence:
    /// if the insert fails after the truncate succeeded, the table is left
    /// empty. Stores that can do better override this.
    async fn replace(
        &self,
        table: &str,
        columns: &[&str],
        records: &[ExtractedRecord],
    ) -> Result<u64> {
        self.truncate(table).await?;
        self.bulk_insert(table, columns, records).await
    }

    /// Every row of `table`, in insertion order, projected onto `columns`.
    async fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Option<String>>>>;
}
