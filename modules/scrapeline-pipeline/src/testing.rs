// Test mocks for the scrape pipeline.
//
// One mock per trait boundary, all writing to a shared CallLog so tests can
// assert cross-collaborator ordering (e.g. session closed before fallback):
// - MockSessionProvider (SessionProvider): scripted extract responses
// - MockFallback (FallbackRunner): optionally writes a CSV, then Ok/Err
// - MockRecordStore (RecordStore): in-memory tables
// - RecordingDiagnostics (Diagnostics): captures events
//
// Plus fixture helpers for book/business items and CSV bodies.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use scrapeline_common::{
    ExtractedRecord, ExtractionPolicy, RecordType, ScrapeError, ScrapeResult,
};

use crate::diagnostics::{Diagnostics, FallbackReason, OutputStream};
use crate::traits::{BrowserSession, FallbackRunner, RecordStore, SessionProvider, WaitPolicy};

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// Ordered record of collaborator calls, shared across mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.starts_with(prefix))
    }
}

/// Default extraction policy without settle delays.
pub fn fast_policy() -> ExtractionPolicy {
    ExtractionPolicy {
        books_settle: Duration::ZERO,
        businesses_settle: Duration::ZERO,
        ..ExtractionPolicy::default()
    }
}

// ---------------------------------------------------------------------------
// MockSessionProvider
// ---------------------------------------------------------------------------

type ExtractScript = Arc<Mutex<VecDeque<std::result::Result<Vec<Value>, String>>>>;

/// Scripted extractor. Each `extract` call pops the next queued response;
/// once the queue is drained, extractions return no items.
#[derive(Clone)]
pub struct MockSessionProvider {
    log: CallLog,
    extracts: ExtractScript,
    fail_open: Option<String>,
    fail_goto: Option<String>,
    fail_close: Option<String>,
}

impl MockSessionProvider {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            extracts: Arc::new(Mutex::new(VecDeque::new())),
            fail_open: None,
            fail_goto: None,
            fail_close: None,
        }
    }

    pub fn on_extract(self, response: std::result::Result<Vec<Value>, String>) -> Self {
        self.extracts.lock().unwrap().push_back(response);
        self
    }

    pub fn fail_open(mut self, message: &str) -> Self {
        self.fail_open = Some(message.to_string());
        self
    }

    pub fn fail_goto(mut self, message: &str) -> Self {
        self.fail_goto = Some(message.to_string());
        self
    }

    pub fn fail_close(mut self, message: &str) -> Self {
        self.fail_close = Some(message.to_string());
        self
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.log.push("session:open");
        if let Some(msg) = &self.fail_open {
            bail!("{msg}");
        }
        Ok(Box::new(MockSession {
            log: self.log.clone(),
            extracts: self.extracts.clone(),
            fail_goto: self.fail_goto.clone(),
            fail_close: self.fail_close.clone(),
        }))
    }
}

struct MockSession {
    log: CallLog,
    extracts: ExtractScript,
    fail_goto: Option<String>,
    fail_close: Option<String>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn goto(&mut self, url: &str, _wait: WaitPolicy) -> Result<()> {
        self.log.push(format!("session:goto {url}"));
        match &self.fail_goto {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }

    async fn extract(&mut self, _instruction: &str, _schema: &Value) -> Result<Vec<Value>> {
        self.log.push("session:extract");
        match self.extracts.lock().unwrap().pop_front() {
            Some(Ok(items)) => Ok(items),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.log.push("session:close");
        match &self.fail_close {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockFallback
// ---------------------------------------------------------------------------

/// Stand-in for the fallback process. Writes `csv` to the output path when
/// set, then returns `Ok` or the configured error.
pub struct MockFallback {
    log: CallLog,
    csv: Option<String>,
    error: Option<ScrapeError>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl MockFallback {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            csv: None,
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn writes_csv(mut self, contents: impl Into<String>) -> Self {
        self.csv = Some(contents.into());
        self
    }

    pub fn fails_with(mut self, error: ScrapeError) -> Self {
        self.error = Some(error);
        self
    }

    /// `(url, output_path)` for every invocation.
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackRunner for MockFallback {
    async fn run(&self, url: &str, output_path: &Path) -> ScrapeResult<()> {
        self.log.push(format!("fallback:run {url}"));
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), output_path.to_path_buf()));

        if let Some(contents) = &self.csv {
            if let Some(parent) = output_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ScrapeError::FallbackFailed(e.to_string()))?;
            }
            tokio::fs::write(output_path, contents)
                .await
                .map_err(|e| ScrapeError::FallbackFailed(e.to_string()))?;
        }

        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockRecordStore
// ---------------------------------------------------------------------------

type Row = Vec<Option<String>>;

/// In-memory tables. Uses the trait's default two-step `replace`, so a failed
/// insert after a successful truncate leaves the table empty.
pub struct MockRecordStore {
    log: CallLog,
    tables: Mutex<HashMap<String, (Vec<String>, Vec<Row>)>>,
    fail_truncate: Option<String>,
    fail_insert: Option<String>,
}

impl MockRecordStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            tables: Mutex::new(HashMap::new()),
            fail_truncate: None,
            fail_insert: None,
        }
    }

    /// Pre-populate `table` with rows projected onto `columns`.
    pub fn with_rows(self, table: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        self.tables.lock().unwrap().insert(
            table.to_string(),
            (columns.iter().map(|c| c.to_string()).collect(), rows),
        );
        self
    }

    pub fn fail_truncate(mut self, message: &str) -> Self {
        self.fail_truncate = Some(message.to_string());
        self
    }

    pub fn fail_insert(mut self, message: &str) -> Self {
        self.fail_insert = Some(message.to_string());
        self
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|(_, rows)| rows.len())
            .unwrap_or(0)
    }

    /// Values of one column across the table, in insertion order.
    pub fn column(&self, table: &str, column: &str) -> Vec<Option<String>> {
        let tables = self.tables.lock().unwrap();
        let Some((columns, rows)) = tables.get(table) else {
            return Vec::new();
        };
        let Some(idx) = columns.iter().position(|c| c == column) else {
            return Vec::new();
        };
        rows.iter().map(|r| r[idx].clone()).collect()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn truncate(&self, table: &str) -> Result<()> {
        self.log.push(format!("store:truncate {table}"));
        if let Some(msg) = &self.fail_truncate {
            bail!("{msg}");
        }
        if let Some((_, rows)) = self.tables.lock().unwrap().get_mut(table) {
            rows.clear();
        }
        Ok(())
    }

    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        records: &[ExtractedRecord],
    ) -> Result<u64> {
        self.log
            .push(format!("store:insert {table} {}", records.len()));
        if let Some(msg) = &self.fail_insert {
            bail!("{msg}");
        }
        let mut tables = self.tables.lock().unwrap();
        let entry = tables
            .entry(table.to_string())
            .or_insert_with(|| (columns.iter().map(|c| c.to_string()).collect(), Vec::new()));
        for record in records {
            entry
                .1
                .push(columns.iter().map(|c| record.get(c).map(String::from)).collect());
        }
        Ok(records.len() as u64)
    }

    async fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Row>> {
        self.log.push(format!("store:fetch {table}"));
        let tables = self.tables.lock().unwrap();
        let Some((stored_columns, rows)) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let indices: Vec<Option<usize>> = columns
            .iter()
            .map(|c| stored_columns.iter().position(|s| s == c))
            .collect();
        Ok(rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row[i].clone()))
                    .collect()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// RecordingDiagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    EmptyPage {
        record_type: RecordType,
        page: u32,
    },
    RecordsRejected {
        record_type: RecordType,
        rejected: usize,
        first_reason: String,
    },
    EmptyResult {
        record_type: RecordType,
    },
    SessionCloseFailed {
        record_type: RecordType,
        error: String,
    },
    FallbackTriggered {
        record_type: RecordType,
        reason: FallbackReason,
    },
    FallbackOutput {
        stream: OutputStream,
        line: String,
    },
    TerminalFailure {
        record_type: RecordType,
        kind: &'static str,
    },
}

#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Fallback output lines for one stream, in arrival order.
    pub fn output_lines(&self, stream: OutputStream) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::FallbackOutput { stream: s, line } if s == stream => Some(line),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn empty_page(&self, record_type: RecordType, page: u32, _url: &str) {
        self.record(DiagnosticEvent::EmptyPage { record_type, page });
    }

    fn records_rejected(&self, record_type: RecordType, rejected: usize, first_reason: &str) {
        self.record(DiagnosticEvent::RecordsRejected {
            record_type,
            rejected,
            first_reason: first_reason.to_string(),
        });
    }

    fn empty_result(&self, record_type: RecordType) {
        self.record(DiagnosticEvent::EmptyResult { record_type });
    }

    fn session_close_failed(&self, record_type: RecordType, error: &str) {
        self.record(DiagnosticEvent::SessionCloseFailed {
            record_type,
            error: error.to_string(),
        });
    }

    fn fallback_triggered(&self, record_type: RecordType, reason: &FallbackReason) {
        self.record(DiagnosticEvent::FallbackTriggered {
            record_type,
            reason: reason.clone(),
        });
    }

    fn fallback_output(&self, stream: OutputStream, line: &str) {
        self.record(DiagnosticEvent::FallbackOutput {
            stream,
            line: line.to_string(),
        });
    }

    fn terminal_failure(&self, record_type: RecordType, error: &ScrapeError) {
        self.record(DiagnosticEvent::TerminalFailure {
            record_type,
            kind: error.kind(),
        });
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `count` distinct book items as the remote extractor would return them.
pub fn book_items(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "name": format!("Book {i}"),
                "price": format!("£{i}.99"),
                "star_rating": "Three",
                "instock_availability": "In stock",
            })
        })
        .collect()
}

/// `count` distinct business items.
pub fn business_items(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "name": format!("Business {i}"),
                "phone": format!("+1415555{i:04}"),
                "principal_contact": "Jane Doe",
                "address": format!("{i} Market St, San Francisco, CA"),
                "accreditation": "A+",
                "url": format!("https://www.bbb.org/profile/business-{i}"),
            })
        })
        .collect()
}

/// A books CSV as the fallback scraper writes it, with `count` data rows.
pub fn books_csv(count: usize) -> String {
    let mut out = String::from("name,price,star_rating,instock_availability\n");
    for i in 1..=count {
        out.push_str(&format!("\"Book {i}\",£{i}.00,Four,In stock\n"));
    }
    out
}

/// A businesses CSV as the fallback scraper writes it, with `count` data rows.
pub fn businesses_csv(count: usize) -> String {
    let mut out = String::from("name,phone,principal_contact,address,accreditation,url\n");
    for i in 1..=count {
        out.push_str(&format!(
            "\"Business {i}\",+1415555{i:04},Jane Doe,\"{i} Market St, San Francisco, CA\",A+,https://www.bbb.org/profile/business-{i}\n"
        ));
    }
    out
}
