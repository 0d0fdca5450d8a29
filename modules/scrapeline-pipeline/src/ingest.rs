// CSV ingestion of the fallback scraper's output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scrapeline_common::{ScrapeError, ScrapeResult};

/// One CSV data row keyed by header name. Values are the literal cell text.
pub type CsvRow = HashMap<String, String>;

/// Read every data row of `path` in file order. The header row names the
/// fields. The file is closed when this returns, on success or error.
pub fn read_rows(path: &Path) -> ScrapeResult<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ScrapeError::IngestFailed(format!("open {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| ScrapeError::IngestFailed(format!("read header: {e}")))?
        .clone();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| ScrapeError::IngestFailed(format!("row {}: {e}", idx + 1)))?;
        let row: CsvRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// `read_rows` off the async executor.
pub async fn read_rows_blocking(path: PathBuf) -> ScrapeResult<Vec<CsvRow>> {
    tokio::task::spawn_blocking(move || read_rows(&path))
        .await
        .map_err(|e| ScrapeError::IngestFailed(format!("ingest task failed: {e}")))?
}

/// Lift a CSV row into the loosely typed shape schema validation expects.
pub fn row_to_value(row: CsvRow) -> serde_json::Value {
    serde_json::Value::Object(
        row.into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect(),
    )
}
