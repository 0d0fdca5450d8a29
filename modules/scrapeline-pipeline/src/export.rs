// Read-back of persisted records as JSON objects or CSV.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};

use scrapeline_common::TypeConfig;

use crate::traits::RecordStore;

pub struct RecordExporter {
    store: Arc<dyn RecordStore>,
}

impl RecordExporter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persisted rows as objects keyed by field name, in insertion order.
    /// Null columns come back as JSON null.
    pub async fn records(&self, config: &TypeConfig) -> Result<Vec<Value>> {
        let columns: Vec<&str> = config.schema.field_names().collect();
        let rows = self.store.fetch_rows(&config.table_name, &columns).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let object: Map<String, Value> = columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.to_string(), v.map(Value::String).unwrap_or(Value::Null)))
                    .collect();
                Value::Object(object)
            })
            .collect())
    }

    /// Persisted rows as CSV with a header row in field order. Null columns
    /// are written as empty cells.
    pub async fn csv(&self, config: &TypeConfig) -> Result<String> {
        let columns: Vec<&str> = config.schema.field_names().collect();
        let rows = self.store.fetch_rows(&config.table_name, &columns).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&columns)?;
        for row in rows {
            writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }
}
