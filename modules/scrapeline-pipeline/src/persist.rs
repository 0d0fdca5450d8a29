// Persistence: replace a record type's table with a fresh batch.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use scrapeline_common::{
    ExtractedRecord, ExtractionOutcome, PersistResult, ScrapeError, ScrapeResult, TypeConfig,
};

use crate::traits::RecordStore;

/// Postgres caps a statement at 65535 bind parameters.
const BIND_LIMIT: usize = 65_535;

pub struct PersistenceGateway {
    store: Arc<dyn RecordStore>,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Truncate `config`'s table and insert `outcome.records` in order.
    ///
    /// An empty batch returns a zero count without touching the store, so a
    /// previous good dataset is never wiped by an empty one.
    pub async fn replace(
        &self,
        config: &TypeConfig,
        outcome: ExtractionOutcome,
    ) -> ScrapeResult<PersistResult> {
        let table = config.table_name.as_str();
        if outcome.records.is_empty() {
            debug!(table, "Empty batch, leaving table untouched");
            return Ok(PersistResult {
                table_name: table.to_string(),
                row_count: 0,
                provenance: outcome.provenance,
            });
        }

        let columns: Vec<&str> = config.schema.field_names().collect();
        let inserted = self
            .store
            .replace(table, &columns, &outcome.records)
            .await
            .map_err(|e| ScrapeError::PersistFailed(format!("{table}: {e:#}")))?;

        info!(table, rows = inserted, provenance = %outcome.provenance, "Table replaced");
        Ok(PersistResult {
            table_name: table.to_string(),
            row_count: outcome.records.len(),
            provenance: outcome.provenance,
        })
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn insert_chunked(
    conn: &mut PgConnection,
    table: &str,
    columns: &[&str],
    records: &[ExtractedRecord],
) -> Result<u64> {
    let per_statement = (BIND_LIMIT / columns.len().max(1)).max(1);
    let mut inserted = 0;

    for chunk in records.chunks(per_statement) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            quote_ident(table),
            column_list(columns)
        ));
        qb.push_values(chunk, |mut row, record| {
            for column in columns {
                row.push_bind(record.get(column).map(str::to_owned));
            }
        });
        inserted += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn truncate(&self, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", quote_ident(table));
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        records: &[ExtractedRecord],
    ) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        insert_chunked(&mut conn, table, columns, records).await
    }

    /// Truncate and insert in one transaction. A failed insert rolls back
    /// the truncate and the previous rows survive.
    async fn replace(
        &self,
        table: &str,
        columns: &[&str],
        records: &[ExtractedRecord],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("TRUNCATE TABLE {}", quote_ident(table));
        sqlx::query(&sql).execute(&mut *tx).await?;

        let inserted = insert_chunked(&mut tx, table, columns, records).await?;

        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Option<String>>>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id",
            column_list(columns),
            quote_ident(table)
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| row.try_get::<Option<String>, _>(i).map_err(Into::into))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}
