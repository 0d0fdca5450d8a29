//! Request handler: the per-request state machine.
//!
//! ```text
//! Validating ─▶ PrimaryExtracting ─┬─▶ Persisting ─▶ Done
//!                                  └─▶ FallbackExtracting ─▶ Ingesting ─▶ Persisting ─▶ Done
//! ```
//!
//! Any terminal error moves to Failed. `ExtractionFailed` is never terminal:
//! it routes to the fallback the same way an empty primary result does.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use scrapeline_common::{
    ExtractionOutcome, PersistResult, Provenance, SchemaRegistry, ScrapeError, ScrapeRequest,
    ScrapeResult, TypeConfig,
};

use crate::diagnostics::{Diagnostics, FallbackReason};
use crate::ingest::{read_rows_blocking, row_to_value};
use crate::normalize::{dedup, validate_items};
use crate::orchestrator::ExtractionOrchestrator;
use crate::persist::PersistenceGateway;
use crate::traits::FallbackRunner;

pub struct ScrapeHandler {
    registry: Arc<SchemaRegistry>,
    orchestrator: ExtractionOrchestrator,
    fallback: Arc<dyn FallbackRunner>,
    gateway: PersistenceGateway,
    data_dir: PathBuf,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ScrapeHandler {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        orchestrator: ExtractionOrchestrator,
        fallback: Arc<dyn FallbackRunner>,
        gateway: PersistenceGateway,
        data_dir: impl Into<PathBuf>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            fallback,
            gateway,
            data_dir: data_dir.into(),
            diagnostics,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate a raw `{url, type}` body, then run it.
    pub async fn handle_json(&self, body: &serde_json::Value) -> ScrapeResult<PersistResult> {
        let request = ScrapeRequest::from_json(body)?;
        self.handle(request).await
    }

    /// Run one validated request to Done or Failed.
    pub async fn handle(&self, request: ScrapeRequest) -> ScrapeResult<PersistResult> {
        let span = info_span!(
            "scrape",
            request_id = %Uuid::new_v4(),
            record_type = %request.record_type,
            url = %request.url,
        );

        async {
            let config = self.registry.get(request.record_type);
            let result = self.run(&request, config).await;
            match &result {
                Ok(done) => info!(
                    source = done.provenance.source_label(),
                    count = done.row_count,
                    "Scrape complete"
                ),
                Err(e) => self.diagnostics.terminal_failure(request.record_type, e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &ScrapeRequest, config: &TypeConfig) -> ScrapeResult<PersistResult> {
        let outcome = match self.orchestrator.run(request, config).await {
            Ok(records) if !records.is_empty() => ExtractionOutcome {
                records,
                provenance: Provenance::Primary,
            },
            Ok(_) => {
                self.diagnostics
                    .fallback_triggered(config.record_type, &FallbackReason::NoRecords);
                self.run_fallback(request, config).await?
            }
            Err(e) => {
                self.diagnostics.fallback_triggered(
                    config.record_type,
                    &FallbackReason::PrimaryFailed(e.to_string()),
                );
                self.run_fallback(request, config).await?
            }
        };

        self.gateway.replace(config, outcome).await
    }

    async fn run_fallback(
        &self,
        request: &ScrapeRequest,
        config: &TypeConfig,
    ) -> ScrapeResult<ExtractionOutcome> {
        let output_path = self.data_dir.join(&config.output_file_name);
        self.fallback.run(&request.url, &output_path).await?;

        let rows = read_rows_blocking(output_path.clone()).await?;
        let read = rows.len();
        let records = dedup(validate_items(
            config,
            rows.into_iter().map(row_to_value),
            self.diagnostics.as_ref(),
        ));

        if records.is_empty() {
            return Err(ScrapeError::IngestFailed(format!(
                "no valid rows in {} ({read} read)",
                output_path.display()
            )));
        }

        info!(read, valid = records.len(), "Fallback output ingested");
        Ok(ExtractionOutcome {
            records,
            provenance: Provenance::Fallback,
        })
    }
}
