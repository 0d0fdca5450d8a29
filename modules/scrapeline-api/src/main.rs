use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scrapeline_api::{app, AppState};
use scrapeline_common::{Config, SchemaRegistry};
use scrapeline_pipeline::{
    Diagnostics, ExtractionOrchestrator, PersistenceGateway, PgRecordStore, ProcessFallback,
    RecordExporter, ScrapeHandler, StagehandProvider, TracingDiagnostics,
};
use stagehand_client::StagehandClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scrapeline=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgRecordStore::new(pool));
    if config.run_migrations {
        store.migrate().await?;
    }

    let mut client = StagehandClient::new(
        &config.stagehand_api_url,
        &config.browserbase_api_key,
        &config.browserbase_project_id,
    )?;
    if let Some(model) = &config.stagehand_model {
        client = client.with_model(model);
    }

    let diagnostics: Arc<dyn Diagnostics> = Arc::new(TracingDiagnostics);
    let orchestrator = ExtractionOrchestrator::new(
        Arc::new(StagehandProvider::new(client)),
        config.extraction.clone(),
        diagnostics.clone(),
    );
    let fallback = Arc::new(ProcessFallback::new(
        config.fallback.clone(),
        diagnostics.clone(),
    ));

    let handler = ScrapeHandler::new(
        Arc::new(SchemaRegistry::standard()),
        orchestrator,
        fallback,
        PersistenceGateway::new(store.clone()),
        config.fallback.data_dir.clone(),
        diagnostics,
    );

    let state = Arc::new(AppState {
        handler,
        exporter: RecordExporter::new(store),
    });

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Scrapeline API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
