use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use scrapeline_pipeline::{RecordExporter, ScrapeHandler};

pub mod rest;

pub struct AppState {
    pub handler: ScrapeHandler,
    pub exporter: RecordExporter,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route("/api/scrape", post(rest::api_scrape))
        .route("/api/records/{record_type}", get(rest::api_records))
        .route("/api/records/{record_type}/csv", get(rest::api_records_csv))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Method + path only, no query params.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
