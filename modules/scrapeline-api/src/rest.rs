use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::warn;

use scrapeline_common::{RecordType, ScrapeError};

use crate::AppState;

fn invalid_input() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": ScrapeError::InvalidInput.to_string() })),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// POST /api/scrape with `{url, type}`.
pub async fn api_scrape(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    // A body that is not JSON at all is as invalid as one with a bad type.
    let Ok(body) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return invalid_input();
    };

    match state.handler.handle_json(&body).await {
        Ok(done) => Json(json!({
            "success": true,
            "source": done.provenance.source_label(),
            "count": done.row_count,
        }))
        .into_response(),
        Err(ScrapeError::InvalidInput) => invalid_input(),
        // Kind and detail are already logged by the handler.
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Scraping failed." })),
        )
            .into_response(),
    }
}

/// GET /api/records/{type}
pub async fn api_records(
    State(state): State<Arc<AppState>>,
    Path(record_type): Path<String>,
) -> Response {
    let Ok(record_type) = record_type.parse::<RecordType>() else {
        return invalid_input();
    };
    let config = state.handler.registry().get(record_type);

    match state.exporter.records(config).await {
        Ok(records) => Json(json!({ "records": records })).into_response(),
        Err(e) => {
            warn!(%record_type, error = %e, "Failed to read records");
            internal_error()
        }
    }
}

/// GET /api/records/{type}/csv
pub async fn api_records_csv(
    State(state): State<Arc<AppState>>,
    Path(record_type): Path<String>,
) -> Response {
    let Ok(record_type) = record_type.parse::<RecordType>() else {
        return invalid_input();
    };
    let config = state.handler.registry().get(record_type);

    match state.exporter.csv(config).await {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{record_type}.csv\""),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(%record_type, error = %e, "Failed to export records");
            internal_error()
        }
    }
}
