//! HTTP surface: JSON and CSV analysis plus the synthetic data generator.

mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::Router;
use tower_http::trace::TraceLayer;

use self::state::AppState;

/// Largest accepted request body (a traffic log upload).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the application router: routes under `/api/v1`, request tracing,
/// and a JSON 404 for everything else.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> (StatusCode, axum::Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, axum::Json(serde_json::json!({ "error": "not found" })))
}
