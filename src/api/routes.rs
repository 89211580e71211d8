//! API route definitions.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::state::AppState;
use crate::detect::DetectError;
use crate::report::AnalysisReport;
use crate::traffic::generate::{generate, GeneratorOptions};
use crate::traffic::ingest::{read_csv, IngestError};
use crate::traffic::{Feature, TrafficRecord};

// A month of one-per-minute records.
const MAX_GENERATE_HOURS: u32 = 24 * 31;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/analyze/csv", post(analyze_csv))
        .route("/generate", post(generate_data))
}

enum ApiError {
    Invalid(DetectError),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(e) => {
                warn!(error = %e, "rejected analysis request");
                let body = match &e {
                    DetectError::DataValidation { issues } => json!({ "error": e.to_string(), "issues": issues }),
                    DetectError::Configuration { .. } => json!({ "error": e.to_string() }),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response(),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))).into_response()
            }
        }
    }
}

// Malformed bodies get the same JSON error shape as everything else.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Invalid(e) => ApiError::Invalid(e),
            IngestError::Csv(e) => ApiError::BadRequest(format!("failed to read CSV: {}", e)),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    records: Vec<TrafficRecord>,
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let Json(req) = payload?;
    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || crate::analyze(&req.records, &config))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::Invalid)?;
    Ok(Json(report))
}

/// Same as `/analyze`, but the body is a CSV traffic log.
async fn analyze_csv(State(state): State<AppState>, body: Bytes) -> Result<Json<AnalysisReport>, ApiError> {
    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || -> Result<AnalysisReport, ApiError> {
        let required: Vec<Feature> = config.features.iter().filter_map(|name| name.parse().ok()).collect();
        let records = read_csv(&body[..], &required)?;
        crate::analyze(&records, &config).map_err(ApiError::Invalid)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    start_date: Option<String>,
    #[serde(default = "default_duration")]
    duration_hours: u32,
    seed: Option<u64>,
}

fn default_duration() -> u32 {
    24
}

fn parse_start(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
}

async fn generate_data(payload: Result<Json<GenerateRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    if req.duration_hours == 0 || req.duration_hours > MAX_GENERATE_HOURS {
        return Err(ApiError::BadRequest(format!(
            "duration_hours must be between 1 and {}",
            MAX_GENERATE_HOURS
        )));
    }
    let mut opts = GeneratorOptions {
        duration_hours: req.duration_hours,
        seed: req.seed,
        ..GeneratorOptions::default()
    };
    if let Some(raw) = req.start_date.as_deref() {
        opts.start = parse_start(raw).ok_or_else(|| ApiError::BadRequest(format!("invalid start_date: {}", raw)))?;
    }

    let records = tokio::task::spawn_blocking(move || generate(&opts))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "records": records.len(),
        "data": records,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_formats() {
        assert!(parse_start("2024-01-01T00:00:00Z").is_some());
        assert!(parse_start("2024-01-01T08:30:00+02:00").is_some());
        assert!(parse_start("2024-01-01T00:00:00").is_some());
        assert!(parse_start("2024-01-01 00:00:00").is_some());
        assert!(parse_start("yesterday").is_none());
    }
}
