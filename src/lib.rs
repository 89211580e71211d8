//! netsentinel -- batch network-traffic anomaly scoring with mitigation
//! recommendations.
//!
//! This crate provides the scoring pipeline (standardization + isolation
//! forest), the mitigation recommender, and thin CSV / CLI / HTTP surfaces
//! around them.

pub mod api;
pub mod config;
pub mod detect;
pub mod mitigate;
pub mod report;
pub mod traffic;

use anyhow::Result;
use tracing::warn;

use crate::config::DetectorConfig;
use crate::detect::{AnomalyScorer, DetectError};
use crate::mitigate::Recommender;
use crate::report::{AnalysisReport, Summary};
use crate::traffic::TrafficRecord;

/// Run the full pipeline over one batch:
/// 1. Score every record (validation, scaling, isolation forest)
/// 2. Classify flagged records and pick recommendations
/// 3. Summarize
pub fn analyze(records: &[TrafficRecord], config: &DetectorConfig) -> Result<AnalysisReport, DetectError> {
    let scorer = AnomalyScorer::new(config)?;
    let outcome = scorer.score(records)?;

    let recommendations = Recommender::new(&config.thresholds).recommend(&outcome.records);
    let statistics = Summary::from_records(&outcome.records);
    if statistics.anomaly_count > 0 {
        warn!(
            anomalies = statistics.anomaly_count,
            "ALERT: Detected {} anomalous activities in network traffic!",
            statistics.anomaly_count
        );
    }

    Ok(AnalysisReport {
        id: uuid::Uuid::new_v4(),
        generated_at: chrono::Utc::now(),
        statistics,
        records: outcome.records,
        recommendations,
    })
}

/// Start the HTTP API.
pub async fn serve(bind: &str, config: DetectorConfig) -> Result<()> {
    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(api::state::AppState::new(config));

    tracing::info!(%addr, "netsentinel listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
