//! Analysis report: summary statistics, text rendering, and anomaly export.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::detect::stats::Column;
use crate::detect::ScoredRecord;
use crate::mitigate::Recommendation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub anomaly_count: usize,
    /// Percentage of flagged records, rounded to two decimals.
    pub anomaly_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_stats: Option<ScoreStats>,
}

impl Summary {
    pub fn from_records(records: &[ScoredRecord]) -> Self {
        let total_records = records.len();
        let anomaly_count = records.iter().filter(|r| r.is_anomaly).count();
        let anomaly_percentage = if total_records == 0 {
            0.0
        } else {
            (anomaly_count as f64 / total_records as f64 * 100.0 * 100.0).round() / 100.0
        };
        let score_stats = (!records.is_empty()).then(|| {
            let scores: Vec<f64> = records.iter().map(|r| r.anomaly_score).collect();
            let col = Column::new(&scores);
            ScoreStats {
                mean: col.mean(),
                min: col.min(),
                max: col.max(),
            }
        });
        Self {
            total_records,
            anomaly_count,
            anomaly_percentage,
            score_stats,
        }
    }
}

/// Full result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub statistics: Summary,
    pub records: Vec<ScoredRecord>,
    pub recommendations: Vec<Recommendation>,
}

/// Format a report as a human-readable summary.
pub fn format_summary(report: &AnalysisReport) -> String {
    let stats = &report.statistics;
    let mut out = format!(
        "Analyzed {} record{}: {} anomal{} ({:.2}%)",
        stats.total_records,
        if stats.total_records == 1 { "" } else { "s" },
        stats.anomaly_count,
        if stats.anomaly_count == 1 { "y" } else { "ies" },
        stats.anomaly_percentage,
    );

    if let Some(scores) = &stats.score_stats {
        out.push_str(&format!(
            "\nScores: mean {:.4}, min {:.4}, max {:.4}",
            scores.mean, scores.min, scores.max
        ));
    }

    if report.recommendations.is_empty() {
        out.push_str("\nNo mitigation required.");
    }
    for rec in &report.recommendations {
        out.push_str(&format!(
            "\n\n[{}] {} ({} record{})\n  {}",
            rec.severity,
            rec.category,
            rec.affected_records,
            if rec.affected_records == 1 { "" } else { "s" },
            rec.description
        ));
        for action in &rec.actions {
            out.push_str(&format!("\n   - {}", action));
        }
    }
    out
}

const CSV_HEADER: [&str; 12] = [
    "timestamp",
    "source",
    "destination",
    "protocol",
    "bytes_transferred",
    "packet_count",
    "connection_duration",
    "retransmission_rate",
    "bytes_per_packet",
    "packets_per_second",
    "is_anomaly",
    "anomaly_score",
];

/// Write flagged records, most anomalous first, to `path`.
/// Returns the number of rows written.
pub fn write_anomalies_csv(records: &[ScoredRecord], path: &Path) -> Result<usize> {
    let mut anomalies: Vec<&ScoredRecord> = records.iter().filter(|r| r.is_anomaly).collect();
    anomalies.sort_by(|a, b| a.anomaly_score.total_cmp(&b.anomaly_score));

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(CSV_HEADER)?;
    for scored in &anomalies {
        let r = &scored.record;
        writer.write_record([
            r.timestamp.clone().unwrap_or_default(),
            r.source.clone().unwrap_or_default(),
            r.destination.clone().unwrap_or_default(),
            r.protocol.clone().unwrap_or_default(),
            r.bytes_transferred.to_string(),
            r.packet_count.to_string(),
            r.connection_duration.to_string(),
            r.retransmission_rate.to_string(),
            r.bytes_per_packet.to_string(),
            r.packets_per_second.to_string(),
            "Anomaly".to_string(),
            scored.anomaly_score.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(anomalies.len())
}

/// Export path for a report: `<dir>/anomalies_<YYYYmmdd_HHMMSS>.csv`.
pub fn export_path(dir: &Path, report: &AnalysisReport) -> PathBuf {
    dir.join(format!(
        "anomalies_{}.csv",
        report.generated_at.format("%Y%m%d_%H%M%S")
    ))
}
