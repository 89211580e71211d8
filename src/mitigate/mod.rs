//! Mitigation recommendations for flagged traffic.
//!
//! Flagged records are classified into an [`AnomalyCategory`], grouped, and
//! each present category is mapped to its static playbook entry.

pub mod classify;
pub mod destination;
pub mod playbook;

pub use classify::Classifier;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ThresholdConfig;
use crate::detect::ScoredRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyCategory {
    TrafficSpike,
    ProtocolAnomaly,
    PatternAnomaly,
    DataExfiltration,
    /// Not flagged; never appears in recommendations.
    Unclassified,
}

impl AnomalyCategory {
    pub fn name(&self) -> &'static str {
        match self {
            AnomalyCategory::TrafficSpike => "TrafficSpike",
            AnomalyCategory::ProtocolAnomaly => "ProtocolAnomaly",
            AnomalyCategory::PatternAnomaly => "PatternAnomaly",
            AnomalyCategory::DataExfiltration => "DataExfiltration",
            AnomalyCategory::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for AnomalyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse priority of a recommendation, used only for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: AnomalyCategory,
    pub severity: Severity,
    pub description: String,
    pub actions: Vec<String>,
    /// Flagged records grouped under this category.
    pub affected_records: usize,
}

impl Recommendation {
    pub fn from_playbook(category: AnomalyCategory, affected_records: usize) -> Self {
        let entry = playbook::lookup(category);
        Self {
            category,
            severity: entry.severity,
            description: entry.description.to_string(),
            actions: entry.actions.iter().map(|a| a.to_string()).collect(),
            affected_records,
        }
    }
}

/// Turns a scored batch into a de-duplicated, severity-ordered action list.
pub struct Recommender {
    thresholds: ThresholdConfig,
}

impl Recommender {
    pub fn new(thresholds: &ThresholdConfig) -> Self {
        Self {
            thresholds: thresholds.clone(),
        }
    }

    /// One recommendation per category present among flagged records, sorted by
    /// descending severity then category name. Empty when nothing is flagged.
    pub fn recommend(&self, records: &[ScoredRecord]) -> Vec<Recommendation> {
        if !records.iter().any(|r| r.is_anomaly) {
            return Vec::new();
        }

        let classifier = Classifier::from_batch(records, &self.thresholds);
        let mut counts: BTreeMap<AnomalyCategory, usize> = BTreeMap::new();
        for record in records.iter().filter(|r| r.is_anomaly) {
            *counts.entry(classifier.classify(record)).or_default() += 1;
        }

        let mut recommendations: Vec<Recommendation> = counts
            .into_iter()
            .filter(|(category, _)| *category != AnomalyCategory::Unclassified)
            .map(|(category, n)| Recommendation::from_playbook(category, n))
            .collect();
        recommendations.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.category.name().cmp(b.category.name()))
        });

        info!(count = recommendations.len(), "generated mitigation recommendations");
        for rec in &recommendations {
            info!(
                category = %rec.category,
                severity = %rec.severity,
                affected = rec.affected_records,
                "recommendation: {}",
                rec.description
            );
        }
        recommendations
    }
}
