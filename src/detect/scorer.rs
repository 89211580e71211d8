//! Batch anomaly scoring.
//!
//! `validate -> standardize -> fit forest -> score -> threshold`, all scoped to
//! one call. Nothing survives between batches except the returned
//! [`Standardizer`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::forest::{ForestParams, IsolationForest};
use super::scaler::{FeatureMatrix, Standardizer};
use super::stats::{percentile, Column};
use super::{DetectError, ValidationIssue};
use crate::config::{DetectorConfig, MissingValues};
use crate::traffic::{Feature, FeatureBatch, TrafficRecord};

/// A record with its detector verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: TrafficRecord,
    pub is_anomaly: bool,
    /// Lower is more anomalous.
    pub anomaly_score: f64,
}

/// Everything one scoring run produces.
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// One entry per input record, in input order.
    pub records: Vec<ScoredRecord>,
    /// Fitted column transform, for replay on later batches.
    pub standardizer: Standardizer,
    /// Scores strictly below this are flagged.
    pub threshold: f64,
}

impl ScoringOutcome {
    pub fn anomaly_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_anomaly).count()
    }
}

pub struct AnomalyScorer {
    features: Vec<Feature>,
    contamination: f64,
    missing_values: MissingValues,
    params: ForestParams,
}

impl AnomalyScorer {
    /// Validate `config` and resolve its feature list.
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectError> {
        config.validate()?;
        let features = resolve_features(&config.features)?;
        Ok(Self {
            features,
            contamination: config.contamination,
            missing_values: config.missing_values,
            params: ForestParams {
                n_estimators: config.n_estimators,
                max_samples: config.max_samples,
                random_state: config.random_state,
            },
        })
    }

    /// Score a batch. The output has the same length and order as `records`.
    pub fn score(&self, records: &[TrafficRecord]) -> Result<ScoringOutcome, DetectError> {
        if records.is_empty() {
            debug!("empty batch, nothing to score");
            return Ok(ScoringOutcome {
                records: Vec::new(),
                standardizer: Standardizer::identity(self.features.clone()),
                threshold: 0.0,
            });
        }

        // 1. Validate
        let batch = FeatureBatch::new(self.features.clone(), records);
        let mut matrix = FeatureMatrix::from_batch(&batch);
        self.check_values(&mut matrix)?;

        // 2. Standardize
        let standardizer = Standardizer::fit(&self.features, &matrix)?;
        let scaled = standardizer.transform(&matrix);

        // 3. Fit & score
        info!(
            records = batch.len(),
            features = self.features.len(),
            trees = self.params.n_estimators,
            seed = self.params.random_state,
            "fitting isolation forest"
        );
        let forest = IsolationForest::fit(&scaled, &self.params);
        let scores = forest.score_samples(&scaled);

        // 4. Threshold at the contamination percentile
        let threshold = percentile(&scores, self.contamination).ok_or_else(|| {
            DetectError::validation(vec![ValidationIssue::column(
                "anomaly_score",
                "model produced no finite scores",
            )])
        })?;

        let scored: Vec<ScoredRecord> = records
            .iter()
            .zip(scores.iter())
            .map(|(record, &score)| ScoredRecord {
                record: record.clone(),
                is_anomaly: score < threshold,
                anomaly_score: score,
            })
            .collect();

        let outcome = ScoringOutcome {
            records: scored,
            standardizer,
            threshold,
        };
        log_score_stats(&scores, outcome.anomaly_count(), threshold);
        Ok(outcome)
    }

    fn check_values(&self, matrix: &mut FeatureMatrix) -> Result<(), DetectError> {
        let issues = matrix.non_finite_cells(&self.features);
        if issues.is_empty() {
            return Ok(());
        }
        match self.missing_values {
            MissingValues::Reject => Err(DetectError::validation(issues)),
            MissingValues::ImputeMean => {
                tracing::warn!(cells = issues.len(), "missing values detected, imputing column means");
                let unusable = matrix.impute_column_means(&self.features);
                if unusable.is_empty() {
                    Ok(())
                } else {
                    Err(DetectError::validation(unusable))
                }
            }
        }
    }
}

/// Map configured names onto features; unknown names are missing columns.
fn resolve_features(names: &[String]) -> Result<Vec<Feature>, DetectError> {
    let mut features = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match name.parse::<Feature>() {
            Ok(f) => features.push(f),
            Err(_) => missing.push(ValidationIssue::column(name.clone(), "missing required feature")),
        }
    }
    if missing.is_empty() {
        Ok(features)
    } else {
        Err(DetectError::validation(missing))
    }
}

fn log_score_stats(scores: &[f64], anomalies: usize, threshold: f64) {
    let col = Column::new(scores);
    info!(
        total_records = scores.len(),
        anomalies,
        threshold,
        score_mean = col.mean(),
        score_min = col.min(),
        score_max = col.max(),
        "anomaly detection statistics"
    );
}
