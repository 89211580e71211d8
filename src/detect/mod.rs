//! Anomaly detection: feature standardization, isolation forest, batch scoring.

pub mod forest;
pub mod scaler;
pub mod scorer;
pub mod stats;

pub use scaler::Standardizer;
pub use scorer::{AnomalyScorer, ScoredRecord, ScoringOutcome};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("data validation failed ({} issue(s)): {}", .issues.len(), summarize(.issues))]
    DataValidation { issues: Vec<ValidationIssue> },

    #[error("invalid configuration for '{option}': {reason}")]
    Configuration { option: String, reason: String },
}

impl DetectError {
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        DetectError::DataValidation { issues }
    }

    pub fn config(option: &str, reason: impl Into<String>) -> Self {
        DetectError::Configuration {
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single offending cell or column. `row` is `None` for batch-wide problems
/// such as a missing column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub row: Option<usize>,
    pub field: String,
    pub reason: String,
}

impl ValidationIssue {
    pub fn cell(row: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row: Some(row),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn column(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row: None,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {} field '{}': {}", row, self.field, self.reason),
            None => write!(f, "field '{}': {}", self.field, self.reason),
        }
    }
}

// Large batches can produce thousands of issues; the message keeps the first few.
const MAX_REPORTED_ISSUES: usize = 5;

fn summarize(issues: &[ValidationIssue]) -> String {
    let mut parts: Vec<String> = issues
        .iter()
        .take(MAX_REPORTED_ISSUES)
        .map(|i| i.to_string())
        .collect();
    if issues.len() > MAX_REPORTED_ISSUES {
        parts.push(format!("... and {} more", issues.len() - MAX_REPORTED_ISSUES));
    }
    parts.join("; ")
}
