//! Per-column standardization (zero mean, unit variance).

use super::stats::Column;
use super::{DetectError, ValidationIssue};
use crate::traffic::{Feature, FeatureBatch, TrafficRecord};
use serde::{Deserialize, Serialize};

/// Dense row-major matrix of feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    pub fn from_batch(batch: &FeatureBatch<'_>) -> Self {
        let cols = batch.features.len();
        let mut values = Vec::with_capacity(batch.len() * cols);
        for i in 0..batch.len() {
            values.extend(batch.row(i));
        }
        Self {
            rows: batch.len(),
            cols,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.cols + col] = value;
    }

    /// Every non-finite cell, reported against its feature name.
    pub fn non_finite_cells(&self, features: &[Feature]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for r in 0..self.rows {
            for (c, feature) in features.iter().enumerate() {
                let v = self.get(r, c);
                if !v.is_finite() {
                    let reason = if v.is_nan() {
                        "missing or not a number"
                    } else {
                        "not finite"
                    };
                    issues.push(ValidationIssue::cell(r, feature.name(), reason));
                }
            }
        }
        issues
    }

    /// Replace non-finite cells with the mean of the finite cells in the same
    /// column. Columns with no finite cell at all are reported back.
    pub fn impute_column_means(&mut self, features: &[Feature]) -> Vec<ValidationIssue> {
        let mut unusable = Vec::new();
        for (c, feature) in features.iter().enumerate() {
            let finite: Vec<f64> = self.column(c).into_iter().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                unusable.push(ValidationIssue::column(feature.name(), "no finite values to impute from"));
                continue;
            }
            let fill = Column::new(&finite).mean();
            for r in 0..self.rows {
                if !self.get(r, c).is_finite() {
                    self.set(r, c, fill);
                }
            }
        }
        unusable
    }
}

/// Fitted per-column mean/scale. Serializable so the same transform can be
/// replayed against later batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub features: Vec<Feature>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl Standardizer {
    /// A transform that leaves values unchanged.
    pub fn identity(features: Vec<Feature>) -> Self {
        let n = features.len();
        Self {
            features,
            means: vec![0.0; n],
            scales: vec![1.0; n],
        }
    }

    /// Fit column statistics. Zero-variance columns keep a scale of 1.
    /// A column whose spread cannot be represented as a finite `f64` is
    /// rejected rather than collapsed.
    pub fn fit(features: &[Feature], matrix: &FeatureMatrix) -> Result<Self, DetectError> {
        let mut means = Vec::with_capacity(matrix.cols());
        let mut scales = Vec::with_capacity(matrix.cols());
        let mut issues = Vec::new();
        for (c, feature) in features.iter().enumerate().take(matrix.cols()) {
            let column = matrix.column(c);
            let stats = Column::new(&column);
            let (mean, std) = (stats.mean(), stats.std_dev());
            if !(mean.is_finite() && std.is_finite() && (stats.max() - stats.min()).is_finite()) {
                issues.push(ValidationIssue::column(feature.name(), "values too large to standardize"));
                continue;
            }
            means.push(mean);
            scales.push(if std > f64::EPSILON { std } else { 1.0 });
        }
        if !issues.is_empty() {
            return Err(DetectError::validation(issues));
        }
        Ok(Self {
            features: features.to_vec(),
            means,
            scales,
        })
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> FeatureMatrix {
        let mut out = matrix.clone();
        for r in 0..out.rows() {
            for c in 0..out.cols() {
                let v = (matrix.get(r, c) - self.means[c]) / self.scales[c];
                out.set(r, c, v);
            }
        }
        out
    }

    /// Apply the fitted transform to a fresh set of records.
    pub fn transform_records(&self, records: &[TrafficRecord]) -> Result<FeatureMatrix, DetectError> {
        let batch = FeatureBatch::new(self.features.clone(), records);
        let matrix = FeatureMatrix::from_batch(&batch);
        let issues = matrix.non_finite_cells(&self.features);
        if !issues.is_empty() {
            return Err(DetectError::validation(issues));
        }
        Ok(self.transform(&matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[[f64; 6]]) -> Vec<TrafficRecord> {
        rows.iter().map(|r| TrafficRecord::from_values(*r)).collect()
    }

    #[test]
    fn test_fit_transform_zero_mean_unit_variance() {
        let recs = records(&[
            [1.0, 10.0, 5.0, 0.0, 0.0, 0.0],
            [2.0, 20.0, 5.0, 0.0, 0.0, 0.0],
            [3.0, 30.0, 5.0, 0.0, 0.0, 0.0],
        ]);
        let features = vec![Feature::BytesTransferred, Feature::PacketCount];
        let matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        let scaler = Standardizer::fit(&features, &matrix).unwrap();
        let scaled = scaler.transform(&matrix);

        for c in 0..scaled.cols() {
            let col = scaled.column(c);
            let stats = Column::new(&col);
            assert!(stats.mean().abs() < 1e-12);
            assert!((stats.variance() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_variance_column_keeps_unit_scale() {
        let recs = records(&[[7.0, 1.0, 0.0, 0.0, 0.0, 0.0], [7.0, 2.0, 0.0, 0.0, 0.0, 0.0]]);
        let features = vec![Feature::BytesTransferred];
        let matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        let scaler = Standardizer::fit(&features, &matrix).unwrap();
        assert_eq!(scaler.scales, vec![1.0]);
        assert_eq!(scaler.means, vec![7.0]);
        let scaled = scaler.transform(&matrix);
        assert_eq!(scaled.column(0), vec![0.0, 0.0]);
    }

    #[test]
    fn test_large_finite_column_keeps_its_spread() {
        let mut rows: Vec<[f64; 6]> = (0..200)
            .map(|j| [1e160 * (1.0 + 0.01 * j as f64), 0.0, 0.0, 0.0, 0.0, 0.0])
            .collect();
        rows.push([1e163, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let recs = records(&rows);
        let features = vec![Feature::BytesTransferred];
        let matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        let scaler = Standardizer::fit(&features, &matrix).unwrap();
        assert!(scaler.means[0].is_finite() && scaler.scales[0].is_finite());

        let scaled = scaler.transform(&matrix).column(0);
        assert!(scaled.iter().all(|v| v.is_finite()));
        assert!(scaled[200] > 10.0, "outlier z-score {}", scaled[200]);
        assert!(scaled[0] < scaled[199]);
    }

    #[test]
    fn test_unrepresentable_spread_is_rejected() {
        let recs = records(&[[f64::MAX; 6], [-f64::MAX; 6]]);
        let features = vec![Feature::PacketCount];
        let matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        match Standardizer::fit(&features, &matrix) {
            Err(DetectError::DataValidation { issues }) => {
                assert_eq!(issues, vec![ValidationIssue::column("packet_count", "values too large to standardize")]);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_replay_on_new_batch() {
        let recs = records(&[[0.0; 6], [10.0; 6]]);
        let features = vec![Feature::BytesTransferred];
        let matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        let scaler = Standardizer::fit(&features, &matrix).unwrap();

        let later = records(&[[15.0; 6]]);
        let replayed = scaler.transform_records(&later).unwrap();
        // mean 5, std 5 -> (15 - 5) / 5
        assert!((replayed.get(0, 0) - 2.0).abs() < 1e-12);

        let bad = records(&[[f64::NAN; 6]]);
        assert!(scaler.transform_records(&bad).is_err());
    }

    #[test]
    fn test_impute_column_means() {
        let recs = records(&[[2.0; 6], [f64::NAN; 6], [4.0; 6]]);
        let features = vec![Feature::BytesTransferred];
        let mut matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        assert_eq!(matrix.non_finite_cells(&features).len(), 1);
        assert!(matrix.impute_column_means(&features).is_empty());
        assert_eq!(matrix.column(0), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_impute_reports_empty_column() {
        let recs = records(&[[f64::NAN; 6]]);
        let features = vec![Feature::PacketCount];
        let mut matrix = FeatureMatrix::from_batch(&FeatureBatch::new(features.clone(), &recs));
        let issues = matrix.impute_column_means(&features);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "packet_count");
        assert_eq!(issues[0].row, None);
    }
}
