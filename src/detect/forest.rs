//! Isolation Forest.
//!
//! Each tree recursively partitions a random subsample of the data with
//! random axis-aligned splits. Outliers end up isolated after fewer splits,
//! so a short average path length across the forest means "more anomalous".

use rand::seq::index;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::scaler::FeatureMatrix;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Parameters for growing a forest.
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub random_state: u64,
}

/// A fitted forest. Only lives for the duration of one scoring call.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Grow `n_estimators` trees over `data`, each on a subsample drawn
    /// without replacement. The same data and seed always yield the same forest.
    pub fn fit(data: &FeatureMatrix, params: &ForestParams) -> Self {
        let n = data.rows();
        let sample_size = params.max_samples.min(n).max(1);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(params.random_state);

        let mut trees = Vec::with_capacity(params.n_estimators);
        if n > 0 {
            for _ in 0..params.n_estimators {
                let mut rows = index::sample(&mut rng, n, sample_size).into_vec();
                trees.push(IsolationTree::grow(data, &mut rows, max_depth, &mut rng));
            }
        }

        Self { trees, sample_size }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Expected path length of an unsuccessful BST search over `n` points, c(n).
    pub fn average_path_length(n: usize) -> f64 {
        match n {
            0 | 1 => 0.0,
            2 => 1.0,
            _ => {
                let n = n as f64;
                2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
            }
        }
    }

    /// Score one sample: `-2^(-E[h(x)] / c(sample_size))`.
    /// Values lie in `[-1, 0)`; lower means more anomalous.
    pub fn score_sample(&self, sample: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return -0.5;
        }
        let total: f64 = self.trees.iter().map(|t| t.path_length(sample)).sum();
        let mean_depth = total / self.trees.len() as f64;
        // c(1) is zero; a one-row subsample is trivially isolated.
        let norm = Self::average_path_length(self.sample_size).max(1.0);
        -(2.0_f64.powf(-mean_depth / norm))
    }

    pub fn score_samples(&self, data: &FeatureMatrix) -> Vec<f64> {
        (0..data.rows()).map(|r| self.score_sample(data.row(r))).collect()
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// Arena-allocated isolation tree; the root is node 0.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &FeatureMatrix, rows: &mut [usize], max_depth: usize, rng: &mut ChaCha8Rng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(data, rows, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        data: &FeatureMatrix,
        rows: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return slot;
        }

        // Only features that still vary inside this node can split it.
        let candidates: Vec<(usize, f64, f64)> = (0..data.cols())
            .filter_map(|c| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = data.get(r, c);
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((c, lo, hi))
            })
            .collect();
        if candidates.is_empty() {
            return slot;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);

        let mid = partition(rows, |r| data.get(r, feature) < threshold);
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.grow_node(data, left_rows, depth + 1, max_depth, rng);
        let right = self.grow_node(data, right_rows, depth + 1, max_depth, rng);

        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[feature] < threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => {
                    return depth + IsolationForest::average_path_length(size);
                }
            }
        }
    }
}

/// Move every row matching `pred` to the front; returns how many matched.
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut store = 0;
    for i in 0..rows.len() {
        if pred(rows[i]) {
            rows.swap(store, i);
            store += 1;
        }
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::{Feature, FeatureBatch, TrafficRecord};

    fn matrix(values: &[f64]) -> FeatureMatrix {
        let records: Vec<TrafficRecord> = values
            .iter()
            .map(|&v| TrafficRecord::from_values([v, v * 0.5, 1.0, 0.0, 0.0, 0.0]))
            .collect();
        let batch = FeatureBatch::new(vec![Feature::BytesTransferred, Feature::PacketCount], &records);
        FeatureMatrix::from_batch(&batch)
    }

    fn params(seed: u64) -> ForestParams {
        ForestParams {
            n_estimators: 50,
            max_samples: 256,
            random_state: seed,
        }
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(IsolationForest::average_path_length(1), 0.0);
        assert_eq!(IsolationForest::average_path_length(2), 1.0);
        let c_10 = IsolationForest::average_path_length(10);
        let c_256 = IsolationForest::average_path_length(256);
        assert!(c_256 > c_10, "c(256)={} should be > c(10)={}", c_256, c_10);
        // Known value: c(256) ~= 10.24
        assert!((c_256 - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_outlier_scores_lower() {
        let mut values: Vec<f64> = (0..200).map(|i| 50.0 + (i % 21) as f64 - 10.0).collect();
        values.push(500.0);
        let data = matrix(&values);
        let forest = IsolationForest::fit(&data, &params(42));
        assert_eq!(forest.n_trees(), 50);

        let scores = forest.score_samples(&data);
        let outlier = scores[200];
        let normal_min = scores[..200].iter().copied().fold(f64::INFINITY, f64::min);
        assert!(outlier < normal_min, "outlier {} vs normal min {}", outlier, normal_min);
        assert!(scores.iter().all(|s| (-1.0..0.0).contains(s)));
    }

    #[test]
    fn test_same_seed_same_scores() {
        let values: Vec<f64> = (0..300).map(|i| ((i * 37) % 101) as f64).collect();
        let data = matrix(&values);
        let a = IsolationForest::fit(&data, &params(7)).score_samples(&data);
        let b = IsolationForest::fit(&data, &params(7)).score_samples(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_data_does_not_split() {
        let data = matrix(&[3.0; 20]);
        let forest = IsolationForest::fit(&data, &params(1));
        let scores = forest.score_samples(&data);
        assert!(scores.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_partition() {
        let mut rows = vec![5, 1, 4, 2, 3];
        let mid = partition(&mut rows, |r| r < 3);
        assert_eq!(mid, 2);
        assert!(rows[..mid].iter().all(|&r| r < 3));
        assert!(rows[mid..].iter().all(|&r| r >= 3));
    }
}
