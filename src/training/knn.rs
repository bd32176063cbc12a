//! K-Nearest Neighbors classifier

use super::models::{check_features, check_training_data, Classifier};
use crate::error::{FairfitError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }
}

impl Classifier for KNNClassifier {
    fn name(&self) -> &'static str {
        "knn"
    }

    /// Stores the training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(FairfitError::InvalidInput("n_neighbors must be at least 1".to_string()));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Weighted share of positive neighbors (parallelized over test samples)
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(FairfitError::ModelNotFitted),
        };
        check_features(x_train.ncols(), x)?;
        let k = self.config.n_neighbors.min(x_train.nrows());
        let metric = self.config.metric;
        let weights = self.config.weights;

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, k, metric);
                positive_share(&neighbors, y_train, weights)
            })
            .collect();

        Ok(Array1::from_vec(probs))
    }

    /// Majority vote; a tied vote goes to the positive class
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "model": self.name(),
            "config": self.config,
            "n_train": self.x_train.as_ref().map_or(0, |x| x.nrows()),
        }))
    }
}

/// Max-heap entry (distance, training row); equal distances prefer the earlier row
#[derive(PartialEq)]
struct DistIdx(f64, usize);

impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, usize)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let entry = DistIdx(compute_distance(point, row, metric), i);
        if heap.len() < k {
            heap.push(entry);
        } else if heap.peek().map_or(false, |top| entry < *top) {
            heap.pop();
            heap.push(entry);
        }
    }

    heap.into_sorted_vec().into_iter().map(|d| (d.0, d.1)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
    match metric {
        DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => diffs.sum(),
        DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

fn positive_share(neighbors: &[(f64, usize)], y_train: &Array1<f64>, weights: WeightScheme) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    if weights == WeightScheme::Distance {
        // Exact matches take the whole vote
        let exact: Vec<usize> = neighbors.iter().filter(|(d, _)| *d == 0.0).map(|&(_, i)| i).collect();
        if !exact.is_empty() {
            return exact.iter().map(|&i| y_train[i]).sum::<f64>() / exact.len() as f64;
        }
    }

    let (mut positive, mut total) = (0.0, 0.0);
    for &(dist, idx) in neighbors {
        let w = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / dist,
        };
        positive += w * y_train[idx];
        total += w;
    }
    positive / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_classifier() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.0], [5.0, 5.0], [5.1, 5.1], [5.2, 5.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();

        let test = array![[0.05, 0.05], [5.05, 5.05]];
        assert_eq!(knn.predict(&test).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let mut knn = KNNClassifier::with_k(10);
        knn.fit(&array![[0.0], [1.0], [2.0]], &array![1.0, 1.0, 0.0]).unwrap();
        let proba = knn.predict_proba(&array![[0.0]]).unwrap();
        assert!((proba[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weighting() {
        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 3,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&array![[0.0], [1.0], [3.0]], &array![1.0, 0.0, 0.0]).unwrap();

        // Exact match dominates
        assert_eq!(knn.predict_proba(&array![[0.0]]).unwrap()[0], 1.0);
        // 1/0.5 for the positive vs 1/0.5 + 1/2.5 for the negatives
        let p = knn.predict_proba(&array![[0.5]]).unwrap()[0];
        assert!((p - 2.0 / 4.4).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_returns_error() {
        let knn = KNNClassifier::with_k(3);
        assert!(matches!(knn.predict(&array![[1.0]]), Err(FairfitError::ModelNotFitted)));
    }

    #[test]
    fn test_distances() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Euclidean), 5.0);
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Manhattan), 7.0);
    }
}
