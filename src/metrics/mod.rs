//! Performance metric aggregation
//!
//! Collapses accuracy and the support-weighted precision, recall and F1 of a
//! classification into one `score` in `[0, 1]`.

use crate::error::{FairfitError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-class confusion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClassCounts {
    true_positive: usize,
    predicted: usize,
    support: usize,
}

impl ClassCounts {
    fn precision(&self) -> f64 {
        ratio(self.true_positive, self.predicted)
    }

    fn recall(&self) -> f64 {
        ratio(self.true_positive, self.support)
    }

    fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }
}

/// Zero-division yields 0
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Classification metrics for one set of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F1
    pub f1: f64,
    /// Mean of the four metrics above
    pub score: f64,
}

impl PerformanceReport {
    /// Compute the report. Labels are compared exactly, so any label
    /// encoding works as long as both vectors share it.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(FairfitError::MisalignedIndices {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        if y_true.is_empty() {
            return Err(FairfitError::InvalidInput(
                "Cannot score an empty prediction vector".to_string(),
            ));
        }

        // Keyed by the label's bit pattern; f64 is not Ord
        let mut classes: BTreeMap<u64, ClassCounts> = BTreeMap::new();
        let mut correct = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            classes.entry(t.to_bits()).or_default().support += 1;
            classes.entry(p.to_bits()).or_default().predicted += 1;
            if t == p {
                correct += 1;
                classes.entry(t.to_bits()).or_default().true_positive += 1;
            }
        }

        let n = y_true.len();
        let weighted = |f: fn(&ClassCounts) -> f64| -> f64 {
            classes
                .values()
                .map(|c| f(c) * c.support as f64 / n as f64)
                .sum()
        };

        let accuracy = ratio(correct, n);
        let precision = weighted(ClassCounts::precision);
        let recall = weighted(ClassCounts::recall);
        let f1 = weighted(ClassCounts::f1);
        let score = ((accuracy + precision + recall + f1) / 4.0).clamp(0.0, 1.0);

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1,
            score,
        })
    }
}

/// Shorthand for `PerformanceReport::compute(..)?.score`
pub fn performance_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(PerformanceReport::compute(y_true, y_pred)?.score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions_score_one() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let report = PerformanceReport::compute(&y, &y).unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.score, 1.0);
    }

    #[test]
    fn test_weighted_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let report = PerformanceReport::compute(&y_true, &y_pred).unwrap();

        // Symmetric errors: every per-class metric is 0.75
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert!((report.precision - 0.75).abs() < 1e-12);
        assert!((report.recall - 0.75).abs() < 1e-12);
        assert!((report.f1 - 0.75).abs() < 1e-12);
        assert!((report.score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_constant_predictions_zero_division() {
        let y_true = array![1.0, 0.0, 1.0, 0.0];
        let y_pred = array![1.0, 1.0, 1.0, 1.0];
        let report = PerformanceReport::compute(&y_true, &y_pred).unwrap();

        // class 0 is never predicted: its precision counts as 0
        assert!((report.accuracy - 0.5).abs() < 1e-12);
        assert!((report.precision - 0.25).abs() < 1e-12);
        assert!((report.recall - 0.5).abs() < 1e-12);
        assert!(report.score >= 0.0 && report.score <= 1.0);
    }

    #[test]
    fn test_all_wrong_scores_zero() {
        let report = PerformanceReport::compute(&array![1.0, 0.0], &array![0.0, 1.0]).unwrap();
        assert_eq!(report.score, 0.0);
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        assert!(matches!(
            PerformanceReport::compute(&array![1.0], &array![1.0, 0.0]),
            Err(FairfitError::MisalignedIndices { .. })
        ));
        assert!(matches!(
            performance_score(&Array1::zeros(0), &Array1::zeros(0)),
            Err(FairfitError::InvalidInput(_))
        ));
    }
}
