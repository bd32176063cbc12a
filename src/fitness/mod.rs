//! Fitness evaluation
//!
//! Fitness is `(1 - performance_score) + fairness_score`: zero for a model
//! that is both perfectly accurate and perfectly fair, growing without bound
//! as group disparities accumulate. Lower is better.

use crate::config::FitnessConfig;
use crate::data::{one_hot_encode, DataPreparer, Dataset, DefaultPreparer};
use crate::error::{FairfitError, Result};
use crate::fairness::{fairness_metrics, FairnessReport};
use crate::metrics::PerformanceReport;
use crate::training::{train_test_split, ModelKind, ModelParams};
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Combine a performance score and a fairness report into one fitness value
pub fn fitness_value(performance_score: f64, fairness: &FairnessReport) -> f64 {
    (1.0 - performance_score) + fairness.total()
}

/// Performance, fairness and fitness of one prediction vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionScore {
    pub performance: PerformanceReport,
    pub fairness: FairnessReport,
    pub fitness: f64,
}

/// Score predictions made for `evaluation_indices` of `dataset`.
///
/// Ground truth is read from `target_column` at the same rows, so the
/// prediction at position `i` must belong to row `evaluation_indices[i]`.
pub fn score_predictions(
    dataset: &Dataset,
    evaluation_indices: &[usize],
    protected_attribute: &str,
    target_column: &str,
    predictions: &Array1<f64>,
) -> Result<PredictionScore> {
    if predictions.len() != evaluation_indices.len() {
        return Err(FairfitError::MisalignedIndices {
            expected: evaluation_indices.len(),
            actual: predictions.len(),
        });
    }
    let y_true = dataset.binary_labels(target_column, evaluation_indices)?;
    let performance = PerformanceReport::compute(&y_true, predictions)?;
    let fairness = fairness_metrics(
        dataset,
        evaluation_indices,
        protected_attribute,
        predictions,
        target_column,
    )?;

    Ok(PredictionScore {
        performance,
        fairness,
        fitness: fitness_value(performance.score, &fairness),
    })
}

/// Full result of one fitness evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub params: ModelParams,
    pub performance: PerformanceReport,
    pub fairness: FairnessReport,
    pub fitness: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// Trains one model on a held-out split and scores it
pub struct FitnessEvaluator {
    config: FitnessConfig,
    preparer: Box<dyn DataPreparer>,
}

impl Default for FitnessEvaluator {
    fn default() -> Self {
        Self::new(FitnessConfig::default())
    }
}

impl FitnessEvaluator {
    /// Evaluator using the default data preparation
    pub fn new(config: FitnessConfig) -> Self {
        Self {
            config,
            preparer: Box::new(DefaultPreparer::new()),
        }
    }

    /// Replace the data preparation step
    pub fn with_preparer(mut self, preparer: impl DataPreparer + 'static) -> Self {
        self.preparer = Box::new(preparer);
        self
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Fitness of a model kind given by name.
    ///
    /// Names outside the supported set fail with `UnsupportedModelKind`.
    pub fn fitness(
        &self,
        dataset: &Dataset,
        protected_attribute: &str,
        target_column: &str,
        model_kind: &str,
    ) -> Result<f64> {
        let kind: ModelKind = model_kind.parse()?;
        Ok(self.evaluate(dataset, protected_attribute, target_column, kind)?.fitness)
    }

    /// Evaluate a model kind with its default hyperparameters
    pub fn evaluate(
        &self,
        dataset: &Dataset,
        protected_attribute: &str,
        target_column: &str,
        model_kind: ModelKind,
    ) -> Result<FitnessBreakdown> {
        self.evaluate_params(
            dataset,
            protected_attribute,
            target_column,
            &model_kind.default_params(),
        )
    }

    /// Evaluate a fully specified model
    pub fn evaluate_params(
        &self,
        dataset: &Dataset,
        protected_attribute: &str,
        target_column: &str,
        params: &ModelParams,
    ) -> Result<FitnessBreakdown> {
        self.config.validate()?;

        dataset.column(protected_attribute)?;
        let prepared = self.preparer.prepare(dataset, target_column, protected_attribute)?;

        let features = one_hot_encode(&prepared, &[protected_attribute, target_column])?;
        let all_rows: Vec<usize> = (0..prepared.n_rows()).collect();
        let labels = prepared.binary_labels(target_column, &all_rows)?;

        let split = train_test_split(
            prepared.n_rows(),
            self.config.test_size,
            self.config.random_state,
            self.config.shuffle,
        )?;
        debug!(
            n_train = split.train.len(),
            n_test = split.test.len(),
            n_features = features.n_features(),
            "Prepared evaluation split"
        );

        let x_train = features.values.select(Axis(0), &split.train);
        let y_train = labels.select(Axis(0), &split.train);
        let x_test = features.values.select(Axis(0), &split.test);

        let mut model = params.build(self.config.random_state);
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_test)?;

        // Encoded rows keep dataset order, so test positions are dataset rows
        let score = score_predictions(
            &prepared,
            &split.test,
            protected_attribute,
            target_column,
            &predictions,
        )?;

        info!(
            model = %params.kind(),
            performance = score.performance.score,
            fairness = score.fairness.total(),
            fitness = score.fitness,
            "Evaluated fitness"
        );

        Ok(FitnessBreakdown {
            params: params.clone(),
            performance: score.performance,
            fairness: score.fairness,
            fitness: score.fitness,
            n_train: split.train.len(),
            n_test: split.test.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use ndarray::array;

    fn dataset(n: usize) -> Dataset {
        let target: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        Dataset::new(vec![
            ("signal".to_string(), Column::numeric(target.iter().map(|t| t * 10.0).collect())),
            ("group".to_string(), Column::categorical((0..n).map(|i| if (i / 2) % 2 == 0 { "a" } else { "b" }).collect())),
            ("target".to_string(), Column::numeric(target)),
        ])
        .unwrap()
    }

    #[test]
    fn test_fitness_value_formula() {
        let fairness = FairnessReport {
            disparity: 0.25,
            statistical_parity: 0.25,
            equal_opportunity: 0.5,
        };
        assert_eq!(fitness_value(1.0, &FairnessReport::zero()), 0.0);
        assert!((fitness_value(0.75, &fairness) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_score_predictions_checks_alignment() {
        let ds = dataset(4);
        let result = score_predictions(&ds, &[0, 1, 2], "group", "target", &array![0.0, 1.0]);
        assert!(matches!(result, Err(FairfitError::MisalignedIndices { .. })));
    }

    #[test]
    fn test_perfect_signal_has_zero_fitness() {
        let evaluator = FitnessEvaluator::default();
        let breakdown = evaluator
            .evaluate(&dataset(40), "group", "target", ModelKind::LogisticRegression)
            .unwrap();
        assert_eq!(breakdown.n_test, 8);
        assert_eq!(breakdown.n_train, 32);
        assert_eq!(breakdown.fitness, 0.0);
    }

    #[test]
    fn test_unsupported_model_name() {
        let evaluator = FitnessEvaluator::default();
        let result = evaluator.fitness(&dataset(10), "group", "target", "naive_bayes");
        assert!(matches!(result, Err(FairfitError::UnsupportedModelKind(_))));
    }

    #[test]
    fn test_missing_protected_attribute() {
        let evaluator = FitnessEvaluator::default();
        let result = evaluator.evaluate(&dataset(10), "race", "target", ModelKind::Knn);
        assert!(matches!(result, Err(FairfitError::ColumnNotFound(_))));
    }
}
