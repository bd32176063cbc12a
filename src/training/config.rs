//! Model kinds and their hyperparameters

use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::knn::{KNNClassifier, KNNConfig, WeightScheme};
use super::linear_models::LogisticRegression;
use super::models::Classifier;
use super::random_forest::RandomForest;
use super::svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
use crate::error::FairfitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Logistic Regression
    LogisticRegression,
    /// Random Forest
    RandomForest,
    /// Support Vector Machine
    Svm,
    /// K-Nearest Neighbors
    Knn,
    /// Gradient Boosted Trees
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::LogisticRegression,
        ModelKind::RandomForest,
        ModelKind::Svm,
        ModelKind::Knn,
        ModelKind::GradientBoosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::Svm => "svm",
            ModelKind::Knn => "knn",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// Library defaults for this kind
    pub fn default_params(&self) -> ModelParams {
        match self {
            ModelKind::LogisticRegression => ModelParams::LogisticRegression {
                alpha: 0.01,
                learning_rate: 0.1,
                max_iter: 1000,
            },
            ModelKind::RandomForest => ModelParams::RandomForest {
                n_estimators: 100,
                max_depth: None,
                min_samples_leaf: 1,
            },
            ModelKind::Svm => ModelParams::Svm {
                c: 1.0,
                kernel: KernelType::RBF { gamma: Gamma::Scale },
            },
            ModelKind::Knn => ModelParams::Knn {
                n_neighbors: 5,
                weights: WeightScheme::Uniform,
            },
            ModelKind::GradientBoosting => ModelParams::GradientBoosting {
                n_estimators: 100,
                learning_rate: 0.1,
                max_depth: 3,
            },
        }
    }

    /// Search space used by hyperparameter tuning, defaults first
    pub fn param_grid(&self) -> Vec<ModelParams> {
        match self {
            ModelKind::LogisticRegression => [0.01, 0.001, 0.1]
                .iter()
                .map(|&alpha| ModelParams::LogisticRegression {
                    alpha,
                    learning_rate: 0.1,
                    max_iter: 1000,
                })
                .collect(),
            ModelKind::RandomForest => {
                let mut grid = Vec::new();
                for n_estimators in [100, 50] {
                    for max_depth in [None, Some(5), Some(10)] {
                        grid.push(ModelParams::RandomForest {
                            n_estimators,
                            max_depth,
                            min_samples_leaf: 1,
                        });
                    }
                }
                grid
            }
            ModelKind::Svm => {
                let mut grid = Vec::new();
                for c in [1.0, 0.1, 10.0] {
                    grid.push(ModelParams::Svm { c, kernel: KernelType::RBF { gamma: Gamma::Scale } });
                    grid.push(ModelParams::Svm { c, kernel: KernelType::Linear });
                }
                grid
            }
            ModelKind::Knn => {
                let mut grid = Vec::new();
                for n_neighbors in [5, 3, 7, 11] {
                    for weights in [WeightScheme::Uniform, WeightScheme::Distance] {
                        grid.push(ModelParams::Knn { n_neighbors, weights });
                    }
                }
                grid
            }
            ModelKind::GradientBoosting => {
                let mut grid = Vec::new();
                for n_estimators in [100, 50] {
                    for learning_rate in [0.1, 0.05] {
                        for max_depth in [3, 5] {
                            grid.push(ModelParams::GradientBoosting {
                                n_estimators,
                                learning_rate,
                                max_depth,
                            });
                        }
                    }
                }
                grid
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = FairfitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| FairfitError::UnsupportedModelKind(s.to_string()))
    }
}

/// Hyperparameters of one model kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelParams {
    LogisticRegression {
        alpha: f64,
        learning_rate: f64,
        max_iter: usize,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
    },
    Svm {
        c: f64,
        kernel: KernelType,
    },
    Knn {
        n_neighbors: usize,
        weights: WeightScheme,
    },
    GradientBoosting {
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
    },
}

impl ModelParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelParams::LogisticRegression { .. } => ModelKind::LogisticRegression,
            ModelParams::RandomForest { .. } => ModelKind::RandomForest,
            ModelParams::Svm { .. } => ModelKind::Svm,
            ModelParams::Knn { .. } => ModelKind::Knn,
            ModelParams::GradientBoosting { .. } => ModelKind::GradientBoosting,
        }
    }

    /// Build an untrained classifier; `seed` drives any randomness
    pub fn build(&self, seed: u64) -> Box<dyn Classifier> {
        match self {
            ModelParams::LogisticRegression { alpha, learning_rate, max_iter } => Box::new(
                LogisticRegression::new()
                    .with_alpha(*alpha)
                    .with_learning_rate(*learning_rate)
                    .with_max_iter(*max_iter),
            ),
            ModelParams::RandomForest { n_estimators, max_depth, min_samples_leaf } => {
                let mut forest = RandomForest::new_classifier(*n_estimators)
                    .with_min_samples_leaf(*min_samples_leaf)
                    .with_random_state(seed);
                if let Some(depth) = max_depth {
                    forest = forest.with_max_depth(*depth);
                }
                Box::new(forest)
            }
            ModelParams::Svm { c, kernel } => Box::new(SVMClassifier::new(SVMConfig {
                c: *c,
                kernel: kernel.clone(),
                random_state: seed,
                ..SVMConfig::default()
            })),
            ModelParams::Knn { n_neighbors, weights } => Box::new(KNNClassifier::new(KNNConfig {
                n_neighbors: *n_neighbors,
                weights: *weights,
                ..KNNConfig::default()
            })),
            ModelParams::GradientBoosting { n_estimators, learning_rate, max_depth } => {
                Box::new(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: *n_estimators,
                    learning_rate: *learning_rate,
                    max_depth: *max_depth,
                    random_state: seed,
                    ..GradientBoostingConfig::default()
                }))
            }
        }
    }
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelParams::LogisticRegression { alpha, learning_rate, max_iter } => write!(
                f,
                "logistic_regression(alpha={}, learning_rate={}, max_iter={})",
                alpha, learning_rate, max_iter
            ),
            ModelParams::RandomForest { n_estimators, max_depth, min_samples_leaf } => write!(
                f,
                "random_forest(n_estimators={}, max_depth={:?}, min_samples_leaf={})",
                n_estimators, max_depth, min_samples_leaf
            ),
            ModelParams::Svm { c, kernel } => write!(f, "svm(c={}, kernel={:?})", c, kernel),
            ModelParams::Knn { n_neighbors, weights } => {
                write!(f, "knn(n_neighbors={}, weights={:?})", n_neighbors, weights)
            }
            ModelParams::GradientBoosting { n_estimators, learning_rate, max_depth } => write!(
                f,
                "gradient_boosting(n_estimators={}, learning_rate={}, max_depth={})",
                n_estimators, learning_rate, max_depth
            ),
        }
    }
}
