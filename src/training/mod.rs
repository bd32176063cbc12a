//! Model training module
//!
//! Native binary classifiers behind the [`Classifier`] trait:
//! - Logistic regression
//! - Random Forests (over decision trees)
//! - Support Vector Machines
//! - K-Nearest Neighbors
//! - Gradient boosting
//!
//! plus train/test splitting and cross-validation.

mod config;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use config::{ModelKind, ModelParams};
pub use cross_validation::{train_test_split, CVSplit, CVStrategy, CrossValidator, TrainTestSplit};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::LogisticRegression;
pub use models::Classifier;
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
