//! fairfit - fairness-aware fitness evaluation and bias mitigation search
//!
//! A model's fitness combines how well it predicts with how evenly its
//! positive predictions fall across the groups of a protected attribute:
//! `fitness = (1 - performance_score) + fairness_score`, lower is better.
//!
//! # Modules
//!
//! ## Scoring
//! - [`fairness`] - Disparity, statistical parity and equal opportunity
//! - [`metrics`] - Accuracy and weighted precision/recall/F1
//! - [`fitness`] - Train/test fitness evaluation of one model kind
//!
//! ## Search
//! - [`mitigation`] - Bias mitigation techniques (tuning, massaging,
//!   thresholds, SMOTE, reweighing, disparate impact removal)
//! - [`optimization`] - Lowest-fitness search over techniques
//!
//! ## Plumbing
//! - [`data`] - Dataset model, preparation, encoding and loading
//! - [`training`] - Native binary classifiers and splitting
//! - [`config`] - Serde configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data and models
pub mod data;
pub mod training;

// Scoring
pub mod fairness;
pub mod metrics;
pub mod fitness;

// Search
pub mod mitigation;
pub mod optimization;

// Services
pub mod cli;

pub use error::{FairfitError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{FairfitError, Result};

    // Configuration
    pub use crate::config::{FailurePolicy, FairfitConfig, FitnessConfig, SearchConfig, TuningConfig};

    // Data
    pub use crate::data::{load_dataset, one_hot_encode, Column, DataPreparer, Dataset, DefaultPreparer, FeatureMatrix, Labels};

    // Training
    pub use crate::training::{Classifier, ModelKind, ModelParams};

    // Scoring
    pub use crate::fairness::{fairness_metrics, FairnessReport};
    pub use crate::fitness::{fitness_value, score_predictions, FitnessBreakdown, FitnessEvaluator};
    pub use crate::metrics::{performance_score, PerformanceReport};

    // Search
    pub use crate::mitigation::{
        Technique, TechniqueContext, TechniqueEntry, TechniqueId, TechniqueRegistry, ThresholdOptimizer,
        TrainedPredictor,
    };
    pub use crate::optimization::{ModelOptimizer, OptimizationOutcome};
}
