//! Dataset model and data plumbing
//!
//! - [`Dataset`] - named columns addressed by row position
//! - [`DataPreparer`] - cleaning applied before fitness evaluation
//! - [`one_hot_encode`] - drop-first encoding into a [`FeatureMatrix`]
//! - [`load_dataset`] - CSV/JSON/Parquet loading via polars

mod dataset;
mod encoding;
mod loader;
mod preparation;

pub use dataset::{Column, Dataset, Labels, MISSING_KEY};
pub use encoding::{one_hot_encode, FeatureMatrix};
pub use loader::load_dataset;
pub use preparation::{DataPreparer, DefaultPreparer};
