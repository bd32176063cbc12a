//! Feature matrix construction with drop-first one-hot encoding

use super::dataset::{Column, Dataset};
use crate::error::{FairfitError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Dense feature matrix whose rows keep their position in the source dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// Column names after encoding
    pub names: Vec<String>,
    /// Row-major values
    pub values: Array2<f64>,
    /// Source dataset row of each matrix row
    pub rows: Vec<usize>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>, rows: Vec<usize>) -> Result<Self> {
        if names.len() != values.ncols() || rows.len() != values.nrows() {
            return Err(FairfitError::ShapeError {
                expected: format!("{} rows x {} columns", rows.len(), names.len()),
                actual: format!("{} rows x {} columns", values.nrows(), values.ncols()),
            });
        }
        Ok(Self { names, values, rows })
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Sub-matrix of the given matrix positions; source rows follow along
    pub fn select(&self, positions: &[usize]) -> Result<FeatureMatrix> {
        if let Some(&bad) = positions.iter().find(|&&p| p >= self.n_samples()) {
            return Err(FairfitError::IndexOutOfBounds { index: bad, len: self.n_samples() });
        }
        Ok(FeatureMatrix {
            names: self.names.clone(),
            values: self.values.select(Axis(0), positions),
            rows: positions.iter().map(|&p| self.rows[p]).collect(),
        })
    }
}

/// Encode every column not in `exclude` as numeric features.
///
/// Numeric columns come first in their original order, followed by one
/// indicator column per categorical level with the first sorted level
/// dropped. Missing values are rejected; impute before encoding.
pub fn one_hot_encode(dataset: &Dataset, exclude: &[&str]) -> Result<FeatureMatrix> {
    let n_rows = dataset.n_rows();
    let mut names = Vec::new();
    let mut col_data: Vec<Vec<f64>> = Vec::new();
    let mut dummies: Vec<(String, Vec<f64>)> = Vec::new();

    for (name, column) in dataset.columns() {
        if exclude.contains(&name) {
            continue;
        }
        if column.null_count() > 0 {
            return Err(FairfitError::DataError(format!(
                "Feature column '{}' has {} missing values",
                name,
                column.null_count()
            )));
        }

        match column {
            Column::Numeric(values) => {
                names.push(name.to_string());
                col_data.push(values.iter().map(|v| v.unwrap_or(0.0)).collect());
            }
            Column::Categorical(values) => {
                for level in column.levels().into_iter().skip(1) {
                    let indicator = values
                        .iter()
                        .map(|v| if v.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 })
                        .collect();
                    dummies.push((format!("{}_{}", name, level), indicator));
                }
            }
        }
    }

    for (name, indicator) in dummies {
        names.push(name);
        col_data.push(indicator);
    }

    let n_cols = col_data.len();
    let values = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]);
    FeatureMatrix::new(names, values, (0..n_rows).collect())
}
