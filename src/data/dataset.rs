//! In-memory tabular dataset addressed by row position

use crate::error::{FairfitError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Key used for rows whose group value is missing
pub const MISSING_KEY: &str = "<missing>";

/// A single named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Numeric values (integers are widened to f64)
    Numeric(Vec<Option<f64>>),
    /// String-valued categorical values
    Categorical(Vec<Option<String>>),
}

impl Column {
    /// Numeric column without missing values
    pub fn numeric(values: Vec<f64>) -> Self {
        Column::Numeric(values.into_iter().map(Some).collect())
    }

    /// Categorical column without missing values
    pub fn categorical<S: Into<String>>(values: Vec<S>) -> Self {
        Column::Categorical(values.into_iter().map(|v| Some(v.into())).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Column::Categorical(_))
    }

    /// Number of missing entries
    pub fn null_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Group key of a row: the category itself, or the numeric value rendered as text
    pub fn key(&self, row: usize) -> Option<String> {
        match self {
            Column::Numeric(v) => v.get(row).copied().flatten().map(|x| x.to_string()),
            Column::Categorical(v) => v.get(row).cloned().flatten(),
        }
    }

    /// Sorted distinct non-missing keys
    pub fn levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = match self {
            Column::Numeric(v) => {
                let mut nums: Vec<f64> = v.iter().flatten().copied().collect();
                nums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                nums.dedup();
                return nums.into_iter().map(|x| x.to_string()).collect();
            }
            Column::Categorical(v) => v.iter().flatten().cloned().collect(),
        };
        levels.sort();
        levels.dedup();
        levels
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Categorical(v) => Column::Categorical(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

/// Ordered collection of equally long named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset, validating column lengths and name uniqueness
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self> {
        let mut seen = HashSet::new();
        let expected = columns.first().map(|(_, c)| c.len()).unwrap_or(0);

        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(FairfitError::DataError(format!("Duplicate column '{}'", name)));
            }
            if column.len() != expected {
                return Err(FairfitError::ShapeError {
                    expected: format!("{} rows in column '{}'", expected, name),
                    actual: format!("{} rows", column.len()),
                });
            }
        }

        let (names, columns) = columns.into_iter().unzip();
        Ok(Self { names, columns })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Iterate over `(name, column)` pairs in order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| FairfitError::ColumnNotFound(name.to_string()))
    }

    /// Fail if any row position is outside the dataset
    pub fn check_rows(&self, rows: &[usize]) -> Result<()> {
        let len = self.n_rows();
        match rows.iter().find(|&&r| r >= len) {
            Some(&index) => Err(FairfitError::IndexOutOfBounds { index, len }),
            None => Ok(()),
        }
    }

    /// Values of a numeric column without missing entries
    pub fn numeric_values(&self, column: &str) -> Result<Vec<f64>> {
        match self.column(column)? {
            Column::Numeric(v) => v
                .iter()
                .enumerate()
                .map(|(r, x)| {
                    x.ok_or_else(|| {
                        FairfitError::DataError(format!("Column '{}' is missing at row {}", column, r))
                    })
                })
                .collect(),
            Column::Categorical(_) => Err(FairfitError::InvalidInput(format!(
                "Column '{}' is categorical",
                column
            ))),
        }
    }

    /// Group keys of `column` at the given rows
    pub fn group_keys(&self, column: &str, rows: &[usize]) -> Result<Vec<String>> {
        self.check_rows(rows)?;
        let col = self.column(column)?;
        Ok(rows
            .iter()
            .map(|&r| col.key(r).unwrap_or_else(|| MISSING_KEY.to_string()))
            .collect())
    }

    /// Binary 0/1 labels of `column` at the given rows
    pub fn binary_labels(&self, column: &str, rows: &[usize]) -> Result<Array1<f64>> {
        self.check_rows(rows)?;
        let values = match self.column(column)? {
            Column::Numeric(v) => v,
            Column::Categorical(_) => {
                return Err(FairfitError::InvalidInput(format!(
                    "Label column '{}' must be numeric 0/1",
                    column
                )))
            }
        };

        rows.iter()
            .map(|&r| match values[r] {
                Some(v) if v == 0.0 || v == 1.0 => Ok(v),
                Some(v) => Err(FairfitError::InvalidInput(format!(
                    "Label column '{}' has non-binary value {} at row {}",
                    column, v, r
                ))),
                None => Err(FairfitError::DataError(format!(
                    "Label column '{}' is missing at row {}",
                    column, r
                ))),
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Copy of the dataset without the named columns
    pub fn without_columns(&self, drop: &[&str]) -> Dataset {
        let (names, columns) = self
            .names
            .iter()
            .zip(self.columns.iter())
            .filter(|(n, _)| !drop.contains(&n.as_str()))
            .map(|(n, c)| (n.clone(), c.clone()))
            .unzip();
        Dataset { names, columns }
    }

    /// Copy of the dataset restricted to the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Result<Dataset> {
        self.check_rows(rows)?;
        Ok(Dataset {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        })
    }

    /// Replace the named column, or append it when absent
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Dataset> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(FairfitError::ShapeError {
                expected: format!("{} rows in column '{}'", self.n_rows(), name),
                actual: format!("{} rows", column.len()),
            });
        }
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(self)
    }
}

/// Named binary label vector aligned with a feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub name: String,
    pub values: Array1<f64>,
}

impl Labels {
    pub fn new(name: impl Into<String>, values: Array1<f64>) -> Self {
        Self { name: name.into(), values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            ("age".to_string(), Column::numeric(vec![20.0, 30.0, 40.0])),
            ("sex".to_string(), Column::categorical(vec!["F", "M", "F"])),
            ("label".to_string(), Column::numeric(vec![1.0, 0.0, 1.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = Dataset::new(vec![
            ("a".to_string(), Column::numeric(vec![1.0, 2.0])),
            ("b".to_string(), Column::numeric(vec![1.0])),
        ]);
        assert!(matches!(result, Err(FairfitError::ShapeError { .. })));
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let result = Dataset::new(vec![
            ("a".to_string(), Column::numeric(vec![1.0])),
            ("a".to_string(), Column::numeric(vec![2.0])),
        ]);
        assert!(matches!(result, Err(FairfitError::DataError(_))));
    }

    #[test]
    fn test_group_keys_numeric_and_categorical() {
        let ds = sample();
        assert_eq!(ds.group_keys("sex", &[2, 1]).unwrap(), vec!["F", "M"]);
        assert_eq!(ds.group_keys("label", &[0, 1]).unwrap(), vec!["1", "0"]);
    }

    #[test]
    fn test_binary_labels_rejects_other_values() {
        let ds = sample();
        assert!(ds.binary_labels("label", &[0, 1, 2]).is_ok());
        assert!(matches!(
            ds.binary_labels("age", &[0]),
            Err(FairfitError::InvalidInput(_))
        ));
        assert!(matches!(
            ds.binary_labels("label", &[7]),
            Err(FairfitError::IndexOutOfBounds { index: 7, len: 3 })
        ));
    }

    #[test]
    fn test_without_columns_and_take_rows() {
        let ds = sample();
        let dropped = ds.without_columns(&["sex", "label"]);
        assert_eq!(dropped.column_names(), &["age".to_string()]);

        let taken = ds.take_rows(&[2, 0]).unwrap();
        assert_eq!(taken.n_rows(), 2);
        assert_eq!(taken.group_keys("sex", &[0, 1]).unwrap(), vec!["F", "F"]);
    }

    #[test]
    fn test_numeric_values() {
        let ds = sample();
        assert_eq!(ds.numeric_values("age").unwrap(), vec![20.0, 30.0, 40.0]);
        assert!(ds.numeric_values("sex").is_err());
        assert!(matches!(ds.numeric_values("nope"), Err(FairfitError::ColumnNotFound(_))));
    }

    #[test]
    fn test_levels_sorted() {
        let col = Column::categorical(vec!["b", "a", "b", "c"]);
        assert_eq!(col.levels(), vec!["a", "b", "c"]);
        let num = Column::numeric(vec![2.0, 1.0, 2.0]);
        assert_eq!(num.levels(), vec!["1", "2"]);
    }
}
