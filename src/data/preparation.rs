//! Data preparation applied before fitness evaluation

use super::dataset::{Column, Dataset};
use crate::error::{FairfitError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Cleans a raw dataset before model fitting.
///
/// Implementations must keep the target column and the protected attribute,
/// must leave no missing values in feature columns, and must not invent
/// group membership for rows whose protected attribute is missing.
pub trait DataPreparer: Send + Sync {
    fn prepare(&self, dataset: &Dataset, target_column: &str, protected_attribute: &str) -> Result<Dataset>;
}

/// Default preparation: binary target encoding plus mean/mode imputation.
///
/// Rows missing the target or the protected attribute are dropped; the
/// protected attribute itself is never imputed.
#[derive(Debug, Clone, Default)]
pub struct DefaultPreparer;

impl DefaultPreparer {
    pub fn new() -> Self {
        Self
    }

    /// Map the target onto 0/1, accepting at most two distinct values
    fn encode_target(column: &Column, target_column: &str) -> Result<Column> {
        let levels = column.levels();
        if levels.len() > 2 {
            return Err(FairfitError::InvalidInput(format!(
                "Target column '{}' has {} classes, expected a binary target",
                target_column,
                levels.len()
            )));
        }

        if let Column::Numeric(values) = column {
            if values.iter().flatten().all(|&v| v == 0.0 || v == 1.0) {
                return Ok(column.clone());
            }
        }

        debug!(target = %target_column, levels = ?levels, "Label-encoding target");
        let encoded = (0..column.len())
            .map(|r| {
                column
                    .key(r)
                    .and_then(|k| levels.iter().position(|l| *l == k))
                    .map(|i| i as f64)
            })
            .collect();
        Ok(Column::Numeric(encoded))
    }

    fn impute(column: &Column) -> Column {
        if column.null_count() == 0 {
            return column.clone();
        }
        match column {
            Column::Numeric(values) => {
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                let mean = if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                };
                Column::Numeric(values.iter().map(|v| Some(v.unwrap_or(mean))).collect())
            }
            Column::Categorical(values) => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for v in values.iter().flatten() {
                    *counts.entry(v.as_str()).or_insert(0) += 1;
                }
                // Ties go to the smallest level
                let mode = counts
                    .iter()
                    .fold(None, |best: Option<(&str, usize)>, (&k, &c)| match best {
                        Some((_, bc)) if bc >= c => best,
                        _ => Some((k, c)),
                    })
                    .map(|(k, _)| k.to_string())
                    .unwrap_or_else(|| "missing".to_string());
                Column::Categorical(
                    values.iter().map(|v| Some(v.clone().unwrap_or_else(|| mode.clone()))).collect(),
                )
            }
        }
    }
}

impl DataPreparer for DefaultPreparer {
    fn prepare(&self, dataset: &Dataset, target_column: &str, protected_attribute: &str) -> Result<Dataset> {
        let target = dataset.column(target_column)?;
        let protected = dataset.column(protected_attribute)?;

        // Rows without a target cannot be scored; rows without a group
        // belong to no fairness distribution
        let keep: Vec<usize> = (0..dataset.n_rows())
            .filter(|&r| target.key(r).is_some() && protected.key(r).is_some())
            .collect();
        if keep.len() < dataset.n_rows() {
            debug!(
                dropped = dataset.n_rows() - keep.len(),
                missing_target = target.null_count(),
                missing_group = protected.null_count(),
                "Dropping rows with missing target or protected attribute"
            );
        }
        let dataset = dataset.take_rows(&keep)?;

        let mut columns = Vec::with_capacity(dataset.n_columns());
        for (name, column) in dataset.columns() {
            let prepared = if name == target_column {
                Self::encode_target(column, target_column)?
            } else if name == protected_attribute {
                column.clone()
            } else {
                Self::impute(column)
            };
            columns.push((name.to_string(), prepared));
        }
        Dataset::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imputes_mean_and_mode() {
        let ds = Dataset::new(vec![
            ("x".to_string(), Column::Numeric(vec![Some(1.0), None, Some(3.0)])),
            (
                "c".to_string(),
                Column::Categorical(vec![Some("a".into()), Some("b".into()), None]),
            ),
            ("y".to_string(), Column::numeric(vec![0.0, 1.0, 1.0])),
        ])
        .unwrap();

        let prepared = DefaultPreparer::new().prepare(&ds, "y", "y").unwrap();
        assert_eq!(prepared.column("x").unwrap(), &Column::numeric(vec![1.0, 2.0, 3.0]));
        assert_eq!(prepared.column("c").unwrap(), &Column::categorical(vec!["a", "b", "a"]));
    }

    #[test]
    fn test_drops_rows_without_target_and_encodes_labels() {
        let ds = Dataset::new(vec![
            ("x".to_string(), Column::numeric(vec![1.0, 2.0, 3.0])),
            (
                "y".to_string(),
                Column::Categorical(vec![Some("yes".into()), None, Some("no".into())]),
            ),
        ])
        .unwrap();

        let prepared = DefaultPreparer::new().prepare(&ds, "y", "x").unwrap();
        assert_eq!(prepared.n_rows(), 2);
        // sorted levels: "no" -> 0, "yes" -> 1
        assert_eq!(prepared.column("y").unwrap(), &Column::numeric(vec![1.0, 0.0]));
    }

    #[test]
    fn test_rejects_multiclass_target() {
        let ds = Dataset::new(vec![("y".to_string(), Column::numeric(vec![0.0, 1.0, 2.0]))]).unwrap();
        assert!(matches!(
            DefaultPreparer::new().prepare(&ds, "y", "y"),
            Err(FairfitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_target_column() {
        let ds = Dataset::new(vec![("x".to_string(), Column::numeric(vec![0.0]))]).unwrap();
        assert!(matches!(
            DefaultPreparer::new().prepare(&ds, "y", "y"),
            Err(FairfitError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_missing_group_rows_dropped_not_imputed() {
        let n = 40;
        let g: Vec<Option<String>> = (0..n)
            .map(|i| if i >= 30 { None } else { Some(if i < 20 { "a" } else { "b" }.to_string()) })
            .collect();
        let ds = Dataset::new(vec![
            ("x".to_string(), Column::numeric((0..n).map(|i| i as f64).collect())),
            ("g".to_string(), Column::Categorical(g)),
            ("y".to_string(), Column::numeric((0..n).map(|i| (i % 2) as f64).collect())),
        ])
        .unwrap();

        let prepared = DefaultPreparer::new().prepare(&ds, "y", "g").unwrap();
        assert_eq!(prepared.n_rows(), 30);
        let rows: Vec<usize> = (0..prepared.n_rows()).collect();
        let keys = prepared.group_keys("g", &rows).unwrap();
        assert_eq!(keys.iter().filter(|k| *k == "a").count(), 20);
        assert_eq!(keys.iter().filter(|k| *k == "b").count(), 10);
        assert_eq!(prepared.column("g").unwrap().null_count(), 0);
    }

    #[test]
    fn test_missing_protected_column() {
        let ds = Dataset::new(vec![("y".to_string(), Column::numeric(vec![0.0, 1.0]))]).unwrap();
        assert!(matches!(
            DefaultPreparer::new().prepare(&ds, "y", "sex"),
            Err(FairfitError::ColumnNotFound(_))
        ));
    }
}
