//! Dataset loading through polars

use super::dataset::{Column, Dataset};
use crate::error::{FairfitError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

impl Dataset {
    /// Convert a polars DataFrame; numeric and boolean columns become
    /// `Column::Numeric`, string and categorical columns `Column::Categorical`.
    pub fn from_dataframe(df: &DataFrame) -> Result<Dataset> {
        let mut columns = Vec::with_capacity(df.width());

        for col in df.get_columns() {
            let name = col.name().to_string();
            let column = match col.dtype() {
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
                DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
                DataType::Float32 | DataType::Float64 | DataType::Boolean => {
                    let casted = col.cast(&DataType::Float64)?;
                    let values: Vec<Option<f64>> = casted.f64()?.into_iter().collect();
                    Column::Numeric(values)
                }
                DataType::String | DataType::Categorical(_, _) => {
                    let casted = col.cast(&DataType::String)?;
                    let values: Vec<Option<String>> = casted
                        .str()?
                        .into_iter()
                        .map(|v| v.map(|s| s.to_string()))
                        .collect();
                    Column::Categorical(values)
                }
                other => {
                    return Err(FairfitError::DataError(format!(
                        "Unsupported dtype {:?} for column '{}'",
                        other, name
                    )))
                }
            };
            columns.push((name, column));
        }

        Dataset::new(columns)
    }
}

/// Load a dataset, picking the reader from the file extension
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let df = match ext.as_str() {
        "csv" | "tsv" => {
            let separator = if ext == "tsv" { b'\t' } else { b',' };
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(1000))
                .with_parse_options(CsvParseOptions::default().with_separator(separator))
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?
        }
        "json" => JsonReader::new(File::open(path)?).finish()?,
        "parquet" | "pq" => ParquetReader::new(File::open(path)?).finish()?,
        other => {
            return Err(FairfitError::DataError(format!(
                "Unsupported file format: '{}'",
                other
            )))
        }
    };

    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded dataset"
    );
    Dataset::from_dataframe(&df)
}
