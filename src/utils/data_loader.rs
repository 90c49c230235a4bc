//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// CSV loader
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        let start = Instant::now();

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );
        Ok(df)
    }
}

/// Save DataFrame to CSV
pub struct DataSaver;

impl DataSaver {
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(df)?;
        Ok(())
    }
}

/// Per-column summary used by `churnlab info`
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub unique_count: usize,
}

/// Shape, columns and label balance of a table
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnInfo>,
    /// (label value, count) in ascending value order
    pub label_counts: Option<Vec<(String, usize)>>,
}

impl DatasetInfo {
    pub fn from_frame(df: &DataFrame, label: Option<&str>) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            columns.push(ColumnInfo {
                name: column.name().to_string(),
                dtype: column.dtype().to_string(),
                null_count: series.null_count(),
                unique_count: series.n_unique()?,
            });
        }

        let label_counts = match label {
            Some(name) => {
                let series = df
                    .column(name)
                    .map_err(|_| {
                        PipelineError::SchemaError(format!("label column '{}' not found", name))
                    })?
                    .as_materialized_series()
                    .cast(&DataType::String)?;
                let mut counts = std::collections::BTreeMap::new();
                for value in series.str()?.into_iter() {
                    *counts
                        .entry(value.unwrap_or("null").to_string())
                        .or_insert(0usize) += 1;
                }
                Some(counts.into_iter().collect())
            }
            None => None,
        };

        Ok(Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
            label_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut df = df!("a" => [1i64, 2, 3], "b" => ["x", "y", "x"]).unwrap();

        DataSaver::save_csv(&mut df, &path).unwrap();
        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.shape(), (3, 2));
        assert!(loaded.equals(&df));
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PipelineError::IoError(_)));
    }

    #[test]
    fn test_dataset_info_label_counts() {
        let df = df!("x" => [1.0, 2.0, 3.0], "y" => [0i64, 1, 0]).unwrap();
        let info = DatasetInfo::from_frame(&df, Some("y")).unwrap();
        assert_eq!(info.n_rows, 3);
        assert_eq!(info.columns[1].unique_count, 2);
        assert_eq!(
            info.label_counts.unwrap(),
            vec![("0".to_string(), 2), ("1".to_string(), 1)]
        );
    }
}
