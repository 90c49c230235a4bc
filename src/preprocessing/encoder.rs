//! Categorical encoding

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Code assigned to a category that was not seen during fit
pub const UNSEEN_CODE: f64 = -1.0;

/// Ordinal encoder: each distinct value gets its rank in lexicographic order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// column → sorted distinct values; the position is the code
    mappings: BTreeMap<String, Vec<String>>,
    is_fitted: bool,
}

impl CategoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        for col_name in columns {
            let values = string_values(df, col_name)?;
            let distinct: BTreeSet<String> = values.into_iter().collect();
            self.mappings
                .insert(col_name.clone(), distinct.into_iter().collect());
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its Float64 codes
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, categories) in &self.mappings {
            let values = string_values(df, col_name)?;
            let codes: Vec<f64> = values
                .iter()
                .map(|v| code_of(categories, v))
                .collect();
            result.with_column(Series::new(col_name.as_str().into(), codes))?;
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Code for a single value; [`UNSEEN_CODE`] when it was not seen during fit
    pub fn encode(&self, column: &str, value: &str) -> Option<f64> {
        self.mappings.get(column).map(|cats| code_of(cats, value))
    }

    /// Fitted categories of a column, in code order
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.mappings.get(column).map(|c| c.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.mappings.keys()
    }
}

fn code_of(categories: &[String], value: &str) -> f64 {
    categories
        .binary_search_by(|c| c.as_str().cmp(value))
        .map(|pos| pos as f64)
        .unwrap_or(UNSEEN_CODE)
}

/// Column contents as strings; non-string dtypes are cast first
fn string_values(df: &DataFrame, col_name: &str) -> Result<Vec<String>> {
    let column = df.column(col_name).map_err(|_| {
        PipelineError::SchemaError(format!("categorical column '{}' not found", col_name))
    })?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    if series.null_count() > 0 {
        return Err(PipelineError::SchemaError(format!(
            "categorical column '{}' contains {} null values",
            col_name,
            series.null_count()
        )));
    }
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}
