//! Table → scaled train/test matrices

use super::config::{DataConfig, DerivedFeature, SplitConfig};
use super::encoder::CategoryEncoder;
use super::scaler::StandardScaler;
use super::split::stratified_train_test_split;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Output of [`DataPreparer::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Model input columns in matrix order; derived features come last
    pub feature_names: Vec<String>,
    pub train_x: Array2<f64>,
    pub train_y: Array1<f64>,
    pub test_x: Array2<f64>,
    pub test_y: Array1<f64>,
    /// Row positions in the source table
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub encoder: CategoryEncoder,
    pub scaler: StandardScaler,
    /// Original label values for codes 0 and 1
    pub label_classes: [String; 2],
    base_columns: Vec<String>,
    derived: Vec<DerivedFeature>,
}

impl PreparedData {
    pub fn n_rows(&self) -> usize {
        self.train_indices.len() + self.test_indices.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Fraction of positive labels over both partitions
    pub fn positive_rate(&self) -> f64 {
        let positives = self.train_y.sum() + self.test_y.sum();
        positives / self.n_rows().max(1) as f64
    }

    /// Apply the fitted encoding, derivation and scaling to new rows
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let encoded = self.encoder.transform(df)?;
        let raw = feature_matrix(&encoded, &self.base_columns, &self.derived)?;
        self.scaler.transform(&raw)
    }
}

/// Turns a raw table into model-ready partitions
#[derive(Debug, Clone, Default)]
pub struct DataPreparer {
    data: DataConfig,
    split: SplitConfig,
}

impl DataPreparer {
    pub fn new(data: DataConfig, split: SplitConfig) -> Self {
        Self { data, split }
    }

    pub fn data_config(&self) -> &DataConfig {
        &self.data
    }

    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedData> {
        let start = Instant::now();
        self.data.validate()?;
        self.split.validate()?;

        let label = &self.data.label;
        if df.column(label).is_err() {
            return Err(PipelineError::SchemaError(format!(
                "label column '{}' not found",
                label
            )));
        }
        let (y, label_classes) = encode_label(df, label)?;

        let mut encoder = CategoryEncoder::new();
        let encoded = encoder.fit_transform(df, &self.data.categorical)?;

        let base_columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| name != label && !self.data.exclude.contains(name))
            .collect();
        if base_columns.is_empty() {
            return Err(PipelineError::SchemaError(
                "no feature columns left after exclusions".to_string(),
            ));
        }

        if let Some(clash) = self.data.derived.iter().find(|d| base_columns.contains(&d.name)) {
            return Err(PipelineError::ConfigError(format!(
                "derived feature '{}' has the same name as an input column",
                clash.name
            )));
        }

        let x = feature_matrix(&encoded, &base_columns, &self.data.derived)?;
        let mut feature_names = base_columns.clone();
        feature_names.extend(self.data.derived.iter().map(|d| d.name.clone()));

        let (train_indices, test_indices) =
            stratified_train_test_split(&y, self.split.test_ratio, self.split.seed)?;

        let mut scaler = StandardScaler::new();
        let train_x = scaler.fit_transform(&x.select(Axis(0), &train_indices))?;
        let test_x = scaler.transform(&x.select(Axis(0), &test_indices))?;
        for &col in scaler.constant_columns() {
            warn!(feature = %feature_names[col], "Constant feature column in training partition");
        }

        let train_y = y.select(Axis(0), &train_indices);
        let test_y = y.select(Axis(0), &test_indices);

        info!(
            rows = y.len(),
            features = feature_names.len(),
            train = train_indices.len(),
            test = test_indices.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prepared dataset"
        );

        Ok(PreparedData {
            feature_names,
            train_x,
            train_y,
            test_x,
            test_y,
            train_indices,
            test_indices,
            encoder,
            scaler,
            label_classes,
            base_columns,
            derived: self.data.derived.clone(),
        })
    }
}

/// Label column as 0/1 plus the original value of each code
fn encode_label(df: &DataFrame, label: &str) -> Result<(Array1<f64>, [String; 2])> {
    let series = df.column(label)?.as_materialized_series().clone();
    if series.null_count() > 0 {
        return Err(PipelineError::SchemaError(format!(
            "label column '{}' contains {} null values",
            label,
            series.null_count()
        )));
    }

    if matches!(series.dtype(), DataType::String) {
        let values: Vec<String> = series
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect();
        let distinct: Vec<String> = values.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        if distinct.len() != 2 {
            return Err(PipelineError::SchemaError(format!(
                "label column '{}' has {} distinct values, expected 2",
                label,
                distinct.len()
            )));
        }
        let y = values
            .iter()
            .map(|v| if *v == distinct[1] { 1.0 } else { 0.0 })
            .collect();
        return Ok((y, [distinct[0].clone(), distinct[1].clone()]));
    }

    let values: Vec<f64> = series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    if let Some(bad) = values.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::SchemaError(format!(
            "label column '{}' must contain only 0 and 1, found {}",
            label, bad
        )));
    }
    if !values.contains(&0.0) || !values.contains(&1.0) {
        return Err(PipelineError::SchemaError(format!(
            "label column '{}' holds a single class",
            label
        )));
    }
    Ok((Array1::from(values), ["0".to_string(), "1".to_string()]))
}

/// Numeric matrix from already-encoded columns, derived ratios appended
fn feature_matrix(
    df: &DataFrame,
    columns: &[String],
    derived: &[DerivedFeature],
) -> Result<Array2<f64>> {
    let mut data: Vec<Vec<f64>> = Vec::with_capacity(columns.len() + derived.len());
    for name in columns {
        data.push(numeric_column(df, name)?);
    }

    for feature in derived {
        let position = |source: &str| {
            columns.iter().position(|c| c == source).ok_or_else(|| {
                PipelineError::SchemaError(format!(
                    "derived feature '{}' needs column '{}'",
                    feature.name, source
                ))
            })
        };
        let num = position(&feature.numerator)?;
        let den = position(&feature.denominator)?;
        let ratio: Vec<f64> = data[num]
            .iter()
            .zip(data[den].iter())
            .map(|(&n, &d)| if d == 0.0 { 0.0 } else { n / d })
            .collect();
        debug!(feature = %feature.name, "Derived ratio feature");
        data.push(ratio);
    }

    let n_rows = df.height();
    Ok(Array2::from_shape_fn((n_rows, data.len()), |(i, j)| data[j][i]))
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name).map_err(|_| {
        PipelineError::SchemaError(format!("feature column '{}' not found", name))
    })?;
    if matches!(column.dtype(), DataType::String) {
        return Err(PipelineError::SchemaError(format!(
            "feature column '{}' is non-numeric; declare it categorical or exclude it",
            name
        )));
    }
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    if series.null_count() > 0 {
        return Err(PipelineError::SchemaError(format!(
            "feature column '{}' contains {} null values",
            name,
            series.null_count()
        )));
    }
    Ok(series.f64()?.into_no_null_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "id" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            "city" => ["b", "a", "c", "a", "b", "c", "a", "b", "c", "a"],
            "balance" => [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0],
            "products" => [1i64, 2, 1, 2, 1, 2, 1, 2, 1, 0],
            "churned" => [0i64, 1, 0, 0, 1, 0, 0, 1, 0, 0]
        )
        .unwrap()
    }

    fn preparer() -> DataPreparer {
        DataPreparer::new(
            DataConfig::new("churned")
                .with_categorical(["city"])
                .with_exclude(["id", "not_there"]),
            SplitConfig { test_ratio: 0.3, seed: 5 },
        )
    }

    #[test]
    fn test_prepare_shapes_and_names() {
        let prepared = preparer().prepare(&sample()).unwrap();

        assert_eq!(prepared.feature_names, vec!["city", "balance", "products"]);
        assert_eq!(prepared.test_x.nrows(), 3);
        assert_eq!(prepared.train_x.nrows(), 7);
        assert_eq!(prepared.train_x.ncols(), 3);
        assert_eq!(prepared.n_rows(), 10);
        assert!((prepared.positive_rate() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_training_columns_are_standardized() {
        let prepared = preparer().prepare(&sample()).unwrap();
        for col in prepared.train_x.columns() {
            assert!(col.mean().unwrap().abs() < 1e-9);
            assert!((col.std(0.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_derived_ratio_zero_denominator() {
        let config = DataConfig::new("churned")
            .with_categorical(["city"])
            .with_exclude(["id"])
            .with_derived(DerivedFeature::ratio("per_product", "balance", "products"));
        let df = sample();
        let encoded = CategoryEncoder::new()
            .fit_transform(&df, &config.categorical)
            .unwrap();
        let base = vec!["balance".to_string(), "products".to_string()];
        let x = feature_matrix(&encoded, &base, &config.derived).unwrap();

        assert_eq!(x.ncols(), 3);
        assert_eq!(x[[1, 2]], 5.0);
        assert_eq!(x[[9, 2]], 0.0);
    }

    #[test]
    fn test_derived_name_clashing_with_input_column() {
        let config = DataConfig::new("churned")
            .with_categorical(["city"])
            .with_exclude(["id"])
            .with_derived(DerivedFeature::ratio("balance", "balance", "products"));
        let prepared = DataPreparer::new(config, SplitConfig::default()).prepare(&sample());
        assert!(matches!(prepared, Err(PipelineError::ConfigError(_))));

        // An excluded column's name is free for reuse
        let config = DataConfig::new("churned")
            .with_categorical(["city"])
            .with_exclude(["id"])
            .with_derived(DerivedFeature::ratio("id", "balance", "products"));
        let prepared = DataPreparer::new(config, SplitConfig::default())
            .prepare(&sample())
            .unwrap();
        assert_eq!(prepared.feature_names.last().map(String::as_str), Some("id"));
    }

    #[test]
    fn test_missing_label_is_schema_error() {
        let prepared = DataPreparer::new(DataConfig::new("nope"), SplitConfig::default())
            .prepare(&sample());
        assert!(matches!(prepared, Err(PipelineError::SchemaError(_))));
    }

    #[test]
    fn test_undeclared_string_feature_is_schema_error() {
        let preparer = DataPreparer::new(
            DataConfig::new("churned").with_exclude(["id"]),
            SplitConfig::default(),
        );
        assert!(matches!(
            preparer.prepare(&sample()),
            Err(PipelineError::SchemaError(_))
        ));
    }

    #[test]
    fn test_string_label_encoded_in_sorted_order() {
        let df = df!(
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => ["stay", "leave", "stay", "stay", "leave"]
        )
        .unwrap();
        let (y, classes) = encode_label(&df, "y").unwrap();
        assert_eq!(classes, ["leave".to_string(), "stay".to_string()]);
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let df = df!("x" => [1.0, 2.0, 3.0], "y" => [0i64, 1, 2]).unwrap();
        assert!(matches!(
            encode_label(&df, "y"),
            Err(PipelineError::SchemaError(_))
        ));
    }

    #[test]
    fn test_transform_new_rows_with_unseen_category() {
        let prepared = preparer().prepare(&sample()).unwrap();
        let new_rows = df!(
            "id" => [99i64],
            "city" => ["zz"],
            "balance" => [45.0],
            "products" => [1i64],
            "churned" => [0i64]
        )
        .unwrap();
        let x = prepared.transform(&new_rows).unwrap();
        assert_eq!(x.dim(), (1, 3));
        assert!(x.iter().all(|v| v.is_finite()));
    }
}
