//! Data preprocessing module
//!
//! Provides the stages that turn a raw table into model-ready arrays:
//! - Missing value imputation (mean, median, mode)
//! - Label encoding of non-numeric columns
//! - Feature scaling (standard, min-max)
//! - Seeded train/test splitting
//!
//! The fitted pieces are collected in a [`PreprocessingState`] that is saved
//! and reloaded as one unit so inference replays exactly the training-time
//! transforms.

mod config;
mod imputer;
mod scaler;
mod encoder;
mod pipeline;

pub use config::PreprocessingConfig;
pub use imputer::{FillValue, ImputeStrategy, Imputer};
pub use scaler::{Scaler, ScalerParams, ScalerType};
pub use encoder::{CategoricalEncoder, LabelEncoder};
pub use pipeline::{DataPreprocessor, PreprocessingState, TrainTestSplit};

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column data type for preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

impl ColumnType {
    /// Classify a polars dtype
    pub fn of(dtype: &DataType) -> Self {
        if is_numeric_dtype(dtype) {
            ColumnType::Numeric
        } else {
            ColumnType::Categorical
        }
    }
}

/// Check if dtype is numeric (booleans count as 0/1)
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean
    )
}

/// Cast all numeric (integer, boolean, f32) columns to Float64 for consistent processing
pub(crate) fn cast_numeric_to_f64(df: &DataFrame) -> Result<DataFrame> {
    let mut result = df.clone();
    for col in df.get_columns() {
        if is_numeric_dtype(col.dtype()) && col.dtype() != &DataType::Float64 {
            let casted = col
                .cast(&DataType::Float64)
                .map_err(|e| PipelineError::DataError(e.to_string()))?;
            result
                .with_column(casted)
                .map_err(|e| PipelineError::DataError(e.to_string()))?;
        }
    }
    Ok(result)
}

/// Convert the named columns of a frame to a row-major feature matrix.
///
/// Every column must be numeric and free of missing values.
pub fn columns_to_array2(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let data: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| column_to_vec(df, name))
        .collect::<Result<_>>()?;

    let n_rows = df.height();
    Ok(Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| data[j][i]))
}

/// Convert one column to a vector
pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    Ok(Array1::from_vec(column_to_vec(df, name)?))
}

fn column_to_vec(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;

    if !is_numeric_dtype(column.dtype()) {
        return Err(PipelineError::PreprocessingError(format!(
            "column '{}' is not numeric ({}); encode categorical columns first",
            name,
            column.dtype()
        )));
    }

    let casted = column.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    ca.into_iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => Ok(x),
            _ => Err(PipelineError::PreprocessingError(format!(
                "column '{}' contains missing values; impute before converting",
                name
            ))),
        })
        .collect()
}

/// Feature statistics used for dataset profiling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    pub dtype: String,
    pub kind: ColumnType,
    pub count: usize,
    pub null_count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub unique_count: Option<usize>,
    pub top: Option<String>,
}

impl FeatureStats {
    /// Create new feature statistics
    pub fn new(name: impl Into<String>, dtype: &DataType) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.to_string(),
            kind: ColumnType::of(dtype),
            count: 0,
            null_count: 0,
            mean: None,
            std: None,
            min: None,
            max: None,
            median: None,
            unique_count: None,
            top: None,
        }
    }

    /// Compute statistics from a numeric series
    pub fn from_numeric_series(series: &Series) -> Result<Self> {
        let mut stats = Self::new(series.name().as_str(), series.dtype());
        stats.count = series.len();
        stats.null_count = series.null_count();

        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        stats.mean = ca.mean();
        stats.std = ca.std(1);
        stats.min = ca.min();
        stats.max = ca.max();
        stats.median = ca.median();

        Ok(stats)
    }

    /// Compute statistics from a categorical series
    pub fn from_categorical_series(series: &Series) -> Result<Self> {
        let mut stats = Self::new(series.name().as_str(), series.dtype());
        stats.count = series.len();
        stats.null_count = series.null_count();

        let casted = series.cast(&DataType::String)?;
        let ca = casted.str()?;
        let values: Vec<&str> = ca.into_iter().flatten().collect();
        let mut distinct = values.clone();
        distinct.sort_unstable();
        distinct.dedup();
        stats.unique_count = Some(distinct.len());
        stats.top = imputer::mode_of(values).map(str::to_string);

        Ok(stats)
    }

    /// Compute statistics for any series, dispatching on its dtype
    pub fn from_series(series: &Series) -> Result<Self> {
        match ColumnType::of(series.dtype()) {
            ColumnType::Numeric => Self::from_numeric_series(series),
            ColumnType::Categorical => Self::from_categorical_series(series),
        }
    }
}

/// Shape, dtypes and missing-value summary of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<FeatureStats>,
}

impl DatasetProfile {
    /// Profile every column of a frame
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| FeatureStats::from_series(c.as_materialized_series()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        })
    }

    /// Total number of missing cells
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }
}

impl fmt::Display for DatasetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shape: ({}, {})", self.n_rows, self.n_cols)?;
        writeln!(f, "{:<24} {:<10} {:>8} {:>12} {:>12}", "column", "dtype", "missing", "mean/top", "std/unique")?;
        for c in &self.columns {
            let (center, spread) = match c.kind {
                ColumnType::Numeric => (
                    c.mean.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into()),
                    c.std.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into()),
                ),
                ColumnType::Categorical => (
                    c.top.clone().unwrap_or_else(|| "-".into()),
                    c.unique_count.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                ),
            };
            writeln!(f, "{:<24} {:<10} {:>8} {:>12} {:>12}", c.name, c.dtype, c.null_count, center, spread)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_of() {
        assert_eq!(ColumnType::of(&DataType::Int64), ColumnType::Numeric);
        assert_eq!(ColumnType::of(&DataType::Boolean), ColumnType::Numeric);
        assert_eq!(ColumnType::of(&DataType::String), ColumnType::Categorical);
    }

    #[test]
    fn test_columns_to_array2() {
        let df = df!(
            "a" => &[1i64, 2, 3],
            "b" => &[0.5, 1.5, 2.5]
        )
        .unwrap();

        let x = columns_to_array2(&df, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(x.shape(), &[3, 2]);
        assert_eq!(x[[2, 0]], 2.5);
        assert_eq!(x[[2, 1]], 3.0);
    }

    #[test]
    fn test_columns_to_array2_rejects_nulls_and_strings() {
        let df = df!(
            "a" => &[Some(1.0), None],
            "s" => &["x", "y"]
        )
        .unwrap();

        assert!(columns_to_array2(&df, &["a".to_string()]).is_err());
        assert!(matches!(
            columns_to_array2(&df, &["s".to_string()]),
            Err(PipelineError::PreprocessingError(_))
        ));
        assert!(matches!(
            columns_to_array2(&df, &["zzz".to_string()]),
            Err(PipelineError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_profile() {
        let df = df!(
            "area" => &[Some(50.0), None, Some(70.0)],
            "city" => &[Some("Pune"), Some("Pune"), None]
        )
        .unwrap();

        let profile = DatasetProfile::from_frame(&df).unwrap();
        assert_eq!(profile.n_rows, 3);
        assert_eq!(profile.total_missing(), 2);
        assert_eq!(profile.columns[0].mean, Some(60.0));
        assert_eq!(profile.columns[1].top.as_deref(), Some("Pune"));
        assert!(profile.to_string().contains("Shape: (3, 2)"));
    }
}
