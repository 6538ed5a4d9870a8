//! Missing value imputation strategies

use crate::error::{PipelineError, Result};
use super::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Statistic used to fill missing numeric values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputeStrategy {
    /// Replace with the column mean
    Mean,
    /// Replace with the column median
    Median,
    /// Replace with the most frequent value
    Mode,
}

impl FromStr for ImputeStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(ImputeStrategy::Mean),
            "median" => Ok(ImputeStrategy::Median),
            "mode" | "most_frequent" => Ok(ImputeStrategy::Mode),
            other => Err(PipelineError::InvalidParameter {
                name: "impute_strategy".to_string(),
                value: other.to_string(),
                reason: "expected mean, median or mode".to_string(),
            }),
        }
    }
}

impl fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImputeStrategy::Mean => "mean",
            ImputeStrategy::Median => "median",
            ImputeStrategy::Mode => "mode",
        };
        f.write_str(s)
    }
}

/// Value written into missing cells of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Numeric(f64),
    Text(String),
}

/// Imputer for handling missing values.
///
/// Numeric columns use the configured statistic, every other column uses
/// its mode. `NaN` counts as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: BTreeMap<String, FillValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Strategy used for numeric columns
    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Fitted fill value for a column
    pub fn fill_value(&self, column: &str) -> Option<&FillValue> {
        self.fill_values.get(column)
    }

    /// Fit the imputer on every column of the frame
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.fill_values.clear();

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let fill_value = self.compute_fill_value(series)?;
            self.fill_values.insert(series.name().to_string(), fill_value);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data by imputing missing values.
    ///
    /// Columns the imputer was not fitted on are left untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();

        for (col_name, fill_value) in &self.fill_values {
            if let Ok(col) = df.column(col_name) {
                let filled = Self::fill_series(col.as_materialized_series(), fill_value)?;
                result
                    .with_column(filled)
                    .map_err(|e| PipelineError::DataError(e.to_string()))?;
            }
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    fn compute_fill_value(&self, series: &Series) -> Result<FillValue> {
        if is_numeric_dtype(series.dtype()) {
            let values = numeric_values(series)?;
            let fill = match self.strategy {
                ImputeStrategy::Mean => {
                    if values.is_empty() {
                        None
                    } else {
                        Some(values.iter().sum::<f64>() / values.len() as f64)
                    }
                }
                ImputeStrategy::Median => median_of(values),
                ImputeStrategy::Mode => mode_of(values),
            };
            Ok(FillValue::Numeric(fill.unwrap_or(0.0)))
        } else {
            let casted = series.cast(&DataType::String)?;
            let values: Vec<&str> = casted.str()?.into_iter().flatten().collect();
            Ok(FillValue::Text(mode_of(values).unwrap_or_default().to_string()))
        }
    }

    fn fill_series(series: &Series, fill_value: &FillValue) -> Result<Series> {
        match fill_value {
            FillValue::Numeric(v) => {
                let casted = series.cast(&DataType::Float64)?;
                if casted.null_count() > series.null_count() {
                    return Err(PipelineError::InvalidInput(format!(
                        "column '{}' expects numeric values",
                        series.name()
                    )));
                }
                let filled: Float64Chunked = casted
                    .f64()?
                    .into_iter()
                    .map(|opt| match opt {
                        Some(x) if !x.is_nan() => Some(x),
                        _ => Some(*v),
                    })
                    .collect();
                Ok(filled.with_name(series.name().clone()).into_series())
            }
            FillValue::Text(v) => {
                let casted = series.cast(&DataType::String)?;
                let filled: StringChunked = casted
                    .str()?
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(v.as_str())))
                    .collect();
                Ok(filled.with_name(series.name().clone()).into_series())
            }
        }
    }
}

fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    Ok(values)
}

fn median_of(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent value; ties resolve to the smallest value
pub(crate) fn mode_of<T: PartialOrd + Clone>(mut values: Vec<T>) -> Option<T> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best: Option<(T, usize)> = None;
    let mut i = 0;
    while i < values.len() {
        let mut j = i + 1;
        while j < values.len() && values[j] == values[i] {
            j += 1;
        }
        let run = j - i;
        if best.as_ref().map_or(true, |(_, count)| run > *count) {
            best = Some((values[i].clone(), run));
        }
        i = j;
    }

    best.map(|(value, _)| value)
}
