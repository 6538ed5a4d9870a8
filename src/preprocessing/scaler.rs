//! Feature scaling implementations

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

impl FromStr for ScalerType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(ScalerType::Standard),
            "minmax" | "min_max" => Ok(ScalerType::MinMax),
            other => Err(PipelineError::InvalidParameter {
                name: "scaler".to_string(),
                value: other.to_string(),
                reason: "expected standard or minmax".to_string(),
            }),
        }
    }
}

impl fmt::Display for ScalerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalerType::Standard => f.write_str("standard"),
            ScalerType::MinMax => f.write_str("minmax"),
        }
    }
}

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean or min
    pub center: f64,
    /// std or range, never zero
    pub scale: f64,
}

/// Feature scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: BTreeMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: BTreeMap::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fitted parameters of a column
    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params.get(column)
    }

    /// Fit the scaler to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.params.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series();

            let params = self.compute_params(series)?;
            self.params.insert(col_name.clone(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    ///
    /// Every fitted column must be present.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|(col_name, params)| {
                let column = df
                    .column(col_name)
                    .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?;
                Self::scale_series(column.as_materialized_series(), params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result
                .with_column(scaled)
                .map_err(|e| PipelineError::DataError(e.to_string()))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = ca.mean().unwrap_or(0.0);
                // population std, matching the usual z-score definition
                let std = ca.std(0).unwrap_or(1.0);
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                })
            }
            ScalerType::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(1.0);
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
        }
    }

    fn scale_series(series: &Series, params: &ScalerParams) -> Result<Series> {
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.center) / params.scale))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standard_scaler() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = Scaler::new(ScalerType::Standard);
        let out = scaler.fit_transform(&df, &cols(&["a"])).unwrap();

        let ca = out.column("a").unwrap().f64().unwrap();
        let mean = ca.mean().unwrap();
        let std = ca.std(0).unwrap();
        assert!(mean.abs() < 1e-10);
        assert!((std - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_minmax_scaler() {
        let df = df!("a" => &[1i64, 3, 5]).unwrap();

        let mut scaler = Scaler::new(ScalerType::MinMax);
        let out = scaler.fit_transform(&df, &cols(&["a"])).unwrap();

        let values: Vec<Option<f64>> = out.column("a").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0.0), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn test_constant_column() {
        let df = df!("a" => &[2.0, 2.0]).unwrap();
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &cols(&["a"])).unwrap();
        assert_eq!(scaler.params("a").unwrap().scale, 1.0);
    }

    #[test]
    fn test_missing_column_on_transform() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &cols(&["a"])).unwrap();

        let other = df!("b" => &[1.0]).unwrap();
        assert!(matches!(scaler.transform(&other), Err(PipelineError::FeatureNotFound(_))));
    }
}
