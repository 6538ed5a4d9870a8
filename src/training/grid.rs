//! Hyperparameter values and the fixed search grid of each model

use super::config::ModelKind;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// Unbounded / unset, e.g. `max_depth = None`
    Null,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::Null => f.write_str("None"),
        }
    }
}

/// Named hyperparameters, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperParams(BTreeMap<String, ParamValue>);

impl HyperParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Layer `other` on top of `self`
    pub fn merged(&self, other: &HyperParams) -> HyperParams {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    fn invalid(name: &str, value: &ParamValue, reason: &str) -> PipelineError {
        PipelineError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Positive integer parameter, `default` when absent
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v > 0 => Ok(*v as usize),
            Some(other) => Err(Self::invalid(name, other, "expected a positive integer")),
        }
    }

    /// Integer parameter where `Null` means unbounded
    pub fn optional_usize(&self, name: &str) -> Result<Option<usize>> {
        match self.get(name) {
            None | Some(ParamValue::Null) => Ok(None),
            Some(ParamValue::Int(v)) if *v > 0 => Ok(Some(*v as usize)),
            Some(other) => Err(Self::invalid(name, other, "expected a positive integer or None")),
        }
    }

    /// Numeric parameter, `default` when absent
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(Self::invalid(name, other, "expected a number")),
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl FromIterator<(String, ParamValue)> for HyperParams {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        HyperParams(iter.into_iter().collect())
    }
}

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

fn depths(values: &[i64]) -> Vec<ParamValue> {
    std::iter::once(ParamValue::Null).chain(ints(values)).collect()
}

/// Values searched for each parameter, keyed by name
fn axes(kind: ModelKind) -> Vec<(&'static str, Vec<ParamValue>)> {
    let mut axes = match kind {
        ModelKind::LinearRegression => vec![("alpha", floats(&[0.0, 0.1, 1.0, 10.0]))],
        ModelKind::RandomForestRegressor => vec![
            ("n_estimators", ints(&[50, 100, 200])),
            ("max_depth", depths(&[10, 20, 30])),
            ("min_samples_split", ints(&[2, 5, 10])),
        ],
        ModelKind::GradientBoosting => vec![
            ("n_estimators", ints(&[50, 100, 200])),
            ("learning_rate", floats(&[0.01, 0.1, 0.3])),
            ("max_depth", ints(&[3, 5, 7])),
        ],
        ModelKind::Svr => vec![
            ("C", floats(&[0.1, 1.0, 10.0])),
            ("epsilon", floats(&[0.01, 0.1, 0.5])),
        ],
        ModelKind::LogisticRegression => vec![
            ("alpha", floats(&[0.001, 0.01, 0.1])),
            ("max_iter", ints(&[500, 1000])),
        ],
        ModelKind::RandomForestClassifier => vec![
            ("n_estimators", ints(&[50, 100, 200])),
            ("max_depth", depths(&[10, 20])),
            ("min_samples_split", ints(&[2, 5, 10])),
        ],
        ModelKind::Svc => vec![
            ("C", floats(&[0.1, 1.0, 10.0])),
            ("gamma", floats(&[0.01, 0.1, 1.0])),
        ],
    };
    axes.sort_by_key(|(name, _)| *name);
    axes
}

/// Every grid point of a model, names sorted and the last name varying
/// fastest.
pub fn param_grid(kind: ModelKind) -> Vec<HyperParams> {
    let mut grid = vec![HyperParams::new()];
    for (name, values) in axes(kind) {
        grid = grid
            .into_iter()
            .flat_map(|point| {
                values
                    .iter()
                    .map(move |v| point.clone().with(name, v.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
    }
    grid
}

/// Hyperparameters used when a model is trained without tuning
pub fn default_params(kind: ModelKind) -> HyperParams {
    let params = HyperParams::new();
    match kind {
        ModelKind::LinearRegression => params.with("alpha", ParamValue::Float(0.0)),
        ModelKind::RandomForestRegressor | ModelKind::RandomForestClassifier => params
            .with("n_estimators", ParamValue::Int(100))
            .with("max_depth", ParamValue::Null)
            .with("min_samples_split", ParamValue::Int(2)),
        ModelKind::GradientBoosting => params
            .with("n_estimators", ParamValue::Int(100))
            .with("learning_rate", ParamValue::Float(0.1))
            .with("max_depth", ParamValue::Int(3)),
        ModelKind::Svr => params
            .with("C", ParamValue::Float(1.0))
            .with("epsilon", ParamValue::Float(0.1))
            .with("gamma", ParamValue::Text("scale".to_string())),
        ModelKind::LogisticRegression => params
            .with("alpha", ParamValue::Float(0.01))
            .with("max_iter", ParamValue::Int(1000)),
        ModelKind::Svc => params
            .with("C", ParamValue::Float(1.0))
            .with("gamma", ParamValue::Text("scale".to_string())),
    }
}
