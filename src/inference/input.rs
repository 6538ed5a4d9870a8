//! Prediction inputs and their normalization into training-layout frames

use crate::error::{PipelineError, Result};
use crate::preprocessing::PreprocessingState;
use polars::prelude::*;
use serde_json::{Map, Value};

/// A JSON object mapping feature name to value
pub type Record = Map<String, Value>;

/// Shapes accepted by the predictor
#[derive(Debug, Clone)]
pub enum PredictionInput {
    /// One record keyed by feature name
    Single(Record),
    /// Several records keyed by feature name
    Batch(Vec<Record>),
    /// One record as positional values in training feature order
    Row(Vec<Value>),
    /// Rows already in a frame
    Table(DataFrame),
}

impl PredictionInput {
    /// Map a JSON payload: an object is a single record, an array of
    /// objects a batch and an array of scalars a positional row.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(record) => Ok(PredictionInput::Single(record)),
            Value::Array(items) if items.is_empty() => {
                Err(PipelineError::InvalidInput("empty prediction input".to_string()))
            }
            Value::Array(items) if items.iter().all(Value::is_object) => Ok(PredictionInput::Batch(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(record) => Some(record),
                        _ => None,
                    })
                    .collect(),
            )),
            Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => {
                Ok(PredictionInput::Row(items))
            }
            Value::Array(_) => Err(PipelineError::InvalidInput(
                "an input array must hold only records or only values".to_string(),
            )),
            other => Err(PipelineError::InvalidInput(format!(
                "unsupported prediction input: {}",
                other
            ))),
        }
    }

    /// Number of rows this input describes
    pub fn n_rows(&self) -> usize {
        match self {
            PredictionInput::Single(_) | PredictionInput::Row(_) => 1,
            PredictionInput::Batch(records) => records.len(),
            PredictionInput::Table(df) => df.height(),
        }
    }

    /// Frame holding exactly the training feature columns, in training
    /// order. Extra fields are dropped; absent fields become missing cells.
    pub fn to_frame(&self, state: &PreprocessingState) -> Result<DataFrame> {
        let features = &state.feature_columns;
        if features.is_empty() {
            return Err(PipelineError::PreprocessorNotLoaded);
        }

        match self {
            PredictionInput::Single(record) => records_to_frame(std::slice::from_ref(record), state),
            PredictionInput::Batch(records) => {
                if records.is_empty() {
                    return Err(PipelineError::InvalidInput("empty prediction batch".to_string()));
                }
                records_to_frame(records, state)
            }
            PredictionInput::Row(values) => {
                if values.len() != features.len() {
                    return Err(PipelineError::ShapeError {
                        expected: format!("{} values", features.len()),
                        actual: format!("{} values", values.len()),
                    });
                }
                let record: Record = features.iter().cloned().zip(values.iter().cloned()).collect();
                records_to_frame(std::slice::from_ref(&record), state)
            }
            PredictionInput::Table(df) => table_to_frame(df, state),
        }
    }
}

fn is_categorical(state: &PreprocessingState, column: &str) -> bool {
    state.label_encoders.get(column).is_some()
}

fn records_to_frame(records: &[Record], state: &PreprocessingState) -> Result<DataFrame> {
    let columns = state
        .feature_columns
        .iter()
        .map(|name| {
            let values = records.iter().map(|r| r.get(name).unwrap_or(&Value::Null));
            let series = if is_categorical(state, name) {
                let texts: Vec<Option<String>> = values.map(|v| json_to_text(name, v)).collect::<Result<_>>()?;
                Series::new(name.as_str().into(), texts)
            } else {
                let numbers: Vec<Option<f64>> = values.map(|v| json_to_number(name, v)).collect::<Result<_>>()?;
                Series::new(name.as_str().into(), numbers)
            };
            Ok(Column::from(series))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn table_to_frame(df: &DataFrame, state: &PreprocessingState) -> Result<DataFrame> {
    let columns = state
        .feature_columns
        .iter()
        .map(|name| match df.column(name) {
            Ok(column) => Ok(column.clone()),
            Err(_) => {
                let dtype = if is_categorical(state, name) {
                    DataType::String
                } else {
                    DataType::Float64
                };
                Ok(Column::full_null(name.as_str().into(), df.height(), &dtype))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn json_to_number(column: &str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            PipelineError::InvalidInput(format!("column '{}' expects a number, got '{}'", column, s))
        }),
        other => Err(PipelineError::InvalidInput(format!(
            "column '{}' expects a number, got {}",
            column, other
        ))),
    }
}

fn json_to_text(column: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(PipelineError::InvalidInput(format!(
            "column '{}' expects a category, got {}",
            column, other
        ))),
    }
}
