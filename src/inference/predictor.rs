//! Predictor over a persisted model and preprocessing state

use super::input::{PredictionInput, Record};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{columns_to_array2, PreprocessingState};
use crate::training::ModelArtifact;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One prediction: a number, or a decoded class label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Value(f64),
    Label(String),
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Value(v) => write!(f, "{}", v),
            Prediction::Label(l) => f.write_str(l),
        }
    }
}

/// Summary exposed at the inference boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub feature_names: Vec<String>,
    pub is_classifier: bool,
}

/// Replays the training transforms on new rows and predicts with the
/// loaded model. Both artifacts must be present before predicting.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    model: Option<ModelArtifact>,
    state: Option<PreprocessingState>,
}

impl Predictor {
    /// Load whichever artifacts are given
    pub fn new(model_path: Option<&Path>, state_path: Option<&Path>) -> Result<Self> {
        let mut predictor = Self::default();
        if let Some(path) = model_path {
            predictor.load_model(path)?;
        }
        if let Some(path) = state_path {
            predictor.load_preprocessor(path)?;
        }
        Ok(predictor)
    }

    /// Wrap artifacts that are already in memory
    pub fn from_artifacts(model: ModelArtifact, state: PreprocessingState) -> Self {
        Self {
            model: Some(model),
            state: Some(state),
        }
    }

    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let artifact = ModelArtifact::load(path.as_ref())?;
        info!(path = %path.as_ref().display(), model = %artifact.kind, "Model loaded");
        self.model = Some(artifact);
        Ok(())
    }

    pub fn load_preprocessor(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let state = PreprocessingState::load(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Preprocessor loaded");
        self.state = Some(state);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some() && self.state.is_some()
    }

    fn model(&self) -> Result<&ModelArtifact> {
        self.model.as_ref().ok_or(PipelineError::ModelNotLoaded)
    }

    fn state(&self) -> Result<&PreprocessingState> {
        self.state.as_ref().ok_or(PipelineError::PreprocessorNotLoaded)
    }

    /// Normalize `input` to the training layout and apply
    /// impute → encode → scale
    pub fn preprocess_input(&self, input: &PredictionInput) -> Result<Array2<f64>> {
        let state = self.state()?;
        let frame = input.to_frame(state)?;
        let transformed = state.transform(&frame)?;
        let x = columns_to_array2(&transformed, &state.feature_columns)?;
        debug!(rows = x.nrows(), features = x.ncols(), "Preprocessed input");
        Ok(x)
    }

    fn class_name(&self, code: f64) -> String {
        let decoded = self
            .state
            .as_ref()
            .and_then(PreprocessingState::target_encoder)
            .and_then(|enc| enc.decode(code.round().max(0.0) as usize));
        match decoded {
            Some(name) => name.to_string(),
            None => format!("{}", code),
        }
    }

    fn to_prediction(&self, value: f64, is_classifier: bool) -> Prediction {
        let has_labels = self
            .state
            .as_ref()
            .and_then(PreprocessingState::target_encoder)
            .is_some();
        if is_classifier && has_labels {
            Prediction::Label(self.class_name(value))
        } else {
            Prediction::Value(value)
        }
    }

    /// Predictions for every row of `input`, in order
    pub fn predict(&self, input: &PredictionInput) -> Result<Vec<Prediction>> {
        let model = self.model()?;
        let x = self.preprocess_input(input)?;
        let raw = model.model.predict(&x)?;
        let is_classifier = model.model.is_classifier();
        Ok(raw.iter().map(|&v| self.to_prediction(v, is_classifier)).collect())
    }

    pub fn predict_single(&self, record: &Record) -> Result<Prediction> {
        self.predict(&PredictionInput::Single(record.clone()))?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::ComputationError("model returned no prediction".to_string()))
    }

    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<Prediction>> {
        self.predict(&PredictionInput::Batch(records.to_vec()))
    }

    /// Class label → probability for every row of `input`
    pub fn predict_proba(&self, input: &PredictionInput) -> Result<Vec<BTreeMap<String, f64>>> {
        let model = self.model()?;
        if !model.kind.supports_proba() {
            return Err(PipelineError::UnsupportedOperation(format!(
                "{} does not produce class probabilities",
                model.kind
            )));
        }

        let x = self.preprocess_input(input)?;
        let proba = model.model.predict_proba(&x)?;
        let classes = model
            .model
            .classes()
            .ok_or_else(|| PipelineError::ComputationError("classifier has no classes".to_string()))?;
        let names: Vec<String> = classes.iter().map(|&c| self.class_name(c)).collect();

        Ok(proba
            .outer_iter()
            .map(|row| names.iter().cloned().zip(row.iter().copied()).collect())
            .collect())
    }

    pub fn predict_with_probability(&self, record: &Record) -> Result<BTreeMap<String, f64>> {
        self.predict_proba(&PredictionInput::Single(record.clone()))?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::ComputationError("model returned no probabilities".to_string()))
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        let model = self.model()?;
        Ok(ModelInfo {
            model_type: model.kind.name().to_string(),
            feature_names: model.feature_names.clone(),
            is_classifier: model.model.is_classifier(),
        })
    }

    /// `{"prediction": ...}` for a JSON record
    pub fn predict_json(&self, payload: &Value) -> Result<Value> {
        let Value::Object(record) = payload else {
            return Err(PipelineError::InvalidInput("expected a JSON object".to_string()));
        };
        let prediction = self.predict_single(record)?;
        Ok(json!({ "prediction": prediction }))
    }

    /// `{"predictions": [...], "count": n}` for a JSON array of records,
    /// bare or wrapped as `{"inputs": [...]}`
    pub fn predict_batch_json(&self, payload: &Value) -> Result<Value> {
        let items = payload.get("inputs").unwrap_or(payload);
        let PredictionInput::Batch(records) = PredictionInput::from_json(items.clone())? else {
            return Err(PipelineError::InvalidInput("expected an array of JSON objects".to_string()));
        };
        let predictions = self.predict_batch(&records)?;
        Ok(json!({ "predictions": predictions, "count": predictions.len() }))
    }
}
