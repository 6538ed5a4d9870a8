//! Data preprocessing pipeline

use crate::error::{PipelineError, Result};
use crate::utils::DataLoader;
use super::{
    cast_numeric_to_f64, column_to_array1, columns_to_array2,
    config::PreprocessingConfig,
    encoder::{CategoricalEncoder, LabelEncoder},
    imputer::{ImputeStrategy, Imputer},
    is_numeric_dtype,
    scaler::{Scaler, ScalerType},
    DatasetProfile,
};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Everything fitted during preprocessing.
///
/// Saved and loaded as a single JSON document so the encoders, the scaler
/// and the imputation values always come from the same fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingState {
    /// Fill values per column
    pub imputer: Option<Imputer>,
    /// Label encoders keyed by column name
    pub label_encoders: CategoricalEncoder,
    /// Scaler fitted on the feature columns
    pub scaler: Option<Scaler>,
    /// Feature columns in training order
    pub feature_columns: Vec<String>,
    /// Target column excluded from scaling
    pub target_column: Option<String>,
}

impl PreprocessingState {
    /// Save the state to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), "Preprocessing state saved");
        Ok(())
    }

    /// Load a state from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let state: Self = serde_json::from_str(&json)?;
        Ok(state)
    }

    /// Encoder of the target column, present when the target was categorical
    pub fn target_encoder(&self) -> Option<&LabelEncoder> {
        self.target_column
            .as_deref()
            .and_then(|t| self.label_encoders.get(t))
    }

    /// Whether the feature layout has been recorded
    pub fn is_fitted(&self) -> bool {
        !self.feature_columns.is_empty()
    }

    /// Replay the fitted transforms (impute → encode → scale) on new rows.
    ///
    /// The output holds the feature columns in training order, followed by
    /// the encoded target when `df` carries it.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted() {
            return Err(PipelineError::PreprocessorNotLoaded);
        }

        let mut keep: Vec<String> = self.feature_columns.clone();
        if let Some(target) = &self.target_column {
            if df.column(target).is_ok() {
                keep.push(target.clone());
            }
        }
        for name in &keep {
            if df.column(name).is_err() {
                return Err(PipelineError::FeatureNotFound(name.clone()));
            }
        }

        let mut result = cast_numeric_to_f64(&df.select(keep.iter().map(String::as_str))?)?;

        if let Some(imputer) = &self.imputer {
            result = imputer.transform(&result)?;
        }
        result = self.label_encoders.transform(&result)?;
        if let Some(scaler) = &self.scaler {
            result = scaler.transform(&result)?;
        }

        cast_numeric_to_f64(&result)
    }
}

/// Train/test partition of a preprocessed frame
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Feature names, one per matrix column
    pub feature_names: Vec<String>,
    /// Source row of each training sample
    pub train_indices: Vec<usize>,
    /// Source row of each test sample
    pub test_indices: Vec<usize>,
}

/// Main data preprocessing pipeline
#[derive(Debug, Clone)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    state: PreprocessingState,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    /// Create a new preprocessor with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            config,
            state: PreprocessingState::default(),
        }
    }

    /// Rebuild a preprocessor around a previously fitted state
    pub fn from_state(config: PreprocessingConfig, state: PreprocessingState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Fitted state
    pub fn state(&self) -> &PreprocessingState {
        &self.state
    }

    pub fn into_state(self) -> PreprocessingState {
        self.state
    }

    /// Load a delimited or spreadsheet file
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        DataLoader::new().load_auto(path)
    }

    /// Shape, dtypes and missing-value summary
    pub fn profile(&self, df: &DataFrame) -> Result<DatasetProfile> {
        DatasetProfile::from_frame(df)
    }

    /// Fill missing cells; numeric columns use `strategy`, the rest their mode.
    pub fn impute_missing(&mut self, df: &DataFrame, strategy: ImputeStrategy) -> Result<DataFrame> {
        let missing_before: usize = df.get_columns().iter().map(|c| c.null_count()).sum();

        let mut imputer = Imputer::new(strategy);
        let result = imputer.fit_transform(df)?;
        self.state.imputer = Some(imputer);

        info!(%strategy, missing_before, "Imputed missing values");
        Ok(result)
    }

    /// Label-encode every non-numeric column, target included
    pub fn encode_categorical(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let mut encoder = CategoricalEncoder::new();
        let result = encoder.fit_transform(df)?;

        info!(columns = ?encoder.columns().collect::<Vec<_>>(), "Encoded categorical columns");
        self.state.label_encoders = encoder;
        Ok(result)
    }

    /// Scale every column except `target`, which is reattached unchanged
    pub fn scale(&mut self, df: &DataFrame, target: &str, scaler_type: ScalerType) -> Result<DataFrame> {
        if df.column(target).is_err() {
            return Err(PipelineError::MissingTarget(target.to_string()));
        }

        let features: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|name| name.to_string())
            .collect();

        for name in &features {
            let column = df.column(name)?;
            if !is_numeric_dtype(column.dtype()) {
                return Err(PipelineError::PreprocessingError(format!(
                    "column '{}' is not numeric; encode categorical columns before scaling",
                    name
                )));
            }
        }

        let mut scaler = Scaler::new(scaler_type);
        let result = cast_numeric_to_f64(&scaler.fit_transform(df, &features)?)?;

        info!(%scaler_type, n_features = features.len(), target, "Scaled features");
        self.state.scaler = Some(scaler);
        self.state.feature_columns = features;
        self.state.target_column = Some(target.to_string());
        Ok(result)
    }

    /// Run impute → encode → scale with the configured strategies
    pub fn fit_transform(&mut self, df: &DataFrame, target: &str) -> Result<DataFrame> {
        if df.column(target).is_err() {
            return Err(PipelineError::MissingTarget(target.to_string()));
        }
        let imputed = self.impute_missing(df, self.config.impute_strategy)?;
        let encoded = self.encode_categorical(&imputed)?;
        self.scale(&encoded, target, self.config.scaler_type)
    }

    /// Replay the fitted state on new rows
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.state.transform(df)
    }

    /// Seeded shuffle split; `ceil(n * test_fraction)` rows go to the test side.
    pub fn split(
        &self,
        df: &DataFrame,
        target: &str,
        test_fraction: f64,
        seed: u64,
    ) -> Result<TrainTestSplit> {
        if df.column(target).is_err() {
            return Err(PipelineError::MissingTarget(target.to_string()));
        }
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "test_fraction".to_string(),
                value: test_fraction.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }

        let n_samples = df.height();
        let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n_samples {
            return Err(PipelineError::ValidationError(format!(
                "cannot split {} rows with test fraction {}",
                n_samples, test_fraction
            )));
        }

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|name| name.to_string())
            .collect();

        let x = columns_to_array2(df, &feature_names)?;
        let y = column_to_array1(df, target)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let test_indices = indices[..n_test].to_vec();
        let train_indices = indices[n_test..].to_vec();

        debug!(train = train_indices.len(), test = test_indices.len(), seed, "Split dataset");

        Ok(TrainTestSplit {
            x_train: x.select(ndarray::Axis(0), &train_indices),
            x_test: x.select(ndarray::Axis(0), &test_indices),
            y_train: y.select(ndarray::Axis(0), &train_indices),
            y_test: y.select(ndarray::Axis(0), &test_indices),
            feature_names,
            train_indices,
            test_indices,
        })
    }

    /// Persist the fitted state
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<()> {
        self.state.save(path)
    }

    /// Load a preprocessor from a persisted state
    pub fn load_state(path: impl AsRef<Path>) -> Result<Self> {
        let state = PreprocessingState::load(path)?;
        Ok(Self::from_state(PreprocessingConfig::default(), state))
    }
}
