//! End-to-end pipeline configuration

use crate::error::{PipelineError, Result};
use crate::preprocessing::PreprocessingConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the default models directory
pub const MODELS_DIR_ENV: &str = "TABULAR_MODELS_DIR";

/// File name of the persisted model inside the models directory
pub const MODEL_FILE: &str = "best_model.bin";

/// File name of the persisted preprocessing state inside the models directory
pub const STATE_FILE: &str = "preprocessor.json";

fn default_models_dir() -> PathBuf {
    std::env::var_os(MODELS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("models"))
}

/// Configuration of a full preprocess → train → evaluate run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset file
    pub data_path: PathBuf,

    /// Column to predict
    pub target_column: String,

    pub preprocessing: PreprocessingConfig,

    pub training: TrainingConfig,

    /// Where the model and preprocessing state are written
    pub models_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::new(),
            target_column: String::new(),
            preprocessing: PreprocessingConfig::default(),
            training: TrainingConfig::default(),
            models_dir: default_models_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn new(data_path: impl Into<PathBuf>, target_column: impl Into<String>) -> Self {
        Self {
            data_path: data_path.into(),
            target_column: target_column.into(),
            ..Default::default()
        }
    }

    /// Read a JSON configuration file. Omitted fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| PipelineError::ConfigError(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(MODEL_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.models_dir.join(STATE_FILE)
    }

    /// Check the settings before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(PipelineError::ConfigError("data_path is required".to_string()));
        }
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError("target_column is required".to_string()));
        }
        let test_size = self.preprocessing.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "preprocessing.test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        if self.training.cv_folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "training.cv_folds must be at least 2, got {}",
                self.training.cv_folds
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TaskType;
    use tempfile::tempdir;

    #[test]
    fn test_from_file_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{
                "data_path": "data/houses.csv",
                "target_column": "price",
                "training": { "task": "classification", "tune": true },
                "models_dir": "out"
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.target_column, "price");
        assert_eq!(config.training.task, TaskType::Classification);
        assert!(config.training.tune);
        assert_eq!(config.training.cv_folds, 5);
        assert_eq!(config.preprocessing.test_size, 0.2);
        assert_eq!(config.model_path(), PathBuf::from("out").join(MODEL_FILE));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::default().validate().is_err());

        let mut config = PipelineConfig::new("data.csv", "y");
        assert!(config.validate().is_ok());

        config.preprocessing.test_size = 1.0;
        assert!(matches!(config.validate(), Err(PipelineError::ConfigError(_))));

        let config = PipelineConfig::new("data.csv", "y").with_training(TrainingConfig::default().with_cv_folds(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            PipelineConfig::from_file("/nonexistent/pipeline.json"),
            Err(PipelineError::ConfigError(_))
        ));
    }
}
