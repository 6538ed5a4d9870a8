//! Tabular Pipeline - prediction on tabular data
//!
//! This crate turns a table with a designated target column into a trained,
//! persisted model and serves predictions from it:
//! - Missing value imputation, label encoding and feature scaling
//! - A fixed catalog of regression and classification models
//! - Model selection and cross-validated grid search
//! - Metrics, per-class reports and diagnostic views
//! - A predictor that replays the training-time transforms on new rows
//!
//! # Modules
//!
//! - [`preprocessing`] - Loading, imputation, encoding, scaling, splitting
//! - [`training`] - Model catalog, training and selection
//! - [`evaluation`] - Metrics and diagnostics
//! - [`inference`] - Prediction over persisted artifacts
//! - [`pipeline`] - The end-to-end run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod evaluation;
pub mod inference;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration
    pub use crate::config::PipelineConfig;

    // Preprocessing
    pub use crate::preprocessing::{
        DataPreprocessor, ImputeStrategy, PreprocessingConfig, PreprocessingState, ScalerType, TrainTestSplit,
    };

    // Training
    pub use crate::training::{
        HyperParams, Model, ModelArtifact, ModelKind, ModelTrainer, TaskType, TrainedModel, TrainingConfig,
        TrainingMetrics,
    };

    // Evaluation
    pub use crate::evaluation::{ClassificationReport, DiagnosticView, EvaluationReport, ModelEvaluator};

    // Inference
    pub use crate::inference::{Prediction, PredictionInput, Predictor};

    // Pipeline
    pub use crate::pipeline::{Pipeline, PipelineRun};
}
