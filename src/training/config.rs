//! Training configuration and the model catalog

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of ML task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Regression,
    Classification,
}

impl TaskType {
    /// Name of the metric used to rank candidate models
    pub fn primary_metric(&self) -> &'static str {
        match self {
            TaskType::Regression => "test_r2",
            TaskType::Classification => "test_accuracy",
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, TaskType::Classification)
    }
}

impl FromStr for TaskType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "regression" => Ok(TaskType::Regression),
            "classification" => Ok(TaskType::Classification),
            other => Err(PipelineError::InvalidParameter {
                name: "task".to_string(),
                value: other.to_string(),
                reason: "expected regression or classification".to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Regression => f.write_str("regression"),
            TaskType::Classification => f.write_str("classification"),
        }
    }
}

/// Closed catalog of trainable model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    RandomForestRegressor,
    GradientBoosting,
    Svr,
    LogisticRegression,
    RandomForestClassifier,
    Svc,
}

const REGRESSION_MODELS: [ModelKind; 4] = [
    ModelKind::LinearRegression,
    ModelKind::RandomForestRegressor,
    ModelKind::GradientBoosting,
    ModelKind::Svr,
];

const CLASSIFICATION_MODELS: [ModelKind; 3] = [
    ModelKind::LogisticRegression,
    ModelKind::RandomForestClassifier,
    ModelKind::Svc,
];

impl ModelKind {
    /// Catalog for a task, in training order
    pub fn catalog(task: TaskType) -> &'static [ModelKind] {
        match task {
            TaskType::Regression => &REGRESSION_MODELS,
            TaskType::Classification => &CLASSIFICATION_MODELS,
        }
    }

    /// Display name, unique within a task's catalog
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::RandomForestRegressor | ModelKind::RandomForestClassifier => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::Svr => "SVR",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::Svc => "SVC",
        }
    }

    /// Task this model belongs to
    pub fn task(&self) -> TaskType {
        match self {
            ModelKind::LinearRegression
            | ModelKind::RandomForestRegressor
            | ModelKind::GradientBoosting
            | ModelKind::Svr => TaskType::Regression,
            ModelKind::LogisticRegression
            | ModelKind::RandomForestClassifier
            | ModelKind::Svc => TaskType::Classification,
        }
    }

    /// Look up a catalog entry by name.
    ///
    /// Matching ignores case, spaces, dashes and underscores, so
    /// "random_forest" and "Random Forest" are the same entry.
    pub fn from_name(task: TaskType, name: &str) -> Result<Self> {
        let wanted = normalize(name);
        Self::catalog(task)
            .iter()
            .copied()
            .find(|kind| normalize(kind.name()) == wanted)
            .ok_or_else(|| PipelineError::UnknownModel(format!("'{}' for {}", name, task)))
    }

    /// Whether the fitted model can produce class probabilities
    pub fn supports_proba(&self) -> bool {
        matches!(self, ModelKind::LogisticRegression | ModelKind::RandomForestClassifier)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for model training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Type of ML task
    pub task: TaskType,

    /// Number of cross-validation folds used by grid search
    pub cv_folds: usize,

    /// Shuffle rows (seeded by `random_state`) before cutting CV folds
    pub cv_shuffle: bool,

    /// Random seed for reproducibility
    pub random_state: u64,

    /// Whether to grid-search the selected model after `train_all`
    pub tune: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            task: TaskType::Regression,
            cv_folds: 5,
            cv_shuffle: false,
            random_state: 42,
            tune: false,
        }
    }
}

impl TrainingConfig {
    /// Create a new training configuration
    pub fn new(task: TaskType) -> Self {
        Self {
            task,
            ..Default::default()
        }
    }

    /// Set number of CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Shuffle before cutting CV folds
    pub fn with_cv_shuffle(mut self, shuffle: bool) -> Self {
        self.cv_shuffle = shuffle;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Enable hyperparameter tuning
    pub fn with_tuning(mut self, tune: bool) -> Self {
        self.tune = tune;
        self
    }
}
