//! Trained model dispatch and model artifacts

use super::config::{ModelKind, TaskType};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::grid::{default_params, HyperParams, ParamValue};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::models::{Model, TrainingMetrics};
use super::random_forest::RandomForest;
use super::svm::{Gamma, SVMClassifier, SVMConfig, SVMRegressor};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

const ARTIFACT_VERSION: u32 = 1;

/// Enum to hold trained model variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainedModel {
    LinearRegression(LinearRegression),
    RandomForestRegressor(RandomForest),
    GradientBoostingRegressor(GradientBoostingRegressor),
    SVMRegressor(SVMRegressor),
    LogisticRegression(LogisticRegression),
    RandomForestClassifier(RandomForest),
    SVMClassifier(SVMClassifier),
}

fn gamma_param(params: &HyperParams) -> Result<Gamma> {
    match params.get("gamma") {
        None => Ok(Gamma::Scale),
        Some(ParamValue::Text(s)) if s == "scale" => Ok(Gamma::Scale),
        Some(ParamValue::Float(g)) => Ok(Gamma::Value(*g)),
        Some(other) => Err(PipelineError::InvalidParameter {
            name: "gamma".to_string(),
            value: other.to_string(),
            reason: "expected \"scale\" or a number".to_string(),
        }),
    }
}

impl TrainedModel {
    /// Unfitted model of `kind`, `params` layered over the defaults
    pub fn build(kind: ModelKind, params: &HyperParams, random_state: u64) -> Result<Self> {
        let p = default_params(kind).merged(params);

        let model = match kind {
            ModelKind::LinearRegression => {
                TrainedModel::LinearRegression(LinearRegression::new().with_alpha(p.f64_or("alpha", 0.0)?))
            }
            ModelKind::RandomForestRegressor | ModelKind::RandomForestClassifier => {
                let n_estimators = p.usize_or("n_estimators", 100)?;
                let forest = if kind == ModelKind::RandomForestRegressor {
                    RandomForest::new_regressor(n_estimators)
                } else {
                    RandomForest::new_classifier(n_estimators)
                }
                .with_max_depth(p.optional_usize("max_depth")?)
                .with_min_samples_split(p.usize_or("min_samples_split", 2)?)
                .with_random_state(random_state);

                if kind == ModelKind::RandomForestRegressor {
                    TrainedModel::RandomForestRegressor(forest)
                } else {
                    TrainedModel::RandomForestClassifier(forest)
                }
            }
            ModelKind::GradientBoosting => {
                TrainedModel::GradientBoostingRegressor(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: p.usize_or("n_estimators", 100)?,
                    learning_rate: p.f64_or("learning_rate", 0.1)?,
                    max_depth: p.usize_or("max_depth", 3)?,
                    random_state,
                    ..Default::default()
                }))
            }
            ModelKind::Svr => TrainedModel::SVMRegressor(SVMRegressor::new(SVMConfig {
                c: p.f64_or("C", 1.0)?,
                epsilon: p.f64_or("epsilon", 0.1)?,
                gamma: gamma_param(&p)?,
                random_state,
                ..Default::default()
            })),
            ModelKind::LogisticRegression => TrainedModel::LogisticRegression(
                LogisticRegression::new()
                    .with_alpha(p.f64_or("alpha", 0.01)?)
                    .with_max_iter(p.usize_or("max_iter", 1000)?),
            ),
            ModelKind::Svc => TrainedModel::SVMClassifier(SVMClassifier::new(SVMConfig {
                c: p.f64_or("C", 1.0)?,
                gamma: gamma_param(&p)?,
                random_state,
                ..Default::default()
            })),
        };

        Ok(model)
    }

    /// Catalog entry this model was built from
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
            TrainedModel::RandomForestRegressor(_) => ModelKind::RandomForestRegressor,
            TrainedModel::GradientBoostingRegressor(_) => ModelKind::GradientBoosting,
            TrainedModel::SVMRegressor(_) => ModelKind::Svr,
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::RandomForestClassifier(_) => ModelKind::RandomForestClassifier,
            TrainedModel::SVMClassifier(_) => ModelKind::Svc,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::RandomForestRegressor(m) | TrainedModel::RandomForestClassifier(m) => m,
            TrainedModel::GradientBoostingRegressor(m) => m,
            TrainedModel::SVMRegressor(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::SVMClassifier(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::RandomForestRegressor(m) | TrainedModel::RandomForestClassifier(m) => m,
            TrainedModel::GradientBoostingRegressor(m) => m,
            TrainedModel::SVMRegressor(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::SVMClassifier(m) => m,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_model_mut().fit(x, y)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }

    /// Class probabilities, columns ordered like [`TrainedModel::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.kind().supports_proba() {
            return Err(PipelineError::UnsupportedOperation(format!(
                "{} does not produce class probabilities",
                self.kind()
            )));
        }
        self.as_model().predict_proba(x)
    }

    pub fn classes(&self) -> Option<&[f64]> {
        self.as_model().classes()
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.as_model().feature_importances()
    }

    pub fn is_fitted(&self) -> bool {
        self.as_model().is_fitted()
    }

    pub fn is_classifier(&self) -> bool {
        self.kind().task().is_classification()
    }
}

/// Everything needed to reuse a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    version: u32,
    pub kind: ModelKind,
    pub model: TrainedModel,
    pub params: HyperParams,
    pub metrics: Option<TrainingMetrics>,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_time_secs: f64,
}

impl ModelArtifact {
    pub fn new(model: TrainedModel, params: HyperParams, feature_names: Vec<String>) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            kind: model.kind(),
            model,
            params,
            metrics: None,
            feature_names,
            trained_at: Utc::now(),
            training_time_secs: 0.0,
        }
    }

    pub fn with_metrics(mut self, metrics: TrainingMetrics, training_time_secs: f64) -> Self {
        self.metrics = Some(metrics);
        self.training_time_secs = training_time_secs;
        self
    }

    pub fn task(&self) -> TaskType {
        self.kind.task()
    }

    /// Write the artifact with bincode
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        info!(path = %path.display(), model = %self.kind, "Saved model");
        Ok(())
    }

    /// Read an artifact written by [`ModelArtifact::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let artifact: Self = bincode::deserialize_from(reader)?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(PipelineError::SerializationError(format!(
                "unsupported model artifact version {} (expected {})",
                artifact.version, ARTIFACT_VERSION
            )));
        }
        Ok(artifact)
    }

    /// Text report summarizing the trained model
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("Model:      {}\n", self.kind));
        report.push_str(&format!("Task:       {}\n", self.task()));
        report.push_str(&format!("Params:     {}\n", self.params));
        report.push_str(&format!("Trained at: {}\n", self.trained_at.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("Time:       {:.3}s\n", self.training_time_secs));

        if let Some(metrics) = &self.metrics {
            report.push_str("\nMetrics\n");
            for (name, value) in metrics.values() {
                report.push_str(&format!("  {:<16} {:.4}\n", name, value));
            }
        }

        if let Some(importances) = self.model.feature_importances() {
            let mut pairs: Vec<(&str, f64)> = self
                .feature_names
                .iter()
                .map(String::as_str)
                .zip(importances.iter().copied())
                .collect();
            pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
            report.push_str("\nFeature importance\n");
            for (name, imp) in pairs {
                report.push_str(&format!("  {:<20} {:.4}\n", name, imp));
            }
        }

        report.push_str("\nFeatures\n");
        for name in &self.feature_names {
            report.push_str(&format!("  {}\n", name));
        }
        report
    }
}
