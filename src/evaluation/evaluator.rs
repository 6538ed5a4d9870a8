//! Held-out evaluation of a fitted model

use super::diagnostics::{DiagnosticView, RESIDUAL_BINS};
use super::metrics::{
    confusion_matrix, mean_absolute_error, mean_absolute_percentage_error, mean_squared_error, r2_score,
    ClassificationReport,
};
use crate::error::{PipelineError, Result};
use crate::training::{TaskType, TrainedModel};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Metric name → value plus the raw predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub task: TaskType,
    pub metrics: BTreeMap<String, f64>,
    pub predictions: Vec<f64>,
    /// Per-class breakdown, classification only
    pub classification_report: Option<ClassificationReport>,
}

impl EvaluationReport {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.metrics {
            out.push_str(&format!("{:<12} {:.4}\n", name, value));
        }
        if let Some(report) = &self.classification_report {
            out.push('\n');
            out.push_str(&report.render());
        }
        out
    }
}

/// Scores a fitted model on held-out data. Predictions are computed once,
/// when the evaluator is built.
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    task: TaskType,
    y_true: Array1<f64>,
    y_pred: Array1<f64>,
    feature_importances: Option<Array1<f64>>,
    feature_names: Vec<String>,
    class_names: Option<Vec<String>>,
}

impl ModelEvaluator {
    pub fn new(model: &TrainedModel, x_test: &Array2<f64>, y_test: &Array1<f64>, task: TaskType) -> Result<Self> {
        if x_test.nrows() != y_test.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x_test.nrows()),
                actual: format!("{} labels", y_test.len()),
            });
        }
        let y_pred = model.predict(x_test)?;
        let feature_names = (0..x_test.ncols()).map(|i| format!("feature_{}", i)).collect();

        Ok(Self {
            task,
            y_true: y_test.clone(),
            y_pred,
            feature_importances: model.feature_importances(),
            feature_names,
            class_names: None,
        })
    }

    /// Names used in the feature-importance ranking
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        if names.len() == self.feature_names.len() {
            self.feature_names = names;
        } else {
            warn!(
                expected = self.feature_names.len(),
                actual = names.len(),
                "Ignoring feature names of the wrong length"
            );
        }
        self
    }

    /// Decoded names of the class codes `0..k`
    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = Some(names);
        self
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn predictions(&self) -> &Array1<f64> {
        &self.y_pred
    }

    fn class_name(&self, code: i64) -> String {
        usize::try_from(code)
            .ok()
            .and_then(|c| self.class_names.as_ref()?.get(c).cloned())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn report(&self) -> EvaluationReport {
        let mut metrics = BTreeMap::new();
        let mut classification_report = None;

        match self.task {
            TaskType::Regression => {
                let mse = mean_squared_error(&self.y_true, &self.y_pred);
                metrics.insert("MAE".to_string(), mean_absolute_error(&self.y_true, &self.y_pred));
                metrics.insert("MSE".to_string(), mse);
                metrics.insert("RMSE".to_string(), mse.sqrt());
                metrics.insert("R2".to_string(), r2_score(&self.y_true, &self.y_pred));
                match mean_absolute_percentage_error(&self.y_true, &self.y_pred) {
                    Some(mape) => {
                        metrics.insert("MAPE".to_string(), mape);
                    }
                    None => warn!("Every true value is zero; MAPE omitted"),
                }
            }
            TaskType::Classification => {
                let report = ClassificationReport::compute(&self.y_true, &self.y_pred)
                    .with_class_names(|code| Some(self.class_name(code)));
                metrics.insert("accuracy".to_string(), report.accuracy);
                metrics.insert("precision".to_string(), report.weighted_avg.precision);
                metrics.insert("recall".to_string(), report.weighted_avg.recall);
                metrics.insert("f1_score".to_string(), report.weighted_avg.f1_score);
                classification_report = Some(report);
            }
        }

        EvaluationReport {
            task: self.task,
            metrics,
            predictions: self.y_pred.to_vec(),
            classification_report,
        }
    }

    /// Actual-vs-predicted series for regression, confusion matrix for
    /// classification
    pub fn prediction_view(&self) -> DiagnosticView {
        match self.task {
            TaskType::Regression => DiagnosticView::ActualVsPredicted {
                points: self.y_true.iter().copied().zip(self.y_pred.iter().copied()).collect(),
            },
            TaskType::Classification => {
                let (labels, matrix) = confusion_matrix(&self.y_true, &self.y_pred);
                DiagnosticView::ConfusionMatrix {
                    labels: labels.iter().map(|&l| self.class_name(l)).collect(),
                    matrix: matrix.outer_iter().map(|row| row.to_vec()).collect(),
                }
            }
        }
    }

    /// Residual distribution; regression only
    pub fn residual_view(&self) -> Option<DiagnosticView> {
        if self.task != TaskType::Regression {
            info!("Residuals are only available for regression");
            return None;
        }
        let residuals: Vec<f64> = (&self.y_true - &self.y_pred).to_vec();
        Some(DiagnosticView::residual_histogram(
            self.y_pred.as_slice().unwrap_or(&[]),
            &residuals,
            RESIDUAL_BINS,
        ))
    }

    /// Importance ranking, when the model exposes importances
    pub fn feature_importance_view(&self) -> Option<DiagnosticView> {
        let Some(importances) = &self.feature_importances else {
            info!("Model does not expose feature importances");
            return None;
        };

        let mut ranking: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(DiagnosticView::FeatureImportance { ranking })
    }

    /// Every view that applies to this model and task
    pub fn diagnostics(&self) -> Vec<DiagnosticView> {
        let mut views = vec![self.prediction_view()];
        views.extend(self.residual_view());
        views.extend(self.feature_importance_view());
        views
    }
}
