//! Model trait and training metrics

use crate::error::{PipelineError, Result};
use crate::evaluation::metrics::{accuracy_score, r2_score, root_mean_squared_error, ClassificationReport};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics recorded for one trained model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrainingMetrics {
    Regression {
        train_r2: f64,
        test_r2: f64,
        train_rmse: f64,
        test_rmse: f64,
    },
    /// Precision, recall and F1 are support-weighted over the test set
    Classification {
        train_accuracy: f64,
        test_accuracy: f64,
        precision: f64,
        recall: f64,
        f1_score: f64,
    },
}

impl TrainingMetrics {
    /// Compute regression metrics
    pub fn compute_regression(
        y_train: &Array1<f64>,
        train_pred: &Array1<f64>,
        y_test: &Array1<f64>,
        test_pred: &Array1<f64>,
    ) -> Self {
        TrainingMetrics::Regression {
            train_r2: r2_score(y_train, train_pred),
            test_r2: r2_score(y_test, test_pred),
            train_rmse: root_mean_squared_error(y_train, train_pred),
            test_rmse: root_mean_squared_error(y_test, test_pred),
        }
    }

    /// Compute classification metrics
    pub fn compute_classification(
        y_train: &Array1<f64>,
        train_pred: &Array1<f64>,
        y_test: &Array1<f64>,
        test_pred: &Array1<f64>,
    ) -> Self {
        let report = ClassificationReport::compute(y_test, test_pred);
        TrainingMetrics::Classification {
            train_accuracy: accuracy_score(y_train, train_pred),
            test_accuracy: report.accuracy,
            precision: report.weighted_avg.precision,
            recall: report.weighted_avg.recall,
            f1_score: report.weighted_avg.f1_score,
        }
    }

    /// Metric used to rank models: test R² or test accuracy
    pub fn primary(&self) -> f64 {
        match self {
            TrainingMetrics::Regression { test_r2, .. } => *test_r2,
            TrainingMetrics::Classification { test_accuracy, .. } => *test_accuracy,
        }
    }

    /// Named values, in display order
    pub fn values(&self) -> Vec<(&'static str, f64)> {
        match *self {
            TrainingMetrics::Regression { train_r2, test_r2, train_rmse, test_rmse } => vec![
                ("train_r2", train_r2),
                ("test_r2", test_r2),
                ("train_rmse", train_rmse),
                ("test_rmse", test_rmse),
            ],
            TrainingMetrics::Classification {
                train_accuracy,
                test_accuracy,
                precision,
                recall,
                f1_score,
            } => vec![
                ("train_accuracy", train_accuracy),
                ("test_accuracy", test_accuracy),
                ("precision", precision),
                ("recall", recall),
                ("f1_score", f1_score),
            ],
        }
    }
}

impl fmt::Display for TrainingMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values()
            .into_iter()
            .map(|(name, value)| format!("{}={:.4}", name, value))
            .collect();
        f.write_str(&parts.join(" "))
    }
}

/// Trait for ML models
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class probabilities, one column per entry of [`Model::classes`]
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array2<f64>> {
        Err(PipelineError::UnsupportedOperation(
            "model does not produce probabilities".to_string(),
        ))
    }

    /// Sorted class labels seen during fit (classifiers only)
    fn classes(&self) -> Option<&[f64]> {
        None
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    fn is_fitted(&self) -> bool;
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::TrainingError("empty training set".to_string()));
    }
    Ok(())
}

/// Sorted distinct labels
pub(crate) fn distinct_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let metrics = TrainingMetrics::compute_classification(&y_true, &y_true, &y_true, &y_pred);
        assert_eq!(metrics.primary(), 0.75);
        assert!(matches!(metrics, TrainingMetrics::Classification { train_accuracy, .. } if train_accuracy == 1.0));
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = TrainingMetrics::compute_regression(&y_true, &y_true, &y_true, &y_pred);
        assert!(metrics.primary() > 0.9);
        assert_eq!(metrics.values()[0], ("train_r2", 1.0));
        assert!(metrics.to_string().starts_with("train_r2=1.0000"));
    }

    #[test]
    fn test_distinct_classes() {
        assert_eq!(distinct_classes(&array![2.0, 0.0, 2.0, 1.0]), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_check_shapes() {
        assert!(check_shapes(&array![[1.0], [2.0]], &array![1.0]).is_err());
        assert!(check_shapes(&Array2::zeros((0, 2)), &Array1::zeros(0)).is_err());
    }
}
