//! Regression and classification metrics
//!
//! Class labels are carried as `f64` codes and compared after rounding.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Mean absolute error
pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len().max(1) as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n
}

/// Mean squared error
pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len().max(1) as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}

/// Root mean squared error
pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    if n == 0.0 {
        return f64::NAN;
    }
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Mean absolute percentage error, in percent.
///
/// Rows whose true value is zero (`|y| < f64::EPSILON`) are skipped.
/// Returns `None` when every row is skipped.
pub fn mean_absolute_percentage_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Option<f64> {
    let ratios: Vec<f64> = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, _)| t.abs() >= f64::EPSILON)
        .map(|(t, p)| ((t - p) / t).abs())
        .collect();

    let skipped = y_true.len() - ratios.len();
    if skipped > 0 {
        warn!(skipped, "MAPE skips rows with a zero true value");
    }
    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().sum::<f64>() / ratios.len() as f64 * 100.0)
}

/// Fraction of exact label matches
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| label(**t) == label(**p))
        .count();
    correct as f64 / y_true.len() as f64
}

fn label(v: f64) -> i64 {
    v.round() as i64
}

/// Sorted union of the labels seen in truth and predictions
pub fn class_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Vec<i64> {
    let labels: BTreeSet<i64> = y_true.iter().chain(y_pred.iter()).map(|v| label(*v)).collect();
    labels.into_iter().collect()
}

/// Confusion matrix; rows are true labels, columns predicted labels,
/// both in the order of the returned label list.
pub fn confusion_matrix(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (Vec<i64>, Array2<usize>) {
    let labels = class_labels(y_true, y_pred);
    let mut matrix = Array2::zeros((labels.len(), labels.len()));

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        let i = labels.binary_search(&label(*t));
        let j = labels.binary_search(&label(*p));
        if let (Ok(i), Ok(j)) = (i, j) {
            matrix[[i, j]] += 1;
        }
    }

    (labels, matrix)
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Encoded class label
    pub label: i64,
    /// Human-readable class name
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Per-class report with macro and support-weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub total_support: usize,
}

impl ClassificationReport {
    /// Build the report. Undefined ratios (no predictions or no samples of a
    /// class) count as 0.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let (labels, matrix) = confusion_matrix(y_true, y_pred);
        let k = labels.len();

        let classes: Vec<ClassMetrics> = (0..k)
            .map(|c| {
                let tp = matrix[[c, c]] as f64;
                let predicted: usize = matrix.column(c).sum();
                let support: usize = matrix.row(c).sum();

                let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: labels[c],
                    name: labels[c].to_string(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let total_support: usize = classes.iter().map(|c| c.support).sum();
        let macro_avg = average(&classes, |_| 1.0);
        let weighted_avg = average(&classes, |c| c.support as f64);

        Self {
            classes,
            accuracy: accuracy_score(y_true, y_pred),
            macro_avg,
            weighted_avg,
            total_support,
        }
    }

    /// Replace numeric class names using a code → name lookup
    pub fn with_class_names<F>(mut self, name_of: F) -> Self
    where
        F: Fn(i64) -> Option<String>,
    {
        for class in &mut self.classes {
            if let Some(name) = name_of(class.label) {
                class.name = name;
            }
        }
        self
    }

    /// Text table in the familiar precision/recall/f1/support layout
    pub fn render(&self) -> String {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        let mut out = format!(
            "{:>width$} {:>10} {:>10} {:>10} {:>10}\n\n",
            "", "precision", "recall", "f1-score", "support",
            width = width
        );
        for c in &self.classes {
            out.push_str(&format!(
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                c.name, c.precision, c.recall, c.f1_score, c.support,
                width = width
            ));
        }
        out.push('\n');
        out.push_str(&format!(
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}\n",
            "accuracy", "", "", self.accuracy, self.total_support,
            width = width
        ));
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            out.push_str(&format!(
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                name, avg.precision, avg.recall, avg.f1_score, self.total_support,
                width = width
            ));
        }
        out
    }
}

fn average<W: Fn(&ClassMetrics) -> f64>(classes: &[ClassMetrics], weight: W) -> AveragedMetrics {
    let total: f64 = classes.iter().map(&weight).sum();
    if total == 0.0 {
        return AveragedMetrics { precision: 0.0, recall: 0.0, f1_score: 0.0 };
    }
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        classes.iter().map(|c| weight(c) * f(c)).sum::<f64>() / total
    };
    AveragedMetrics {
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1_score: weighted(|c| c.f1_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        assert!((mean_absolute_error(&y_true, &y_pred) - 0.06).abs() < 1e-12);
        assert!((mean_squared_error(&y_true, &y_pred) - 0.006).abs() < 1e-12);
        assert!(r2_score(&y_true, &y_pred) > 0.99);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![2.0, 2.0];
        assert_eq!(r2_score(&y, &array![2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&y, &array![1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mape_skips_zero_rows() {
        let y_true = array![0.0, 2.0, 4.0];
        let y_pred = array![5.0, 1.0, 5.0];
        let mape = mean_absolute_percentage_error(&y_true, &y_pred).unwrap();
        assert!((mape - 37.5).abs() < 1e-10);

        assert_eq!(mean_absolute_percentage_error(&array![0.0, 0.0], &array![1.0, 1.0]), None);
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![0.0, 1.0, 1.0, 2.0];
        let y_pred = array![0.0, 1.0, 2.0, 2.0];
        let (labels, m) = confusion_matrix(&y_true, &y_pred);
        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(m[[1, 1]], 1);
        assert_eq!(m[[1, 2]], 1);
        assert_eq!(m.sum(), 4);
    }

    #[test]
    fn test_classification_report() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let report = ClassificationReport::compute(&y_true, &y_pred);
        assert_eq!(report.classes.len(), 2);
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.classes[1].precision, 0.75);
        assert_eq!(report.classes[1].recall, 0.75);
        assert_eq!(report.total_support, 8);
        assert!((report.weighted_avg.f1_score - 0.75).abs() < 1e-12);

        let named = report.with_class_names(|c| Some(if c == 1 { "yes".into() } else { "no".into() }));
        assert!(named.render().contains("yes"));
    }

    #[test]
    fn test_zero_division_is_zero() {
        let y_true = array![0.0, 0.0];
        let y_pred = array![1.0, 1.0];
        let report = ClassificationReport::compute(&y_true, &y_pred);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[0].recall, 0.0);
    }
}
