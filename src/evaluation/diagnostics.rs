//! Diagnostic views of a fitted model's held-out predictions

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Number of residual histogram bins
pub const RESIDUAL_BINS: usize = 30;

const BAR_WIDTH: usize = 40;

/// Data behind a diagnostic chart, renderable as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticView {
    /// `(actual, predicted)` pairs
    ActualVsPredicted { points: Vec<(f64, f64)> },
    /// Rows are true labels, columns predicted labels
    ConfusionMatrix {
        labels: Vec<String>,
        matrix: Vec<Vec<usize>>,
    },
    /// Residual distribution plus `(predicted, residual)` pairs
    ResidualHistogram {
        bin_edges: Vec<f64>,
        counts: Vec<usize>,
        points: Vec<(f64, f64)>,
    },
    /// Features sorted by decreasing importance
    FeatureImportance { ranking: Vec<(String, f64)> },
}

impl DiagnosticView {
    pub fn title(&self) -> &'static str {
        match self {
            DiagnosticView::ActualVsPredicted { .. } => "Actual vs Predicted Values",
            DiagnosticView::ConfusionMatrix { .. } => "Confusion Matrix",
            DiagnosticView::ResidualHistogram { .. } => "Distribution of Residuals",
            DiagnosticView::FeatureImportance { .. } => "Feature Importances",
        }
    }

    /// Histogram of `residuals` over `bins` equal-width bins
    pub fn residual_histogram(predicted: &[f64], residuals: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (min, max) = residuals
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| (lo.min(r), hi.max(r)));
        let (min, max) = if residuals.is_empty() {
            (0.0, 0.0)
        } else {
            (min, max)
        };
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

        let bin_edges: Vec<f64> = (0..=bins).map(|i| min + i as f64 * width).collect();
        let mut counts = vec![0usize; bins];
        for &r in residuals {
            let idx = (((r - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        DiagnosticView::ResidualHistogram {
            bin_edges,
            counts,
            points: predicted.iter().copied().zip(residuals.iter().copied()).collect(),
        }
    }

    /// Plain-text rendering for terminals and logs
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.title());
        match self {
            DiagnosticView::ActualVsPredicted { points } => {
                let _ = writeln!(out, "{:>14} {:>14} {:>14}", "actual", "predicted", "error");
                for (actual, predicted) in points {
                    let _ = writeln!(out, "{:>14.4} {:>14.4} {:>14.4}", actual, predicted, predicted - actual);
                }
            }
            DiagnosticView::ConfusionMatrix { labels, matrix } => {
                let width = labels.iter().map(String::len).max().unwrap_or(1).max(6);
                let _ = write!(out, "{:>width$}", "", width = width);
                for label in labels {
                    let _ = write!(out, " {:>width$}", label, width = width);
                }
                out.push('\n');
                for (label, row) in labels.iter().zip(matrix) {
                    let _ = write!(out, "{:>width$}", label, width = width);
                    for count in row {
                        let _ = write!(out, " {:>width$}", count, width = width);
                    }
                    out.push('\n');
                }
            }
            DiagnosticView::ResidualHistogram { bin_edges, counts, .. } => {
                let peak = counts.iter().copied().max().unwrap_or(0).max(1);
                for (i, &count) in counts.iter().enumerate() {
                    let bar = "#".repeat(count * BAR_WIDTH / peak);
                    let _ = writeln!(
                        out,
                        "[{:>10.4}, {:>10.4}) {:>6} {}",
                        bin_edges[i],
                        bin_edges[i + 1],
                        count,
                        bar
                    );
                }
            }
            DiagnosticView::FeatureImportance { ranking } => {
                let width = ranking.iter().map(|(n, _)| n.len()).max().unwrap_or(1);
                for (name, importance) in ranking {
                    let bar = "#".repeat((importance.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize);
                    let _ = writeln!(out, "{:<width$} {:.4} {}", name, importance, bar, width = width);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts_every_residual() {
        let residuals = [-1.0, -0.5, 0.0, 0.0, 0.5, 1.0];
        let predicted = [1.0; 6];
        let view = DiagnosticView::residual_histogram(&predicted, &residuals, 4);

        let DiagnosticView::ResidualHistogram { bin_edges, counts, points } = &view else {
            panic!("wrong view");
        };
        assert_eq!(bin_edges.len(), 5);
        assert_eq!(counts.iter().sum::<usize>(), 6);
        // the maximum lands in the last bin
        assert_eq!(counts[3], 2);
        assert_eq!(points.len(), 6);
    }

    #[test]
    fn test_histogram_of_constant_residuals() {
        let view = DiagnosticView::residual_histogram(&[0.0, 0.0], &[0.5, 0.5], RESIDUAL_BINS);
        let DiagnosticView::ResidualHistogram { counts, .. } = view else {
            panic!("wrong view");
        };
        assert_eq!(counts[0], 2);
    }

    #[test]
    fn test_render_confusion_matrix() {
        let view = DiagnosticView::ConfusionMatrix {
            labels: vec!["no".into(), "yes".into()],
            matrix: vec![vec![3, 1], vec![0, 4]],
        };
        let text = view.render();
        assert!(text.starts_with("Confusion Matrix"));
        assert!(text.contains("yes"));
        assert_eq!(text.lines().count(), 4);
    }
}
