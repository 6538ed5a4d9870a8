//! Model evaluation
//!
//! Regression and classification metrics, a per-class report and the
//! diagnostic views that summarize held-out predictions.

pub mod metrics;
mod diagnostics;
mod evaluator;

pub use diagnostics::{DiagnosticView, RESIDUAL_BINS};
pub use evaluator::{EvaluationReport, ModelEvaluator};
pub use metrics::{AveragedMetrics, ClassMetrics, ClassificationReport};
