//! Training, model selection and grid search over the model catalog

use super::config::{ModelKind, TaskType, TrainingConfig};
use super::cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
use super::engine::{ModelArtifact, TrainedModel};
use super::grid::{default_params, param_grid, HyperParams};
use super::models::{check_shapes, TrainingMetrics};
use crate::error::{PipelineError, Result};
use crate::evaluation::metrics::{accuracy_score, r2_score};
use crate::utils::Timer;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// A fitted model together with how it scored
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub kind: ModelKind,
    pub model: TrainedModel,
    pub params: HyperParams,
    pub metrics: TrainingMetrics,
    pub training_time_secs: f64,
}

impl TrainingOutcome {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Package the outcome for persistence
    pub fn into_artifact(self, feature_names: Vec<String>) -> ModelArtifact {
        ModelArtifact::new(self.model, self.params, feature_names)
            .with_metrics(self.metrics, self.training_time_secs)
    }
}

/// One row of the `train_all` history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub kind: ModelKind,
    /// `None` when the model failed to train
    pub metrics: Option<TrainingMetrics>,
    pub training_time_secs: f64,
    pub error: Option<String>,
}

/// Winner of `train_all` and the per-model history
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub best: TrainingOutcome,
    pub history: Vec<ModelScore>,
}

impl SelectionResult {
    pub fn best_name(&self) -> &'static str {
        self.best.name()
    }
}

/// Cross-validated score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPointScore {
    pub params: HyperParams,
    pub cv: CVResults,
}

/// Result of an exhaustive grid search
#[derive(Debug, Clone)]
pub struct TuningOutcome {
    /// Winning grid point merged over the model defaults, as persisted
    pub best_params: HyperParams,
    pub best_cv_score: f64,
    /// Primary metric of the refitted model on the test set
    pub test_score: f64,
    pub outcome: TrainingOutcome,
    pub results: Vec<GridPointScore>,
}

/// Trains catalog models and selects between them
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn task(&self) -> TaskType {
        self.config.task
    }

    /// Models available for the configured task, in training order
    pub fn available_models(&self) -> &'static [ModelKind] {
        ModelKind::catalog(self.config.task)
    }

    /// Train one model by catalog name with its default hyperparameters
    pub fn train_one(
        &self,
        name: &str,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<TrainingOutcome> {
        let kind = ModelKind::from_name(self.config.task, name)?;
        self.train_kind(kind, &default_params(kind), x_train, y_train, x_test, y_test)
    }

    /// Train `kind` with `params` and score it on both sides of the split
    pub fn train_kind(
        &self,
        kind: ModelKind,
        params: &HyperParams,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<TrainingOutcome> {
        if kind.task() != self.config.task {
            return Err(PipelineError::UnknownModel(format!(
                "{} is not a {} model",
                kind, self.config.task
            )));
        }

        info!(model = %kind, "Training");
        let timer = Timer::start();

        let params = default_params(kind).merged(params);
        let mut model = TrainedModel::build(kind, &params, self.config.random_state)?;
        model.fit(x_train, y_train)?;

        let train_pred = model.predict(x_train)?;
        let test_pred = model.predict(x_test)?;
        let metrics = match self.config.task {
            TaskType::Regression => TrainingMetrics::compute_regression(y_train, &train_pred, y_test, &test_pred),
            TaskType::Classification => {
                TrainingMetrics::compute_classification(y_train, &train_pred, y_test, &test_pred)
            }
        };
        let training_time_secs = timer.elapsed_secs();

        info!(model = %kind, %metrics, secs = training_time_secs, "Trained");

        Ok(TrainingOutcome {
            kind,
            model,
            params,
            metrics,
            training_time_secs,
        })
    }

    /// Train the whole catalog and keep the first model with the strictly
    /// highest primary metric. A model that fails to train is logged and
    /// recorded in the history but never selected.
    pub fn train_all(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<SelectionResult> {
        let mut best: Option<TrainingOutcome> = None;
        let mut history = Vec::with_capacity(self.available_models().len());

        for &kind in self.available_models() {
            let timer = Timer::start();
            match self.train_kind(kind, &default_params(kind), x_train, y_train, x_test, y_test) {
                Ok(outcome) => {
                    history.push(ModelScore {
                        kind,
                        metrics: Some(outcome.metrics),
                        training_time_secs: outcome.training_time_secs,
                        error: None,
                    });

                    let score = outcome.metrics.primary();
                    let wins = !score.is_nan()
                        && best.as_ref().map_or(true, |b| score > b.metrics.primary());
                    if wins {
                        best = Some(outcome);
                    }
                }
                Err(e) => {
                    warn!(model = %kind, error = %e, "Model failed to train");
                    history.push(ModelScore {
                        kind,
                        metrics: None,
                        training_time_secs: timer.elapsed_secs(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let best = best.ok_or_else(|| {
            PipelineError::TrainingError(format!(
                "no {} model produced a valid {}",
                self.config.task,
                self.config.task.primary_metric()
            ))
        })?;

        info!(
            model = %best.kind,
            metric = self.config.task.primary_metric(),
            score = best.metrics.primary(),
            "Selected best model"
        );

        Ok(SelectionResult { best, history })
    }

    fn cv_strategy(&self) -> CVStrategy {
        let n_splits = self.config.cv_folds;
        let shuffle = self.config.cv_shuffle;
        match self.config.task {
            TaskType::Regression => CVStrategy::KFold { n_splits, shuffle },
            TaskType::Classification => CVStrategy::StratifiedKFold { n_splits, shuffle },
        }
    }

    /// Fold layout used by [`ModelTrainer::cross_validate`] for `y`
    pub fn cv_splits(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        CrossValidator::new(self.cv_strategy())
            .with_random_state(self.config.random_state)
            .split(y.len(), Some(y))
    }

    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self.config.task {
            TaskType::Regression => r2_score(y_true, y_pred),
            TaskType::Classification => accuracy_score(y_true, y_pred),
        }
    }

    /// Mean primary metric of `kind` with `params` over the CV folds of
    /// the training set
    pub fn cross_validate(
        &self,
        kind: ModelKind,
        params: &HyperParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<CVResults> {
        check_shapes(x, y)?;
        let splits = self.cv_splits(y)?;

        let mut scores = Vec::with_capacity(splits.len());
        for split in &splits {
            let x_fold = x.select(Axis(0), &split.train_indices);
            let y_fold = y.select(Axis(0), &split.train_indices);
            let x_val = x.select(Axis(0), &split.test_indices);
            let y_val = y.select(Axis(0), &split.test_indices);

            let mut model = TrainedModel::build(kind, params, self.config.random_state)?;
            model.fit(&x_fold, &y_fold)?;
            let pred = model.predict(&x_val)?;
            scores.push(self.score(&y_val, &pred));
        }

        Ok(CVResults::from_scores(scores))
    }

    /// Exhaustive grid search scored by cross-validation on the training
    /// set. Ties keep the earliest grid point; the winner is refitted on
    /// the full training set and scored on the test set.
    pub fn tune_hyperparameters(
        &self,
        name: &str,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<TuningOutcome> {
        let kind = ModelKind::from_name(self.config.task, name)?;
        let grid = param_grid(kind);
        info!(model = %kind, points = grid.len(), folds = self.config.cv_folds, "Grid search");

        let mut results = Vec::with_capacity(grid.len());
        let mut best: Option<(usize, f64)> = None;

        for (i, params) in grid.into_iter().enumerate() {
            let cv = self.cross_validate(kind, &params, x_train, y_train)?;
            debug!(model = %kind, %params, score = cv.mean_score, "Grid point");

            let score = cv.mean_score;
            if !score.is_nan() && best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
            results.push(GridPointScore { params, cv });
        }

        let (best_idx, best_cv_score) = best.ok_or_else(|| {
            PipelineError::TrainingError(format!("grid search for {} produced no valid score", kind))
        })?;
        let grid_point = &results[best_idx].params;
        info!(model = %kind, params = %grid_point, cv_score = best_cv_score, "Best grid point");

        let outcome = self.train_kind(kind, grid_point, x_train, y_train, x_test, y_test)?;
        let test_score = outcome.metrics.primary();

        Ok(TuningOutcome {
            best_params: outcome.params.clone(),
            best_cv_score,
            test_score,
            outcome,
            results,
        })
    }

    /// Write a trained model to `path`
    pub fn persist<P: AsRef<Path>>(&self, artifact: &ModelArtifact, path: P) -> Result<()> {
        artifact.save(path)
    }

    /// Load a model written by [`ModelTrainer::persist`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ModelArtifact> {
        ModelArtifact::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;
    use ndarray::Array2;

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 / n as f64 } else { ((i * 7) % 11) as f64 / 11.0 });
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0) + x.column(1).mapv(|v| 0.01 * v);
        (x, y)
    }

    fn two_blobs(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let base = if i % 2 == 0 { 0.0 } else { 3.0 };
            base + ((i * (j + 3)) % 5) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_train_one_regression() {
        let (x, y) = linear_data(40);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression));
        let outcome = trainer.train_one("Linear Regression", &x, &y, &x, &y).unwrap();

        assert_eq!(outcome.kind, ModelKind::LinearRegression);
        assert!(outcome.metrics.primary() > 0.99);
    }

    #[test]
    fn test_train_one_rejects_other_task() {
        let (x, y) = linear_data(20);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression));
        assert!(matches!(
            trainer.train_one("SVC", &x, &y, &x, &y),
            Err(PipelineError::UnknownModel(_))
        ));
        assert!(matches!(
            trainer.train_one("Neural Net", &x, &y, &x, &y),
            Err(PipelineError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_train_all_classification() {
        let (x, y) = two_blobs(40);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Classification));
        let result = trainer.train_all(&x, &y, &x, &y).unwrap();

        assert_eq!(result.history.len(), 3);
        assert_eq!(result.history[0].kind, ModelKind::LogisticRegression);
        assert!((result.best.metrics.primary() - 1.0).abs() < 1e-12);
        // the first perfect model wins ties
        let first_perfect = result
            .history
            .iter()
            .find(|s| s.metrics.map_or(false, |m| (m.primary() - 1.0).abs() < 1e-12))
            .unwrap();
        assert_eq!(result.best.kind, first_perfect.kind);
    }

    #[test]
    fn test_cross_validate_uses_configured_folds() {
        let (x, y) = linear_data(30);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression).with_cv_folds(3));
        let cv = trainer
            .cross_validate(ModelKind::LinearRegression, &HyperParams::new(), &x, &y)
            .unwrap();
        assert_eq!(cv.n_folds, 3);
    }

    #[test]
    fn test_cv_shuffle_is_configurable() {
        let (_, y) = linear_data(30);
        let ordered = ModelTrainer::new(TrainingConfig::new(TaskType::Regression).with_cv_folds(3));
        assert_eq!(ordered.cv_splits(&y).unwrap()[0].test_indices, (0..10).collect::<Vec<_>>());

        let shuffled = ModelTrainer::new(
            TrainingConfig::new(TaskType::Regression)
                .with_cv_folds(3)
                .with_cv_shuffle(true),
        );
        let splits = shuffled.cv_splits(&y).unwrap();
        assert_ne!(splits[0].test_indices, (0..10).collect::<Vec<_>>());
        assert_eq!(splits, shuffled.cv_splits(&y).unwrap());

        let mut covered: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..30).collect::<Vec<_>>());

        let cv = shuffled
            .cross_validate(ModelKind::LinearRegression, &HyperParams::new(), &linear_data(30).0, &y)
            .unwrap();
        assert!(cv.mean_score > 0.99);
    }

    #[test]
    fn test_stratified_shuffle_keeps_class_balance() {
        let (_, y) = two_blobs(24);
        let trainer = ModelTrainer::new(
            TrainingConfig::new(TaskType::Classification)
                .with_cv_folds(4)
                .with_cv_shuffle(true),
        );
        for split in trainer.cv_splits(&y).unwrap() {
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(ones, 3);
            assert_eq!(split.test_indices.len(), 6);
        }
    }

    #[test]
    fn test_tuned_params_include_defaults() {
        let (x, y) = linear_data(30);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression).with_cv_folds(3));
        let tuned = trainer.tune_hyperparameters("SVR", &x, &y, &x, &y).unwrap();

        assert_eq!(tuned.results.len(), 9);
        assert_eq!(tuned.best_params, tuned.outcome.params);
        assert_eq!(tuned.best_params.get("gamma"), Some(&ParamValue::Text("scale".to_string())));
        assert!(tuned.best_params.get("C").is_some());
        assert!(tuned.best_params.get("epsilon").is_some());
    }

    #[test]
    fn test_tune_linear_regression() {
        let (x, y) = linear_data(50);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression));
        let tuned = trainer.tune_hyperparameters("Linear Regression", &x, &y, &x, &y).unwrap();

        assert_eq!(tuned.results.len(), 4);
        // an unregularized fit of a noiseless line is best
        assert_eq!(tuned.best_params.to_string(), "{alpha=0}");
        assert!(tuned.test_score > 0.99);
        assert_eq!(tuned.outcome.params, tuned.best_params);
    }
}
