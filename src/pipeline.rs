//! Preprocess → train → evaluate, end to end

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::evaluation::{DiagnosticView, EvaluationReport, ModelEvaluator};
use crate::preprocessing::{DataPreprocessor, DatasetProfile};
use crate::training::{ModelArtifact, ModelScore, ModelTrainer, TuningOutcome};
use crate::utils::Timer;
use std::path::PathBuf;
use tracing::info;

/// Everything a pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub profile: DatasetProfile,
    /// Per-model scores of the selection stage
    pub history: Vec<ModelScore>,
    pub tuning: Option<TuningOutcome>,
    pub artifact: ModelArtifact,
    pub report: EvaluationReport,
    pub diagnostics: Vec<DiagnosticView>,
    pub model_path: PathBuf,
    pub state_path: PathBuf,
    pub elapsed_secs: f64,
}

/// Runs the whole pipeline from a [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage. With `model` set only that catalog entry is
    /// trained, otherwise the whole catalog competes.
    pub fn run(&self, model: Option<&str>) -> Result<PipelineRun> {
        self.config.validate()?;
        let timer = Timer::start();
        let target = self.config.target_column.as_str();

        let mut preprocessor = DataPreprocessor::with_config(self.config.preprocessing.clone());
        let df = preprocessor.load(&self.config.data_path)?;

        let profile = preprocessor.profile(&df)?;
        let processed = preprocessor.fit_transform(&df, target)?;
        let split = preprocessor.split(
            &processed,
            target,
            self.config.preprocessing.test_size,
            self.config.preprocessing.random_state,
        )?;

        std::fs::create_dir_all(&self.config.models_dir)?;
        let state_path = self.config.state_path();
        preprocessor.save_state(&state_path)?;

        let trainer = ModelTrainer::new(self.config.training.clone());
        let (selected, history) = match model {
            Some(name) => {
                let outcome = trainer.train_one(name, &split.x_train, &split.y_train, &split.x_test, &split.y_test)?;
                let score = ModelScore {
                    kind: outcome.kind,
                    metrics: Some(outcome.metrics),
                    training_time_secs: outcome.training_time_secs,
                    error: None,
                };
                (outcome, vec![score])
            }
            None => {
                let selection = trainer.train_all(&split.x_train, &split.y_train, &split.x_test, &split.y_test)?;
                (selection.best, selection.history)
            }
        };

        let (final_outcome, tuning) = if self.config.training.tune {
            let tuned = trainer.tune_hyperparameters(
                selected.name(),
                &split.x_train,
                &split.y_train,
                &split.x_test,
                &split.y_test,
            )?;
            (tuned.outcome.clone(), Some(tuned))
        } else {
            (selected, None)
        };

        let artifact = final_outcome.into_artifact(split.feature_names.clone());
        let model_path = self.config.model_path();
        artifact.save(&model_path)?;

        let mut evaluator = ModelEvaluator::new(&artifact.model, &split.x_test, &split.y_test, self.config.training.task)?
            .with_feature_names(split.feature_names.clone());
        if let Some(encoder) = preprocessor.state().target_encoder() {
            evaluator = evaluator.with_class_names(encoder.classes().to_vec());
        }
        let report = evaluator.report();
        let diagnostics = evaluator.diagnostics();

        let elapsed_secs = timer.elapsed_secs();
        info!(model = %artifact.kind, secs = elapsed_secs, "Pipeline finished");

        Ok(PipelineRun {
            profile,
            history,
            tuning,
            artifact,
            report,
            diagnostics,
            model_path,
            state_path,
            elapsed_secs,
        })
    }
}
