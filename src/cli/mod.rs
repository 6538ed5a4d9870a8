//! Tabular pipeline CLI
//!
//! Command-line interface for profiling, preprocessing, training,
//! evaluation and prediction.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{PipelineConfig, MODELS_DIR_ENV};
use crate::evaluation::{DiagnosticView, ModelEvaluator};
use crate::inference::{Prediction, PredictionInput, Predictor};
use crate::pipeline::Pipeline;
use crate::preprocessing::{
    column_to_array1, columns_to_array2, DataPreprocessor, ImputeStrategy, PreprocessingConfig, PreprocessingState,
    ScalerType,
};
use crate::training::{ModelArtifact, ModelKind, TaskType};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabular")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tabular prediction pipeline: preprocess, train, evaluate, predict")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a dataset profile
    Info {
        /// Input data file (CSV, TSV, TXT or spreadsheet)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Impute, encode and scale a dataset
    Preprocess {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Imputation strategy for numeric columns (mean, median, mode)
        #[arg(long, default_value = "mean")]
        impute: String,

        /// Scaler type (standard, minmax)
        #[arg(long, default_value = "standard")]
        scaler: String,

        /// Write the processed table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the fitted preprocessing state as JSON
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Run the full pipeline: preprocess, select a model, evaluate, save
    Train {
        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Task type (regression, classification)
        #[arg(long)]
        task: Option<String>,

        /// Catalog model name, or "all" to compare the whole catalog
        #[arg(short, long, default_value = "all")]
        model: String,

        /// Grid-search the selected model
        #[arg(long)]
        tune: bool,

        /// JSON pipeline configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for the model and preprocessing state
        #[arg(long, env = MODELS_DIR_ENV)]
        models_dir: Option<PathBuf>,

        /// Number of cross-validation folds used when tuning
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Shuffle rows before cutting cross-validation folds
        #[arg(long)]
        cv_shuffle: bool,

        /// Write the diagnostic views as JSON
        #[arg(long)]
        diagnostics: Option<PathBuf>,
    },

    /// Evaluate a saved model on a labelled dataset
    Evaluate {
        /// Labelled data file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Saved model
        #[arg(short, long)]
        model: PathBuf,

        /// Saved preprocessing state
        #[arg(short, long)]
        state: PathBuf,

        /// Write the diagnostic views as JSON
        #[arg(long)]
        diagnostics: Option<PathBuf>,
    },

    /// Predict with a saved model
    Predict {
        /// Saved model
        #[arg(short, long)]
        model: PathBuf,

        /// Saved preprocessing state
        #[arg(short, long)]
        state: PathBuf,

        /// JSON record, array of records, or path to a JSON file
        #[arg(short, long, conflicts_with = "data", required_unless_present = "data")]
        input: Option<String>,

        /// Data file of rows to predict
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output class probabilities instead of labels
        #[arg(long)]
        proba: bool,

        /// Output file (.json, otherwise CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the model catalog
    Models {
        /// Task type (regression, classification)
        #[arg(long, default_value = "regression")]
        task: String,
    },
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Info { data } => cmd_info(&data),
        Commands::Preprocess { data, target, impute, scaler, output, state } => {
            cmd_preprocess(&data, &target, &impute, &scaler, output.as_deref(), state.as_deref())
        }
        Commands::Train { data, target, task, model, tune, config, models_dir, cv_folds, cv_shuffle, diagnostics } => {
            let mut pipeline = match config {
                Some(path) => PipelineConfig::from_file(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(data) = data {
                pipeline.data_path = data;
            }
            if let Some(target) = target {
                pipeline.target_column = target;
            }
            if let Some(task) = task {
                pipeline.training.task = task.parse()?;
            }
            if let Some(dir) = models_dir {
                pipeline.models_dir = dir;
            }
            if let Some(folds) = cv_folds {
                pipeline.training.cv_folds = folds;
            }
            pipeline.training.tune |= tune;
            pipeline.training.cv_shuffle |= cv_shuffle;
            cmd_train(pipeline, &model, diagnostics.as_deref())
        }
        Commands::Evaluate { data, target, model, state, diagnostics } => {
            cmd_evaluate(&data, &target, &model, &state, diagnostics.as_deref())
        }
        Commands::Predict { model, state, input, data, proba, output } => {
            cmd_predict(&model, &state, input.as_deref(), data.as_deref(), proba, output.as_deref())
        }
        Commands::Models { task } => cmd_models(&task),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_auto(data_path)?;
    let profile = DataPreprocessor::new().profile(&df)?;

    kv("File", &data_path.display().to_string());
    kv("Rows", &profile.n_rows.to_string());
    kv("Columns", &profile.n_cols.to_string());
    kv("Missing", &profile.total_missing().to_string());
    kv("Memory", &format!("{:.2} MB", df.estimated_size() as f64 / 1024.0 / 1024.0));
    println!();

    indented(&profile.to_string());
    println!();
    Ok(())
}

pub fn cmd_preprocess(
    data_path: &Path,
    target: &str,
    impute: &str,
    scaler: &str,
    output: Option<&Path>,
    state_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Preprocess");

    let config = PreprocessingConfig::default()
        .with_impute(impute.parse::<ImputeStrategy>()?)
        .with_scaler(scaler.parse::<ScalerType>()?);
    let mut preprocessor = DataPreprocessor::with_config(config);

    step_run("Loading data");
    let df = preprocessor.load(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Processing");
    let start = Instant::now();
    let mut processed = preprocessor.fit_transform(&df, target)?;
    step_done(&format!("{:?}", start.elapsed()));

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        DataSaver::save_csv(&mut processed, path)?;
        step_done(&format!("{} rows × {} cols", processed.height(), processed.width()));
    }
    if let Some(path) = state_path {
        preprocessor.save_state(path)?;
        step_ok(&format!("State → {}", path.display()));
    }

    let state = preprocessor.state();
    println!();
    kv("Features", &state.feature_columns.join(", "));
    kv("Encoded", &state.label_encoders.columns().collect::<Vec<_>>().join(", "));
    println!();
    Ok(())
}

pub fn cmd_train(config: PipelineConfig, model: &str, diagnostics: Option<&Path>) -> anyhow::Result<()> {
    section("Train");

    let task = config.training.task;
    let single = match model {
        "all" => None,
        name => Some(ModelKind::from_name(task, name)?.name()),
    };

    kv("Data", &config.data_path.display().to_string());
    kv("Target", &config.target_column);
    kv("Task", &task.to_string());
    kv("Models", &config.models_dir.display().to_string());
    println!();

    step_run("Running pipeline");
    let run = Pipeline::new(config).run(single)?;
    step_done(&format!("{:.2}s", run.elapsed_secs));

    println!();
    println!("  {:<24} {:>12} {:>10}", muted("Model"), muted(task.primary_metric()), muted("Time"));
    println!("  {}", dim(&"─".repeat(48)));
    for score in &run.history {
        match &score.metrics {
            Some(metrics) => println!(
                "  {:<24} {:>12.4} {:>9.2}s",
                score.kind.name(),
                metrics.primary(),
                score.training_time_secs
            ),
            None => println!(
                "  {:<24} {:>12}",
                score.kind.name(),
                format!("err: {}", score.error.as_deref().unwrap_or("unknown")).red()
            ),
        }
    }
    println!("  {}", dim(&"─".repeat(48)));

    if let Some(tuning) = &run.tuning {
        println!();
        kv("Best params", &tuning.best_params.to_string());
        kv("CV score", &format!("{:.4}", tuning.best_cv_score));
        kv("Test score", &format!("{:.4}", tuning.test_score));
    }

    println!();
    println!("  {} {}", ok("best"), run.artifact.kind.name().white().bold());
    println!();
    indented(&run.report.render());

    for view in &run.diagnostics {
        if let DiagnosticView::FeatureImportance { .. } = view {
            println!();
            indented(&view.render());
        }
    }

    if let Some(path) = diagnostics {
        write_json(path, &run.diagnostics)?;
        step_ok(&format!("Diagnostics → {}", path.display()));
    }
    step_ok(&format!("Model → {}", run.model_path.display()));
    step_ok(&format!("State → {}", run.state_path.display()));
    println!();
    Ok(())
}

pub fn cmd_evaluate(
    data_path: &Path,
    target: &str,
    model_path: &Path,
    state_path: &Path,
    diagnostics: Option<&Path>,
) -> anyhow::Result<()> {
    section("Evaluate");

    let artifact = ModelArtifact::load(model_path).with_context(|| format!("loading {}", model_path.display()))?;
    let state = PreprocessingState::load(state_path).with_context(|| format!("loading {}", state_path.display()))?;

    step_run("Loading data");
    let df = DataLoader::new().load_auto(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    if state.target_column.as_deref() != Some(target) {
        bail!(
            "state was fitted with target {:?}, not '{}'",
            state.target_column.as_deref().unwrap_or("<none>"),
            target
        );
    }
    if df.column(target).is_err() {
        bail!("target column '{}' not found in {}", target, data_path.display());
    }

    let processed = state.transform(&df)?;
    let x = columns_to_array2(&processed, &state.feature_columns)?;
    let y = column_to_array1(&processed, target)?;

    let mut evaluator = ModelEvaluator::new(&artifact.model, &x, &y, artifact.task())?
        .with_feature_names(state.feature_columns.clone());
    if let Some(encoder) = state.target_encoder() {
        evaluator = evaluator.with_class_names(encoder.classes().to_vec());
    }

    kv("Model", artifact.kind.name());
    kv("Trained", &artifact.trained_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    println!();
    indented(&evaluator.report().render());

    let views = evaluator.diagnostics();
    if let Some(path) = diagnostics {
        write_json(path, &views)?;
        step_ok(&format!("Diagnostics → {}", path.display()));
    }
    println!();
    Ok(())
}

fn read_input(input: &str) -> anyhow::Result<Value> {
    let path = Path::new(input);
    let text = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        input.to_string()
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

pub fn cmd_predict(
    model_path: &Path,
    state_path: &Path,
    input: Option<&str>,
    data_path: Option<&Path>,
    proba: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let predictor = Predictor::new(Some(model_path), Some(state_path))?;
    let input = match (input, data_path) {
        (Some(json), _) => PredictionInput::from_json(read_input(json)?)?,
        (None, Some(path)) => PredictionInput::Table(DataLoader::new().load_auto(path)?),
        (None, None) => bail!("either --input or --data is required"),
    };

    let info = predictor.model_info()?;
    kv("Model", &info.model_type);
    kv("Rows", &input.n_rows().to_string());
    println!();

    if proba {
        let rows = predictor.predict_proba(&input)?;
        match output {
            Some(path) => {
                write_json(path, &rows)?;
                step_ok(&format!("Probabilities → {}", path.display()));
            }
            None => {
                for (i, row) in rows.iter().enumerate() {
                    let parts: Vec<String> = row.iter().map(|(k, p)| format!("{}={:.4}", k, p)).collect();
                    println!("  {:>5}  {}", muted(&i.to_string()), parts.join("  "));
                }
            }
        }
    } else {
        let predictions = predictor.predict(&input)?;
        match output {
            Some(path) if path.extension().and_then(|e| e.to_str()) == Some("json") => {
                write_json(path, &predictions)?;
                step_ok(&format!("Predictions → {}", path.display()));
            }
            Some(path) => {
                let mut df = DataFrame::new(vec![predictions_column(&predictions)])?;
                DataSaver::save_csv(&mut df, path)?;
                step_ok(&format!("Predictions → {}", path.display()));
            }
            None => {
                for (i, p) in predictions.iter().enumerate() {
                    println!("  {:>5}  {}", muted(&i.to_string()), p.to_string().white());
                }
            }
        }
    }

    println!();
    Ok(())
}

fn predictions_column(predictions: &[Prediction]) -> Column {
    let numeric: Option<Vec<f64>> = predictions
        .iter()
        .map(|p| match p {
            Prediction::Value(v) => Some(*v),
            Prediction::Label(_) => None,
        })
        .collect();
    match numeric {
        Some(values) => Column::new("prediction".into(), values),
        None => Column::new(
            "prediction".into(),
            predictions.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        ),
    }
}

pub fn cmd_models(task: &str) -> anyhow::Result<()> {
    let task: TaskType = task.parse()?;
    section(&format!("Models · {}", task));

    for kind in ModelKind::catalog(task) {
        let proba = if kind.supports_proba() { ok("proba") } else { dim("-") };
        println!("  {:<24} {}", kind.name().white(), proba);
    }
    println!();
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_flags() {
        let cli = Cli::try_parse_from([
            "tabular", "train", "--data", "houses.csv", "--target", "price", "--tune", "--model", "SVR", "--cv-shuffle",
        ])
        .unwrap();
        let Commands::Train { data, target, tune, model, cv_shuffle, .. } = cli.command else {
            panic!("expected train");
        };
        assert_eq!(data, Some(PathBuf::from("houses.csv")));
        assert_eq!(target.as_deref(), Some("price"));
        assert!(tune);
        assert_eq!(model, "SVR");
        assert!(cv_shuffle);
    }

    #[test]
    fn test_predict_requires_input_or_data() {
        assert!(Cli::try_parse_from(["tabular", "predict", "-m", "m.bin", "-s", "s.json"]).is_err());
        assert!(Cli::try_parse_from(["tabular", "predict", "-m", "m.bin", "-s", "s.json", "-i", "{}"]).is_ok());
    }

    #[test]
    fn test_predictions_column_types() {
        let numeric = predictions_column(&[Prediction::Value(1.5), Prediction::Value(2.0)]);
        assert_eq!(numeric.dtype(), &DataType::Float64);
        let labels = predictions_column(&[Prediction::Label("big".into())]);
        assert_eq!(labels.dtype(), &DataType::String);
    }
}
