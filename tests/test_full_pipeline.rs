//! Integration test: Full pipeline (load → preprocess → train → evaluate → predict)

use polars::prelude::*;
use serde_json::json;
use std::path::Path;
use tabular_pipeline::config::PipelineConfig;
use tabular_pipeline::evaluation::DiagnosticView;
use tabular_pipeline::inference::{Prediction, Predictor};
use tabular_pipeline::pipeline::Pipeline;
use tabular_pipeline::preprocessing::PreprocessingConfig;
use tabular_pipeline::training::{ModelKind, TaskType, TrainingConfig};
use tabular_pipeline::utils::DataSaver;
use tempfile::tempdir;

fn write_regression_csv(path: &Path) {
    let n = 80;
    let x1: Vec<Option<f64>> = (0..n).map(|i| if i % 17 == 5 { None } else { Some(i as f64) }).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64).collect();
    let zone: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "north" } else { "south" }).collect();
    let target: Vec<f64> = (0..n)
        .map(|i| 3.0 * i as f64 + 2.0 + ((i as f64) * 0.1).sin() + if i % 2 == 0 { 5.0 } else { 0.0 })
        .collect();

    let mut df = df!("x1" => &x1, "x2" => &x2, "zone" => &zone, "target" => &target).unwrap();
    DataSaver::save_csv(&mut df, path).unwrap();
}

fn write_classification_csv(path: &Path) {
    let n = 60;
    let f1: Vec<f64> = (0..n).map(|i| if i < n / 2 { i as f64 * 0.1 } else { 10.0 + i as f64 * 0.1 }).collect();
    let f2: Vec<f64> = (0..n).map(|i| ((i * 5) % 7) as f64).collect();
    let label: Vec<&str> = (0..n).map(|i| if i < n / 2 { "cheap" } else { "premium" }).collect();

    let mut df = df!("f1" => &f1, "f2" => &f2, "label" => &label).unwrap();
    DataSaver::save_csv(&mut df, path).unwrap();
}

#[test]
fn test_regression_pipeline_end_to_end() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("houses.csv");
    write_regression_csv(&data);

    let config = PipelineConfig::new(&data, "target").with_models_dir(dir.path().join("models"));
    let run = Pipeline::new(config).run(None).unwrap();

    assert_eq!(run.profile.n_rows, 80);
    assert_eq!(run.history.len(), 4);
    assert!(run.report.get("R2").unwrap() > 0.8);
    assert!(run.report.get("MAPE").is_some());
    assert_eq!(run.report.predictions.len(), 16);
    assert!(run.tuning.is_none());
    assert!(run.model_path.exists());
    assert!(run.state_path.exists());

    assert!(matches!(run.diagnostics[0], DiagnosticView::ActualVsPredicted { .. }));
    assert!(run
        .diagnostics
        .iter()
        .any(|v| matches!(v, DiagnosticView::ResidualHistogram { .. })));

    let predictor = Predictor::new(Some(&run.model_path), Some(&run.state_path)).unwrap();
    let out = predictor
        .predict_json(&json!({"x1": 40.0, "x2": 3.0, "zone": "south"}))
        .unwrap();
    let value = out["prediction"].as_f64().unwrap();
    assert!((value - 122.0).abs() < 15.0, "predicted {}", value);
}

#[test]
fn test_classification_pipeline_with_tuning() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("plans.csv");
    write_classification_csv(&data);

    let config = PipelineConfig::new(&data, "label")
        .with_models_dir(dir.path().join("models"))
        .with_preprocessing(PreprocessingConfig::default().with_test_size(0.25))
        .with_training(
            TrainingConfig::new(TaskType::Classification)
                .with_cv_folds(3)
                .with_tuning(true),
        );
    let run = Pipeline::new(config).run(Some("Logistic Regression")).unwrap();

    assert_eq!(run.artifact.kind, ModelKind::LogisticRegression);
    assert_eq!(run.history.len(), 1);
    let tuning = run.tuning.as_ref().unwrap();
    assert_eq!(tuning.results.len(), 6);
    assert_eq!(run.artifact.params, tuning.outcome.params);

    assert_eq!(run.report.get("accuracy"), Some(1.0));
    let per_class = run.report.classification_report.as_ref().unwrap();
    let names: Vec<&str> = per_class.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["cheap", "premium"]);

    let predictor = Predictor::new(Some(&run.model_path), Some(&run.state_path)).unwrap();
    let record = json!({"f1": 12.0, "f2": 1.0});
    let prediction = predictor.predict_single(record.as_object().unwrap()).unwrap();
    assert_eq!(prediction, Prediction::Label("premium".to_string()));

    let proba = predictor.predict_with_probability(record.as_object().unwrap()).unwrap();
    assert!(proba["premium"] > proba["cheap"]);
}

#[test]
fn test_pipeline_rejects_missing_target() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("houses.csv");
    write_regression_csv(&data);

    let config = PipelineConfig::new(&data, "price").with_models_dir(dir.path().join("models"));
    let err = Pipeline::new(config).run(None).unwrap_err();
    assert!(matches!(err, tabular_pipeline::PipelineError::MissingTarget(_)));
}
