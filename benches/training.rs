use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};
use tabular_pipeline::inference::Predictor;
use tabular_pipeline::preprocessing::DataPreprocessor;
use tabular_pipeline::training::{ModelTrainer, TaskType, TrainingConfig};
use polars::prelude::*;

fn create_regression_data(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut columns: Vec<Column> = (0..n_features)
        .map(|i| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
            Column::new(format!("feature_{}", i).into(), values)
        })
        .collect();

    // Target is the sum of the features plus noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| {
            let sum: f64 = columns
                .iter()
                .map(|c| c.as_materialized_series().f64().unwrap().get(i).unwrap_or(0.0))
                .sum();
            sum + rng.gen::<f64>() * 0.1
        })
        .collect();

    columns.push(Column::new("target".into(), target));
    DataFrame::new(columns).unwrap()
}

fn prepared(n_rows: usize) -> (DataPreprocessor, Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>, Vec<String>) {
    let df = create_regression_data(n_rows, 5);
    let mut pre = DataPreprocessor::new();
    let out = pre.fit_transform(&df, "target").unwrap();
    let split = pre.split(&out, "target", 0.2, 42).unwrap();
    (pre, split.x_train, split.y_train, split.x_test, split.y_test, split.feature_names)
}

fn bench_train_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_all");
    group.sample_size(10);

    for n_rows in [250, 1000].iter() {
        let (_, x_train, y_train, x_test, y_test, _) = prepared(*n_rows);
        let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression));

        group.bench_with_input(BenchmarkId::new("regression", n_rows), n_rows, |b, _| {
            b.iter(|| {
                trainer
                    .train_all(black_box(&x_train), &y_train, &x_test, &y_test)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (pre, x_train, y_train, x_test, y_test, feature_names) = prepared(1000);
    let trainer = ModelTrainer::new(TrainingConfig::new(TaskType::Regression));
    let outcome = trainer
        .train_one("Random Forest", &x_train, &y_train, &x_test, &y_test)
        .unwrap();
    let predictor = Predictor::from_artifacts(outcome.into_artifact(feature_names), pre.into_state());

    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for batch_size in [1, 100, 1000].iter() {
        let records: Vec<Map<String, Value>> = (0..*batch_size)
            .map(|_| {
                (0..5)
                    .map(|i| (format!("feature_{}", i), json!(rng.gen::<f64>() * 10.0)))
                    .collect()
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("batch", batch_size), &records, |b, records| {
            b.iter(|| predictor.predict_batch(black_box(records)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_train_all, bench_prediction);
criterion_main!(benches);
