//! Integration test: Preprocessing pipeline end-to-end

use polars::prelude::*;
use tabular_pipeline::error::PipelineError;
use tabular_pipeline::preprocessing::{
    columns_to_array2, DataPreprocessor, ImputeStrategy, PreprocessingConfig, PreprocessingState, ScalerType,
};
use tempfile::tempdir;

fn houses_df() -> DataFrame {
    df!(
        "area" => &[Some(650.0), Some(820.0), None, Some(1200.0), Some(540.0), Some(980.0), Some(700.0), None, Some(1500.0), Some(610.0)],
        "rooms" => &[Some(1i64), Some(2), Some(2), Some(3), None, Some(2), Some(1), Some(2), Some(4), Some(1)],
        "city" => &[Some("Pune"), Some("Mumbai"), Some("Pune"), None, Some("Delhi"), Some("Mumbai"), Some("Pune"), Some("Delhi"), Some("Mumbai"), None],
        "price" => &[65.0, 120.0, 80.0, 210.0, 50.0, 150.0, 72.0, 95.0, 260.0, 60.0]
    )
    .unwrap()
}

#[test]
fn test_impute_leaves_no_nulls_for_every_strategy() {
    for strategy in [ImputeStrategy::Mean, ImputeStrategy::Median, ImputeStrategy::Mode] {
        let mut preprocessor = DataPreprocessor::new();
        let imputed = preprocessor.impute_missing(&houses_df(), strategy).unwrap();

        assert_eq!(imputed.height(), 10, "{strategy} changed the row count");
        for column in imputed.get_columns() {
            assert_eq!(column.null_count(), 0, "{strategy} left nulls in {}", column.name());
        }
    }
}

#[test]
fn test_encoding_is_deterministic_and_sorted() {
    let mut a = DataPreprocessor::new();
    let mut b = DataPreprocessor::new();
    let imputed = a.impute_missing(&houses_df(), ImputeStrategy::Mean).unwrap();

    let first = a.encode_categorical(&imputed).unwrap();
    let second = b.encode_categorical(&imputed).unwrap();
    assert!(first.equals(&second));

    let encoder = a.state().label_encoders.get("city").unwrap();
    assert_eq!(encoder.classes(), &["Delhi", "Mumbai", "Pune"]);
    assert_eq!(encoder.code("Pune"), Some(2));
}

#[test]
fn test_minmax_scaling_bounds_features() {
    let config = PreprocessingConfig::default().with_scaler(ScalerType::MinMax);
    let mut preprocessor = DataPreprocessor::with_config(config);
    let out = preprocessor.fit_transform(&houses_df(), "price").unwrap();

    let features = preprocessor.state().feature_columns.clone();
    assert_eq!(features, vec!["area", "rooms", "city"]);

    let x = columns_to_array2(&out, &features).unwrap();
    assert!(x.iter().all(|v| (-1e-12..=1.0 + 1e-12).contains(v)));

    let price = out.column("price").unwrap().f64().unwrap();
    assert_eq!(price.get(8), Some(260.0));
}

#[test]
fn test_split_is_reproducible_and_partitions_rows() {
    let mut preprocessor = DataPreprocessor::new();
    let out = preprocessor.fit_transform(&houses_df(), "price").unwrap();

    let a = preprocessor.split(&out, "price", 0.2, 42).unwrap();
    let b = preprocessor.split(&out, "price", 0.2, 42).unwrap();
    assert_eq!(a.train_indices, b.train_indices);
    assert_eq!(a.test_indices, b.test_indices);
    assert_eq!(a.x_test, b.x_test);

    assert_eq!(a.test_indices.len(), 2);
    assert!(a.test_indices.iter().all(|i| !a.train_indices.contains(i)));

    let mut all: Vec<usize> = a.train_indices.iter().chain(&a.test_indices).copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..10).collect::<Vec<_>>());

    let c = preprocessor.split(&out, "price", 0.2, 7).unwrap();
    assert_ne!(a.test_indices, c.test_indices);
}

#[test]
fn test_state_persist_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preprocessor.json");

    let mut preprocessor = DataPreprocessor::new();
    let out = preprocessor.fit_transform(&houses_df(), "price").unwrap();
    preprocessor.save_state(&path).unwrap();

    let reloaded = DataPreprocessor::load_state(&path).unwrap();
    let state: &PreprocessingState = reloaded.state();

    assert_eq!(state, preprocessor.state());
    assert_eq!(state.feature_columns, vec!["area", "rooms", "city"]);
    assert_eq!(state.target_column.as_deref(), Some("price"));
    assert!(reloaded.transform(&houses_df()).unwrap().equals(&out));
}

#[test]
fn test_unseen_category_rejected() {
    let mut preprocessor = DataPreprocessor::new();
    preprocessor.fit_transform(&houses_df(), "price").unwrap();

    let new_rows = df!(
        "area" => &[700.0],
        "rooms" => &[2i64],
        "city" => &["Kolkata"]
    )
    .unwrap();

    match preprocessor.transform(&new_rows) {
        Err(PipelineError::UnseenCategory { column, value }) => {
            assert_eq!(column, "city");
            assert_eq!(value, "Kolkata");
        }
        other => panic!("expected UnseenCategory, got {:?}", other),
    }
}

#[test]
fn test_load_csv_and_reject_unknown_format() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("houses.csv");
    std::fs::write(&csv, "area,city,price\n650,Pune,65\n820,Mumbai,120\n,Pune,80\n").unwrap();

    let preprocessor = DataPreprocessor::new();
    let df = preprocessor.load(&csv).unwrap();
    assert_eq!(df.shape(), (3, 3));
    assert_eq!(df.column("area").unwrap().null_count(), 1);

    let profile = preprocessor.profile(&df).unwrap();
    assert_eq!(profile.total_missing(), 1);

    let parquet = dir.path().join("houses.parquet");
    std::fs::write(&parquet, b"PAR1").unwrap();
    assert!(matches!(preprocessor.load(&parquet), Err(PipelineError::Format(_))));
}
