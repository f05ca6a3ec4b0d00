//! End-to-end runs through the engine with scripted adapters

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{mock_registry, rows, test_config, Calls, MockAdapter};
use ormbench_engine::memory::ConstantProbe;
use ormbench_engine::report::ReportGenerator;
use ormbench_engine::schema::FieldValue;
use ormbench_engine::store::ResultStore;
use ormbench_engine::{
    BackendAdapter, BackendSelection, BenchError, BenchmarkEngine, ConversionError, EngineConfig,
    RunContext, Winner,
};
use tempfile::TempDir;

fn engine(config: EngineConfig) -> BenchmarkEngine {
    BenchmarkEngine::with_probe(config, Arc::new(ConstantProbe(128.0))).unwrap()
}

#[tokio::test]
async fn test_two_backends_thousand_rows() {
    let engine = engine(test_config(400));
    let dataset = rows(1000);

    let ctx = engine
        .run_selected(&mock_registry(false), &BackendSelection::Both, &dataset)
        .await
        .unwrap();

    assert_eq!(ctx.requested, vec!["fast".to_string(), "slow".to_string()]);
    assert_eq!(ctx.results.len(), 2);
    assert!(!ctx.is_partial());

    for backend in ["fast", "slow"] {
        assert_eq!(ctx.progress[backend].len(), 3);
        let sizes: Vec<usize> = ctx.progress[backend].iter().map(|p| p.items_in_chunk).collect();
        assert_eq!(sizes, vec![400, 400, 200]);

        let result = ctx.result_for(backend).unwrap();
        assert_eq!(result.sample_size, 1000);
        assert_eq!(result.insert_sample.item_count, 1000);
    }

    // "fast" reports a zero memory delta
    let comparison = ctx.comparison.as_ref().unwrap();
    assert!(comparison.insert_performance.is_finite());
    assert!((comparison.insert_performance - 100.0).abs() < 1e-6);
    assert_eq!(comparison.memory_difference, -100.0);

    let report = ReportGenerator::comparison(comparison);
    assert_eq!(report.summary.insert_winner, Winner::Backend("fast".to_string()));
    assert_eq!(report.summary.memory_winner, Winner::Backend("fast".to_string()));
}

#[tokio::test]
async fn test_insert_failure_on_second_chunk() {
    let engine = engine(test_config(400));
    let dataset = rows(1000);
    let calls = Arc::new(Calls::default());
    let mut adapter = MockAdapter::new("flaky").with_calls(calls.clone());
    adapter.fail_insert_on = Some(2);

    let mut ctx = RunContext::new(vec!["flaky".to_string()]);
    let err = engine
        .run_benchmark(&mut adapter, &dataset, &mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::AdapterOperation { .. }));
    assert!(ctx.results.is_empty());
    assert_eq!(ctx.failures.len(), 1);
    assert_eq!(ctx.failures[0].category, "adapter_operation");
    assert_eq!(Calls::get(&calls.inserts), 2);
    assert_eq!(Calls::get(&calls.queries), 0);
    assert_eq!(Calls::get(&calls.disconnects), 1);
    assert_eq!(engine.metrics().failures("flaky", "adapter_operation"), 1);
}

#[tokio::test]
async fn test_conversion_error_names_dataset_row() {
    let engine = engine(test_config(4));
    let mut dataset = rows(10);
    dataset[5].insert("fare_amount".to_string(), serde_json::json!("twelve"));
    let calls = Arc::new(Calls::default());
    let mut adapter = MockAdapter::new("strict").with_calls(calls.clone());

    let mut ctx = RunContext::new(vec!["strict".to_string()]);
    let err = engine
        .run_benchmark(&mut adapter, &dataset, &mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BenchError::Conversion(ConversionError::TypeMismatch { row: 5, .. })
    ));
    assert!(ctx.failures[0].message.contains("row 5"));
    assert_eq!(Calls::get(&calls.inserts), 1);
    assert_eq!(Calls::get(&calls.disconnects), 1);
}

#[tokio::test]
async fn test_connection_failure_keeps_other_backend() {
    let engine = engine(test_config(250));
    let dataset = rows(500);

    let ctx = engine
        .run_selected(&mock_registry(true), &BackendSelection::Both, &dataset)
        .await
        .unwrap();

    assert!(ctx.is_partial());
    assert_eq!(ctx.results.len(), 1);
    assert_eq!(ctx.results[0].backend_name, "fast");
    assert_eq!(ctx.failures[0].backend, "slow");
    assert_eq!(ctx.failures[0].category, "adapter_connection");
    assert!(ctx.comparison.is_none());
}

#[tokio::test]
async fn test_connect_failure_skips_disconnect() {
    let engine = engine(test_config(100));
    let calls = Arc::new(Calls::default());
    let mut adapter = MockAdapter::new("down").with_calls(calls.clone());
    adapter.fail_connect = true;

    let mut ctx = RunContext::new(vec!["down".to_string()]);
    let result = engine.run_benchmark(&mut adapter, &rows(10), &mut ctx).await;

    assert!(matches!(result, Err(BenchError::AdapterConnection { .. })));
    assert_eq!(Calls::get(&calls.connects), 1);
    assert_eq!(calls.disconnects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_results_are_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(300);
    config.storage.persist = true;
    config.storage.results_dir = temp_dir.path().join("results");

    let engine = engine(config);
    let ctx = engine
        .run_selected(&mock_registry(false), &BackendSelection::Both, &rows(600))
        .await
        .unwrap();

    // one file per backend plus the comparison
    assert_eq!(ctx.persisted.len(), 3);
    assert!(ctx.warnings.is_empty());

    let store = ResultStore::new(temp_dir.path().join("results"));
    let fast = store.load_latest("fast").unwrap().unwrap().result().unwrap();
    let original = ctx.result_for("fast").unwrap();
    assert!((fast.insert_ops_per_second() - original.insert_ops_per_second()).abs() < 1e-6);
    assert!((fast.total_time() - original.total_time()).abs() < 1e-9);

    let record = store.load_latest("comparison").unwrap().unwrap();
    let loaded = record.comparison().unwrap();
    let expected = ctx.comparison.as_ref().unwrap();
    assert_eq!(loaded.backend_a, expected.backend_a);
    assert!((loaded.insert_performance - expected.insert_performance).abs() < 1e-9);
    assert!((loaded.memory_difference - expected.memory_difference).abs() < 1e-9);
}

#[tokio::test]
async fn test_save_failure_is_a_warning() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not_a_dir");
    std::fs::write(&blocker, "occupied").unwrap();

    let mut config = test_config(100);
    config.storage.persist = true;
    config.storage.results_dir = blocker;

    let engine = engine(config);
    let mut adapter = MockAdapter::new("solo");
    let mut ctx = RunContext::new(vec!["solo".to_string()]);
    let result = engine
        .run_benchmark(&mut adapter, &rows(50), &mut ctx)
        .await
        .unwrap();

    assert_eq!(result.sample_size, 50);
    assert_eq!(ctx.results.len(), 1);
    assert_eq!(ctx.warnings.len(), 1);
    assert!(ctx.persisted.is_empty());
}

#[tokio::test]
async fn test_empty_sample_is_rejected_before_connecting() {
    let engine = engine(test_config(100));
    let err = engine
        .run_selected(&mock_registry(false), &BackendSelection::Both, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::InvalidConfiguration(_)));
}

#[test]
fn test_null_fields_take_defaults() {
    let adapter = MockAdapter::new("mapping");
    let row = serde_json::json!({
        "VendorID": 1,
        "fare_amount": null,
        "passenger_count": null,
        "store_and_fwd_flag": null,
    });
    let records = adapter.prepare(&[row.as_object().cloned().unwrap()], 0).unwrap();

    assert_eq!(records[0].get("fare_amount"), Some(&FieldValue::Float(0.0)));
    assert_eq!(records[0].get("passenger_count"), Some(&FieldValue::Int(1)));
    assert_eq!(records[0].get("store_and_fwd_flag"), Some(&FieldValue::Null));
}
