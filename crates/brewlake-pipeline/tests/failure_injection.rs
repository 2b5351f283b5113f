//! Failure injection tests for stage I/O.
//!
//! # Invariants Tested
//!
//! 1. **Key attached**: read, list and upload failures name the object key
//!    and keep the storage error as their source
//! 2. **Partial silver output**: a failed partition upload keeps earlier
//!    partitions and writes no later ones
//! 3. **Scratch cleanup**: run scratch directories are gone after success and
//!    after every kind of failure

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::error::Error as _;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use brewlake_core::{LayerLayout, RunId, StorageBackend};
use brewlake_pipeline::{
    Aggregator, Cleaner, PartitionBuilder, PipelineConfig, PipelineError, run_all,
};
use brewlake_test_utils::{
    TracingMemoryBackend, assert_dir_empty, assert_no_writes_under, assert_stored_keys,
    assert_write_order, first_page, init_test_logging, seed_cleaned, seed_raw,
};

fn config_with_scratch(root: &Path) -> PipelineConfig {
    PipelineConfig {
        scratch_root: Some(root.to_path_buf()),
        ..PipelineConfig::default()
    }
}

async fn seed_three_states(storage: &TracingMemoryBackend) {
    seed_cleaned(
        storage,
        &LayerLayout::default(),
        "a.json",
        &json!([
            {"name": "a", "brewery_type": "micro", "state": "alabama"},
            {"name": "b", "brewery_type": "micro", "state": "colorado"},
            {"name": "c", "brewery_type": "large", "state": "texas"}
        ]),
    )
    .await;
}

#[tokio::test]
async fn partition_upload_failure_keeps_earlier_partitions_only() {
    init_test_logging();
    let storage = TracingMemoryBackend::new();
    seed_three_states(&storage).await;
    storage.inject_write_failure("silver_layer/colorado/");
    storage.clear_operations();

    let err = PartitionBuilder::new(Arc::new(storage.clone()), PipelineConfig::default())
        .run(RunId::generate())
        .await
        .unwrap_err();

    match err {
        PipelineError::Upload { path, .. } => {
            assert_eq!(path, "silver_layer/colorado/breweries_colorado.parquet");
        }
        other => panic!("expected Upload, got {other:?}"),
    }
    assert_stored_keys(
        &storage,
        "silver_layer/",
        &["silver_layer/alabama/breweries_alabama.parquet"],
    );
    assert_write_order(
        &storage.operations(),
        &["silver_layer/alabama/breweries_alabama.parquet"],
    );
}

#[tokio::test]
async fn cleaned_upload_failure_names_target_and_keeps_cause() {
    let storage = TracingMemoryBackend::new();
    seed_raw(&storage, &LayerLayout::default(), "page_1.json", &first_page()).await;
    storage.inject_write_failure("bronze_layer/cleaned/");

    let err = Cleaner::new(Arc::new(storage.clone()), PipelineConfig::default())
        .run(RunId::generate())
        .await
        .unwrap_err();

    let cause = err.source().map(ToString::to_string);
    match err {
        PipelineError::Upload { path, .. } => {
            assert_eq!(path, "bronze_layer/cleaned/page_1.json");
        }
        other => panic!("expected Upload, got {other:?}"),
    }
    let cause = cause.expect("upload error carries its storage cause");
    assert!(cause.contains("injected failure"), "cause: {cause}");
    assert_no_writes_under(&storage, "bronze_layer/cleaned/");
}

#[tokio::test]
async fn read_failure_names_the_key() {
    let storage = TracingMemoryBackend::new();
    seed_three_states(&storage).await;
    storage.inject_failure("bronze_layer/cleaned/a.json");

    let err = PartitionBuilder::new(Arc::new(storage.clone()), PipelineConfig::default())
        .run(RunId::generate())
        .await
        .unwrap_err();
    match err {
        PipelineError::Read { path, .. } => assert_eq!(path, "bronze_layer/cleaned/a.json"),
        other => panic!("expected Read, got {other:?}"),
    }
    assert_no_writes_under(&storage, "silver_layer/");
}

#[tokio::test]
async fn list_failure_names_the_prefix() {
    let storage = TracingMemoryBackend::new();
    storage.inject_failure("bronze_layer/raw/");

    let err = Cleaner::new(Arc::new(storage), PipelineConfig::default())
        .run(RunId::generate())
        .await
        .unwrap_err();
    match err {
        PipelineError::List { prefix, .. } => assert_eq!(prefix, "bronze_layer/raw/"),
        other => panic!("expected List, got {other:?}"),
    }
}

#[tokio::test]
async fn gold_upload_failure_is_reported_with_key() {
    let storage = TracingMemoryBackend::new();
    seed_three_states(&storage).await;
    let shared: Arc<dyn StorageBackend> = Arc::new(storage.clone());
    PartitionBuilder::new(Arc::clone(&shared), PipelineConfig::default())
        .run(RunId::generate())
        .await
        .unwrap();

    storage.inject_write_failure("golden_layer/");
    let err = Aggregator::new(shared, PipelineConfig::default())
        .run(RunId::generate())
        .await
        .unwrap_err();
    match err {
        PipelineError::Upload { path, .. } => assert_eq!(
            path,
            "golden_layer/brewery_aggregated_by_type_and_location.parquet"
        ),
        other => panic!("expected Upload, got {other:?}"),
    }
}

#[tokio::test]
async fn scratch_is_removed_after_success() {
    let scratch_root = tempfile::tempdir().unwrap();
    let storage = TracingMemoryBackend::new();
    seed_raw(&storage, &LayerLayout::default(), "page_1.json", &first_page()).await;

    run_all(
        Arc::new(storage),
        &config_with_scratch(scratch_root.path()),
        RunId::generate(),
    )
    .await
    .unwrap();

    assert_dir_empty(scratch_root.path());
}

#[tokio::test]
async fn scratch_is_removed_after_failures() {
    let scratch_root = tempfile::tempdir().unwrap();
    let config = config_with_scratch(scratch_root.path());

    // Upload failure mid-stage.
    let storage = TracingMemoryBackend::new();
    seed_three_states(&storage).await;
    storage.inject_write_failure("silver_layer/texas/");
    let err = PartitionBuilder::new(Arc::new(storage), config.clone())
        .run(RunId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Upload { .. }));
    assert_dir_empty(scratch_root.path());

    // Schema failure.
    let storage = TracingMemoryBackend::new();
    seed_cleaned(&storage, &LayerLayout::default(), "a.json", &json!([{"name": "x"}])).await;
    let err = PartitionBuilder::new(Arc::new(storage), config.clone())
        .run(RunId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Schema { .. }));
    assert_dir_empty(scratch_root.path());

    // No input.
    let err = Cleaner::new(Arc::new(TracingMemoryBackend::new()), config)
        .run(RunId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoInput { .. }));
    assert_dir_empty(scratch_root.path());
}
