//! Custom assertion helpers for integration tests.

use crate::storage::{StorageOp, TracingMemoryBackend};

/// Asserts that nothing was written under `prefix`.
///
/// # Panics
///
/// Panics if any recorded put targets `prefix`.
pub fn assert_no_writes_under(storage: &TracingMemoryBackend, prefix: &str) {
    let writes: Vec<String> = storage
        .written_paths()
        .into_iter()
        .filter(|p| p.starts_with(prefix))
        .collect();
    assert!(
        writes.is_empty(),
        "Expected no writes under {prefix}, found {writes:?}"
    );
}

/// Asserts that the stored keys under `prefix` are exactly `expected`.
///
/// # Panics
///
/// Panics if the stored set differs.
pub fn assert_stored_keys(storage: &TracingMemoryBackend, prefix: &str, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
    expected.sort();
    assert_eq!(storage.paths_under(prefix), expected);
}

/// Asserts that puts happened in the given order.
///
/// # Panics
///
/// Panics if the put sequence differs from `expected`.
pub fn assert_write_order(ops: &[StorageOp], expected: &[&str]) {
    let actual: Vec<&str> = ops.iter().filter_map(StorageOp::put_path).collect();
    assert_eq!(actual, expected, "unexpected write order");
}

/// Asserts that a directory exists and has no entries.
///
/// # Panics
///
/// Panics if the directory cannot be read or is not empty.
pub fn assert_dir_empty(dir: &std::path::Path) {
    let entries: Vec<_> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    assert!(
        entries.is_empty(),
        "Expected {} to be empty, found {entries:?}",
        dir.display()
    );
}
