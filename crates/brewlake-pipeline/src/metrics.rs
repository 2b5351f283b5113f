//! Pipeline metrics.
//!
//! Complements the structured logging emitted by each stage. Nothing is
//! recorded unless the host installs a `metrics` recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Files read by a stage.
pub const FILES_READ: &str = "brewlake_files_read_total";

/// Files excluded by an extension filter or a `skip` policy.
pub const FILES_SKIPPED: &str = "brewlake_files_skipped_total";

/// Objects written by a stage.
pub const FILES_WRITTEN: &str = "brewlake_files_written_total";

/// Records (rows) processed by a stage.
pub const ROWS_PROCESSED: &str = "brewlake_rows_processed_total";

/// Failed stage runs.
pub const STAGE_FAILURES: &str = "brewlake_stage_failures_total";

/// Stage run duration histogram.
pub const STAGE_DURATION: &str = "brewlake_stage_duration_seconds";

/// Registers all pipeline metric descriptions.
///
/// Call once at startup after installing a recorder.
pub fn register_metrics() {
    describe_counter!(FILES_READ, "Total input files read by a stage");
    describe_counter!(
        FILES_SKIPPED,
        "Total files excluded by an extension filter or skip policy"
    );
    describe_counter!(FILES_WRITTEN, "Total objects written by a stage");
    describe_counter!(ROWS_PROCESSED, "Total rows processed by a stage");
    describe_counter!(STAGE_FAILURES, "Total failed stage runs");
    describe_histogram!(STAGE_DURATION, "Duration of stage runs in seconds");
}

/// Records the outcome counters of a completed stage.
pub fn record_stage_completion(
    stage: &'static str,
    files_read: u64,
    files_skipped: u64,
    files_written: u64,
    rows: u64,
    duration_secs: f64,
) {
    counter!(FILES_READ, "stage" => stage).increment(files_read);
    counter!(FILES_SKIPPED, "stage" => stage).increment(files_skipped);
    counter!(FILES_WRITTEN, "stage" => stage).increment(files_written);
    counter!(ROWS_PROCESSED, "stage" => stage).increment(rows);
    histogram!(STAGE_DURATION, "stage" => stage).record(duration_secs);
}

/// Records a failed stage run.
pub fn record_stage_failure(stage: &'static str, kind: &'static str) {
    counter!(STAGE_FAILURES, "stage" => stage, "kind" => kind).increment(1);
}
