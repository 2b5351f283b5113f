//! Plumbing shared by the pipeline stages.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use brewlake_core::StorageBackend;
use brewlake_core::layer_paths::has_extension;
use brewlake_core::scratch::ScratchDir;

use crate::config::SchemaViolationPolicy;
use crate::error::{PipelineError, Result};
use crate::metrics;

/// Counters every stage reports on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Input files decoded.
    pub files_read: u64,
    /// Inputs excluded by the extension filter or a `skip` policy.
    pub files_skipped: u64,
    /// Records (rows) processed.
    pub rows: u64,
    /// Object keys written, in write order.
    pub keys_written: Vec<String>,
}

impl StageReport {
    pub(crate) fn finish(&self, stage: &'static str, elapsed: Duration) {
        metrics::record_stage_completion(
            stage,
            self.files_read,
            self.files_skipped,
            self.keys_written.len() as u64,
            self.rows,
            elapsed.as_secs_f64(),
        );
        tracing::info!(
            stage,
            files_read = self.files_read,
            files_skipped = self.files_skipped,
            files_written = self.keys_written.len(),
            rows = self.rows,
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            metric = "brewlake_stage_completed",
            "stage completed"
        );
    }
}

pub(crate) fn fail(stage: &'static str, err: &PipelineError) {
    metrics::record_stage_failure(stage, err.kind());
    tracing::error!(stage, kind = err.kind(), error = %err, "stage failed");
}

/// Keys under a prefix that passed the extension filter.
pub(crate) struct Candidates {
    pub keys: Vec<String>,
    pub skipped: u64,
    pub listed: usize,
}

/// Lists `prefix` in key order and keeps keys ending in `.{extension}`.
pub(crate) async fn list_candidates(
    storage: &dyn StorageBackend,
    prefix: &str,
    extension: &str,
) -> Result<Candidates> {
    let objects = storage
        .list_sorted(prefix)
        .await
        .map_err(|source| PipelineError::List {
            prefix: prefix.to_string(),
            source,
        })?;

    let listed = objects.len();
    let mut keys = Vec::with_capacity(listed);
    let mut skipped = 0;
    for object in objects {
        if has_extension(&object.path, extension) {
            keys.push(object.path);
        } else {
            tracing::debug!(path = %object.path, extension, "skipping non-matching key");
            skipped += 1;
        }
    }
    Ok(Candidates {
        keys,
        skipped,
        listed,
    })
}

pub(crate) async fn read_object(storage: &dyn StorageBackend, key: &str) -> Result<Bytes> {
    storage
        .get(key)
        .await
        .map_err(|source| PipelineError::Read {
            path: key.to_string(),
            source,
        })
}

/// Writes `data` into the scratch directory.
pub(crate) fn stage_locally(scratch: &ScratchDir, relative: &str, data: &[u8]) -> Result<PathBuf> {
    scratch
        .write(relative, data)
        .map_err(|source| PipelineError::Scratch {
            path: scratch.path().join(relative),
            source,
        })
}

/// Uploads a file previously materialized in the scratch directory.
pub(crate) async fn upload_staged(
    storage: &dyn StorageBackend,
    scratch: &ScratchDir,
    local: &Path,
    key: &str,
) -> Result<u64> {
    let data = scratch.read(local).map_err(|source| PipelineError::Scratch {
        path: local.to_path_buf(),
        source,
    })?;
    let size = data.len() as u64;
    storage
        .put(key, data)
        .await
        .map_err(|source| PipelineError::Upload {
            path: key.to_string(),
            source,
        })?;
    tracing::debug!(path = %key, size, "uploaded");
    Ok(size)
}

/// Applies the stage's schema violation policy to `err`.
///
/// Only schema errors are subject to the policy. Under `skip` the file is
/// counted as skipped and `Ok(())` is returned.
pub(crate) fn on_violation(
    policy: SchemaViolationPolicy,
    err: PipelineError,
    report: &mut StageReport,
) -> Result<()> {
    if policy == SchemaViolationPolicy::Skip {
        if let PipelineError::Schema { path, message } = &err {
            tracing::warn!(path = %path, reason = %message, "skipping file with schema violation");
            report.files_skipped += 1;
            return Ok(());
        }
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewlake_core::MemoryBackend;
    use brewlake_core::RunId;

    #[tokio::test]
    async fn list_candidates_filters_and_sorts() {
        let storage = MemoryBackend::new();
        for key in ["raw/b.json", "raw/a.json", "raw/readme.txt", "raw/.json"] {
            storage.put(key, Bytes::from_static(b"[]")).await.unwrap();
        }

        let candidates = list_candidates(&storage, "raw/", "json").await.unwrap();
        assert_eq!(candidates.keys, vec!["raw/a.json", "raw/b.json"]);
        assert_eq!(candidates.skipped, 2);
        assert_eq!(candidates.listed, 4);
    }

    #[test]
    fn skip_policy_only_applies_to_schema_errors() {
        let mut report = StageReport::default();
        let schema = PipelineError::schema("a.json", "missing state");
        assert!(on_violation(SchemaViolationPolicy::Skip, schema, &mut report).is_ok());
        assert_eq!(report.files_skipped, 1);

        let schema = PipelineError::schema("a.json", "missing state");
        assert!(on_violation(SchemaViolationPolicy::Abort, schema, &mut report).is_err());

        let codec = PipelineError::codec("a.json", "bad json");
        assert!(on_violation(SchemaViolationPolicy::Skip, codec, &mut report).is_err());
        assert_eq!(report.files_skipped, 1);
    }

    #[tokio::test]
    async fn upload_staged_puts_bytes_and_reports_scratch_errors() {
        let storage = MemoryBackend::new();
        let scratch = ScratchDir::create(None, RunId::generate()).unwrap();
        let local = stage_locally(&scratch, "x/y.json", b"[]").unwrap();

        upload_staged(&storage, &scratch, &local, "out/y.json")
            .await
            .unwrap();
        assert_eq!(storage.keys(), vec!["out/y.json".to_string()]);

        let missing = scratch.path().join("nope.json");
        let err = upload_staged(&storage, &scratch, &missing, "out/nope.json")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Scratch { .. }));
    }
}
