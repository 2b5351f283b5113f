//! Cleaning stage: raw layer to cleaned layer.
//!
//! Each raw file is cleaned on its own, so files with different schemas are
//! handled independently. Within one file:
//!
//! - nested objects are flattened into `parent.child` fields
//! - field names are lowercased and every whitespace character becomes `_`
//! - text values are lowercased and whitespace runs collapse to one `_`
//! - nulls, and fields present elsewhere in the batch but missing from a
//!   record, become [`UNKNOWN`]
//!
//! Cleaning is idempotent.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use regex::Regex;
use serde_json::Value;
use tracing::Instrument;

use brewlake_core::layer_paths::{Layer, ROW_EXTENSION, base_name};
use brewlake_core::record::{FieldValue, Record};
use brewlake_core::{RunId, ScratchDir, StorageBackend, stage_span};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::row_codec::{self, RawRecord};
use crate::stage::{self, StageReport};

/// Sentinel written in place of null or missing values.
pub const UNKNOWN: &str = "unknown";

const STAGE: &str = "clean";

#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Normalizes a field name.
#[must_use]
pub fn normalize_field_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Normalizes a text value.
#[must_use]
pub fn normalize_text(value: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&value.to_lowercase(), "_")
        .into_owned()
}

/// Cleans one raw batch.
///
/// When two source fields normalize to the same name, the later one in the
/// flattened record wins.
#[must_use]
pub fn clean(batch: Vec<RawRecord>) -> Vec<Record> {
    let mut records: Vec<Record> = batch
        .into_iter()
        .map(|raw| {
            let mut record = Record::new();
            flatten_into(&mut record, None, raw);
            record
        })
        .collect();

    let columns: BTreeSet<String> = records
        .iter()
        .flat_map(|r| r.field_names().map(str::to_string))
        .collect();

    for record in &mut records {
        for column in &columns {
            if !record.contains(column) {
                record.insert(column.clone(), UNKNOWN);
            }
        }
    }
    records
}

fn flatten_into(record: &mut Record, parent: Option<&str>, raw: RawRecord) {
    for (name, value) in raw {
        let name = normalize_field_name(&name);
        let name = match parent {
            Some(parent) => format!("{parent}.{name}"),
            None => name,
        };
        match value {
            Value::Object(nested) => flatten_into(record, Some(&name), nested),
            other => record.insert(name, clean_value(&other)),
        }
    }
}

fn clean_value(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Text(UNKNOWN.to_string()),
        Value::String(s) => FieldValue::Text(normalize_text(s)),
        Value::Array(_) => FieldValue::Text(normalize_text(&value.to_string())),
        other => FieldValue::from_json(other),
    }
}

/// Output of a cleaning run.
pub type CleanReport = StageReport;

/// Cleans every raw file into the cleaned layer, one output per input.
pub struct Cleaner {
    storage: Arc<dyn StorageBackend>,
    config: PipelineConfig,
}

impl Cleaner {
    /// Creates a cleaner.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    /// Runs the stage.
    ///
    /// Every cleaned file is materialized in a scratch directory owned by
    /// `run_id` and then uploaded to `<cleaned_root>/<basename>`. The scratch
    /// directory is removed before this returns, on success or failure.
    ///
    /// # Errors
    ///
    /// - `PipelineError::NoInput` if no `.json` key exists under the raw root
    /// - `PipelineError::Schema` for a raw file that is not an array of
    ///   objects, unless the cleaner policy is `skip`
    /// - `PipelineError::Read`, `Upload`, `Codec` or `Scratch` on I/O failure
    pub async fn run(&self, run_id: RunId) -> Result<CleanReport> {
        let started = Instant::now();
        let result = async {
            let scratch = self.config.scratch_dir(run_id)?;
            self.run_in(&scratch).await
        }
        .instrument(stage_span(STAGE, run_id))
        .await;

        match &result {
            Ok(report) => report.finish(STAGE, started.elapsed()),
            Err(err) => stage::fail(STAGE, err),
        }
        result
    }

    async fn run_in(&self, scratch: &ScratchDir) -> Result<CleanReport> {
        let layout = &self.config.layout;
        let prefix = layout.dir(Layer::Raw);
        let candidates =
            stage::list_candidates(self.storage.as_ref(), &prefix, ROW_EXTENSION).await?;
        if candidates.keys.is_empty() {
            return Err(PipelineError::NoInput { prefix });
        }

        let mut report = CleanReport {
            files_skipped: candidates.skipped,
            ..CleanReport::default()
        };

        for key in &candidates.keys {
            let bytes = stage::read_object(self.storage.as_ref(), key).await?;
            let batch = match row_codec::decode_raw(key, &bytes) {
                Ok(batch) => batch,
                Err(err) => {
                    stage::on_violation(self.config.cleaner.on_schema_violation, err, &mut report)?;
                    continue;
                }
            };
            report.files_read += 1;

            let cleaned = clean(batch);
            let name = base_name(key);
            let target = layout.cleaned_file(name);
            let data = row_codec::encode_records(&target, &cleaned)?;
            let local = stage::stage_locally(scratch, name, &data)?;
            stage::upload_staged(self.storage.as_ref(), scratch, &local, &target).await?;

            tracing::info!(source = %key, path = %target, rows = cleaned.len(), "cleaned file");
            report.rows += cleaned.len() as u64;
            report.keys_written.push(target);
        }
        Ok(report)
    }
}
