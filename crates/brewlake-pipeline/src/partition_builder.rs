//! Silver stage: cleaned layer to one Parquet file per partition key.
//!
//! All cleaned files are decoded and validated before anything is written.
//! Records are then grouped by the partition field and each group is written
//! to `<silver_root>/<key>/<dataset>_<key>.parquet`. Partitions are written
//! in key order; a failure stops the run but keeps partitions already
//! uploaded.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;

use brewlake_core::layer_paths::{LayerLayout, ROW_EXTENSION, validate_segment};
use brewlake_core::record::{FieldValue, Record};
use brewlake_core::{Layer, RunId, ScratchDir, StorageBackend, stage_span};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::parquet_util;
use crate::row_codec;
use crate::stage::{self, StageReport};

const STAGE: &str = "silver";

/// A partition value, usable as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Derives the key from a field value.
    ///
    /// Returns `None` for null values and for renderings that are not a
    /// valid path segment.
    #[must_use]
    pub fn from_value(value: &FieldValue) -> Option<Self> {
        let rendered = value.render()?;
        validate_segment(&rendered).ok()?;
        Some(Self(rendered))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One written partition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionFile {
    /// The partition value.
    pub key: PartitionKey,
    /// Object key of the uploaded file.
    pub object_key: String,
    /// Number of records in the file.
    pub rows: u64,
}

/// Output of a silver run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SilverOutput {
    /// Written partitions by key.
    pub partitions: BTreeMap<PartitionKey, PartitionFile>,
    /// Stage counters.
    pub report: StageReport,
}

/// Builds the silver layer from the cleaned layer.
pub struct PartitionBuilder {
    storage: Arc<dyn StorageBackend>,
    config: PipelineConfig,
}

impl PartitionBuilder {
    /// Creates a partition builder.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    /// Runs the stage.
    ///
    /// # Errors
    ///
    /// - `PipelineError::NoInput` if no `.json` key exists under the cleaned
    ///   root; nothing is written
    /// - `PipelineError::Schema` if a file is empty, or a record lacks a
    ///   usable partition value, unless the silver policy is `skip`; nothing
    ///   is written
    /// - `PipelineError::Read`, `Upload`, `Codec` or `Scratch` on I/O failure
    pub async fn run(&self, run_id: RunId) -> Result<SilverOutput> {
        let started = Instant::now();
        let result = async {
            let scratch = self.config.scratch_dir(run_id)?;
            self.run_in(&scratch).await
        }
        .instrument(stage_span(STAGE, run_id))
        .await;

        match &result {
            Ok(output) => output.report.finish(STAGE, started.elapsed()),
            Err(err) => stage::fail(STAGE, err),
        }
        result
    }

    async fn run_in(&self, scratch: &ScratchDir) -> Result<SilverOutput> {
        let prefix = self.config.layout.dir(Layer::Cleaned);
        let candidates =
            stage::list_candidates(self.storage.as_ref(), &prefix, ROW_EXTENSION).await?;
        if candidates.keys.is_empty() {
            return Err(PipelineError::NoInput { prefix });
        }

        let mut report = StageReport {
            files_skipped: candidates.skipped,
            ..StageReport::default()
        };

        let mut dataset: Vec<(PartitionKey, Record)> = Vec::new();
        for key in &candidates.keys {
            let bytes = stage::read_object(self.storage.as_ref(), key).await?;
            let keyed = row_codec::decode_records(key, &bytes)
                .and_then(|records| self.key_records(key, records));
            match keyed {
                Ok(keyed) => {
                    report.files_read += 1;
                    dataset.extend(keyed);
                }
                Err(err) => {
                    stage::on_violation(self.config.silver.on_schema_violation, err, &mut report)?;
                }
            }
        }
        report.rows = dataset.len() as u64;

        if dataset.is_empty() {
            tracing::warn!(prefix = %prefix, "no valid cleaned files; nothing to write");
            return Ok(SilverOutput {
                partitions: BTreeMap::new(),
                report,
            });
        }

        let schema = parquet_util::infer_schema(dataset.iter().map(|(_, record)| record));

        let mut groups: BTreeMap<PartitionKey, Vec<Record>> = BTreeMap::new();
        for (key, record) in dataset {
            groups.entry(key).or_default().push(record);
        }

        let dataset_name = &self.config.dataset_name;
        let mut partitions = BTreeMap::new();
        for (key, records) in groups {
            let relative = LayerLayout::partition_relative(dataset_name, key.as_str());
            let object_key = self
                .config
                .layout
                .partition_file(dataset_name, key.as_str());

            let batch = parquet_util::records_to_batch(&object_key, &schema, &records)?;
            let (local, file) = scratch.create_file(&relative).map_err(|source| {
                PipelineError::Scratch {
                    path: scratch.path().join(&relative),
                    source,
                }
            })?;
            parquet_util::write_batch(&object_key, file, &batch)?;
            stage::upload_staged(self.storage.as_ref(), scratch, &local, &object_key).await?;

            let rows = records.len() as u64;
            tracing::info!(partition = %key, path = %object_key, rows, "wrote partition");
            report.keys_written.push(object_key.clone());
            partitions.insert(
                key.clone(),
                PartitionFile {
                    key,
                    object_key,
                    rows,
                },
            );
        }

        Ok(SilverOutput { partitions, report })
    }

    /// Attaches the partition key to every record of one file.
    fn key_records(
        &self,
        path: &str,
        records: Vec<Record>,
    ) -> Result<Vec<(PartitionKey, Record)>> {
        let field = &self.config.partition_field;
        if records.is_empty() {
            return Err(PipelineError::schema(
                path,
                format!("file has no records, so no '{field}' field"),
            ));
        }

        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let value = record.get(field).ok_or_else(|| {
                    PipelineError::schema(path, format!("record {i} is missing '{field}'"))
                })?;
                if value.is_null() {
                    return Err(PipelineError::schema(
                        path,
                        format!("record {i} has null '{field}'"),
                    ));
                }
                let key = PartitionKey::from_value(value).ok_or_else(|| {
                    PipelineError::schema(
                        path,
                        format!("record {i} has '{field}' = '{value}', not a valid partition key"),
                    )
                })?;
                Ok((key, record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewlake_core::MemoryBackend;

    fn builder() -> PartitionBuilder {
        PartitionBuilder::new(Arc::new(MemoryBackend::new()), PipelineConfig::default())
    }

    fn record(state: Option<&str>) -> Record {
        let mut record = Record::new();
        record.insert("name", "x");
        if let Some(state) = state {
            record.insert("state", state);
        }
        record
    }

    #[test]
    fn partition_key_from_value() {
        assert_eq!(
            PartitionKey::from_value(&FieldValue::from("ohio")).map(|k| k.to_string()),
            Some("ohio".to_string())
        );
        assert_eq!(
            PartitionKey::from_value(&FieldValue::Int64(7)).map(|k| k.to_string()),
            Some("7".to_string())
        );
        assert!(PartitionKey::from_value(&FieldValue::Null).is_none());
        assert!(PartitionKey::from_value(&FieldValue::from("a/b")).is_none());
        assert!(PartitionKey::from_value(&FieldValue::from("..")).is_none());
    }

    #[test]
    fn key_records_requires_partition_field() {
        let b = builder();
        let err = b
            .key_records("c/a.json", vec![record(Some("ohio")), record(None)])
            .unwrap_err();
        match err {
            PipelineError::Schema { path, message } => {
                assert_eq!(path, "c/a.json");
                assert!(message.contains("record 1"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }

        assert!(matches!(
            b.key_records("c/empty.json", vec![]),
            Err(PipelineError::Schema { .. })
        ));

        let mut null_state = record(None);
        null_state.insert("state", FieldValue::Null);
        assert!(b.key_records("c/n.json", vec![null_state]).is_err());
    }
}
