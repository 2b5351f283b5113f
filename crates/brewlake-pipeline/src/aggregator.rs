//! Gold stage: silver partition files to one aggregate file.
//!
//! Rows are counted per distinct (category, partition key) pair within each
//! silver file. Under [`AggregationMode::PerFile`] those per-file partials
//! are concatenated as they are, so a pair present in two files yields two
//! rows. [`AggregationMode::Summed`] reduces them to one row per pair.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use serde::Serialize;
use tracing::Instrument;

use brewlake_core::layer_paths::{COLUMNAR_EXTENSION, Layer};
use brewlake_core::{RunId, ScratchDir, StorageBackend, stage_span};

use crate::config::{AggregationMode, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::parquet_util;
use crate::stage::{self, StageReport};

const STAGE: &str = "gold";

/// One row of the gold aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    /// Category value (e.g. brewery type).
    pub category: String,
    /// Partition value (e.g. state).
    pub partition_key: String,
    /// Number of rows with this pair; always at least 1.
    pub count: u64,
}

impl AggregateRow {
    fn new(category: &str, partition_key: &str, count: u64) -> Self {
        Self {
            category: category.to_string(),
            partition_key: partition_key.to_string(),
            count,
        }
    }
}

/// Output of a gold run.
#[derive(Debug, Clone, Serialize)]
pub struct GoldSummary {
    /// Aggregate rows in file order.
    pub rows: Vec<AggregateRow>,
    /// Object key of the written aggregate.
    pub object_key: String,
    /// Stage counters.
    pub report: StageReport,
}

type PairCounts = BTreeMap<(String, String), u64>;

/// Builds the gold aggregate from the silver layer.
pub struct Aggregator {
    storage: Arc<dyn StorageBackend>,
    config: PipelineConfig,
}

impl Aggregator {
    /// Creates an aggregator.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    /// Runs the stage.
    ///
    /// # Errors
    ///
    /// - `PipelineError::NoInput` if nothing at all is stored under the silver
    ///   root
    /// - `PipelineError::Schema` if a Parquet file lacks the category or the
    ///   partition column, unless the gold policy is `skip`
    /// - `PipelineError::EmptyResult` if no aggregate row was produced
    /// - `PipelineError::Read`, `Upload`, `Codec` or `Scratch` on I/O failure
    pub async fn run(&self, run_id: RunId) -> Result<GoldSummary> {
        let started = Instant::now();
        let result = async {
            let scratch = self.config.scratch_dir(run_id)?;
            self.run_in(&scratch).await
        }
        .instrument(stage_span(STAGE, run_id))
        .await;

        match &result {
            Ok(summary) => summary.report.finish(STAGE, started.elapsed()),
            Err(err) => stage::fail(STAGE, err),
        }
        result
    }

    async fn run_in(&self, scratch: &ScratchDir) -> Result<GoldSummary> {
        let prefix = self.config.layout.dir(Layer::Silver);
        let candidates =
            stage::list_candidates(self.storage.as_ref(), &prefix, COLUMNAR_EXTENSION).await?;
        if candidates.listed == 0 {
            return Err(PipelineError::NoInput { prefix });
        }

        let mut report = StageReport {
            files_skipped: candidates.skipped,
            ..StageReport::default()
        };

        let mut partials: Vec<PairCounts> = Vec::with_capacity(candidates.keys.len());
        for key in &candidates.keys {
            let bytes = stage::read_object(self.storage.as_ref(), key).await?;
            match self.count_file(key, bytes) {
                Ok((counts, rows)) => {
                    report.files_read += 1;
                    report.rows += rows;
                    tracing::debug!(path = %key, rows, pairs = counts.len(), "counted file");
                    partials.push(counts);
                }
                Err(err) => {
                    stage::on_violation(self.config.gold.on_schema_violation, err, &mut report)?;
                }
            }
        }

        let rows = combine(partials, self.config.aggregation_mode);
        if rows.is_empty() {
            return Err(PipelineError::EmptyResult { prefix });
        }

        let object_key = self.config.layout.gold_file(&self.config.gold_file_name);
        let batch = self.rows_to_batch(&object_key, &rows)?;
        let data = parquet_util::encode_batch(&object_key, &batch)?;
        let local = stage::stage_locally(scratch, &self.config.gold_file_name, &data)?;
        stage::upload_staged(self.storage.as_ref(), scratch, &local, &object_key).await?;

        tracing::info!(
            path = %object_key,
            aggregate_rows = rows.len(),
            mode = ?self.config.aggregation_mode,
            "wrote aggregate"
        );
        report.keys_written.push(object_key.clone());
        Ok(GoldSummary {
            rows,
            object_key,
            report,
        })
    }

    /// Counts rows per (category, partition) pair in one silver file.
    ///
    /// Rows where either cell is null are not counted.
    fn count_file(&self, path: &str, bytes: bytes::Bytes) -> Result<(PairCounts, u64)> {
        let (schema, batches) = parquet_util::read_batches(path, bytes)?;
        let category = &self.config.category_field;
        let partition = &self.config.partition_field;

        let missing: Vec<&str> = [category, partition]
            .into_iter()
            .filter(|name| schema.index_of(name).is_err())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema(
                path,
                format!("missing column(s): {}", missing.join(", ")),
            ));
        }

        let mut counts = PairCounts::new();
        let mut rows = 0;
        for batch in &batches {
            let (Some(categories), Some(partitions)) = (
                batch.column_by_name(category),
                batch.column_by_name(partition),
            ) else {
                return Err(PipelineError::codec(path, "batch schema differs from file schema"));
            };
            rows += batch.num_rows() as u64;
            for row in 0..batch.num_rows() {
                if categories.is_null(row) || partitions.is_null(row) {
                    continue;
                }
                let pair = (
                    cell_text(path, categories, row)?,
                    cell_text(path, partitions, row)?,
                );
                *counts.entry(pair).or_insert(0) += 1;
            }
        }
        Ok((counts, rows))
    }

    fn gold_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new(&self.config.category_field, DataType::Utf8, false),
            Field::new(&self.config.partition_field, DataType::Utf8, false),
            Field::new(&self.config.count_field, DataType::Int64, false),
        ]))
    }

    fn rows_to_batch(&self, path: &str, rows: &[AggregateRow]) -> Result<RecordBatch> {
        let counts = rows
            .iter()
            .map(|r| {
                i64::try_from(r.count)
                    .map_err(|_| PipelineError::codec(path, format!("count {} overflows", r.count)))
            })
            .collect::<Result<Vec<_>>>()?;

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.category.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.partition_key.as_str()),
            )),
            Arc::new(Int64Array::from(counts)),
        ];
        RecordBatch::try_new(self.gold_schema(), columns)
            .map_err(|e| PipelineError::codec(path, format!("record batch build failed: {e}")))
    }
}

fn cell_text(path: &str, column: &ArrayRef, row: usize) -> Result<String> {
    array_value_to_string(column, row)
        .map_err(|e| PipelineError::codec(path, format!("cannot render cell: {e}")))
}

fn combine(partials: Vec<PairCounts>, mode: AggregationMode) -> Vec<AggregateRow> {
    match mode {
        AggregationMode::PerFile => partials
            .iter()
            .flat_map(|counts| {
                counts
                    .iter()
                    .map(|((category, key), count)| AggregateRow::new(category, key, *count))
            })
            .collect(),
        AggregationMode::Summed => {
            let mut total = PairCounts::new();
            for counts in partials {
                for (pair, count) in counts {
                    *total.entry(pair).or_insert(0) += count;
                }
            }
            total
                .iter()
                .map(|((category, key), count)| AggregateRow::new(category, key, *count))
                .collect()
        }
    }
}
