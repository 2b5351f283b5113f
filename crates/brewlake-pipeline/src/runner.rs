//! Sequential execution of the cleaned, silver and gold stages.

use std::sync::Arc;

use serde::Serialize;

use brewlake_core::{RunId, StorageBackend};

use crate::aggregator::{Aggregator, GoldSummary};
use crate::cleaner::{CleanReport, Cleaner};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::partition_builder::{PartitionBuilder, SilverOutput};

/// Outputs of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    /// Run identifier shared by all stages.
    pub run_id: RunId,
    /// Cleaner report.
    pub clean: CleanReport,
    /// Written partitions.
    pub silver: SilverOutput,
    /// Gold aggregate.
    pub gold: GoldSummary,
}

/// Runs clean, silver and gold in order, stopping at the first failure.
///
/// There is no retry; a failed stage leaves earlier stages' outputs in place.
///
/// # Errors
///
/// Returns the first stage error.
pub async fn run_all(
    storage: Arc<dyn StorageBackend>,
    config: &PipelineConfig,
    run_id: RunId,
) -> Result<PipelineRun> {
    let clean = Cleaner::new(Arc::clone(&storage), config.clone())
        .run(run_id)
        .await?;
    let silver = PartitionBuilder::new(Arc::clone(&storage), config.clone())
        .run(run_id)
        .await?;
    let gold = Aggregator::new(storage, config.clone()).run(run_id).await?;

    Ok(PipelineRun {
        run_id,
        clean,
        silver,
        gold,
    })
}
