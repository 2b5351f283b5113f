//! Single-stage commands: clean, silver and gold.

use std::sync::Arc;

use anyhow::Result;

use brewlake_core::{RunId, StorageBackend};
use brewlake_pipeline::{Aggregator, Cleaner, GoldSummary, PartitionBuilder, PipelineConfig};

use crate::OutputFormat;

/// Execute the clean command.
///
/// # Errors
///
/// Returns the stage error.
pub async fn clean(
    storage: Arc<dyn StorageBackend>,
    config: &PipelineConfig,
    format: OutputFormat,
) -> Result<()> {
    let report = Cleaner::new(storage, config.clone())
        .run(RunId::generate())
        .await?;
    super::emit_report(format, "clean", &report)
}

/// Execute the silver command.
///
/// # Errors
///
/// Returns the stage error.
pub async fn silver(
    storage: Arc<dyn StorageBackend>,
    config: &PipelineConfig,
    format: OutputFormat,
) -> Result<()> {
    let output = PartitionBuilder::new(storage, config.clone())
        .run(RunId::generate())
        .await?;
    match format {
        OutputFormat::Json => super::print_json(&output),
        OutputFormat::Text => {
            super::print_report("silver", &output.report);
            for partition in output.partitions.values() {
                println!("  {:<24} {:>8} rows", partition.key.as_str(), partition.rows);
            }
            Ok(())
        }
    }
}

/// Execute the gold command.
///
/// # Errors
///
/// Returns the stage error.
pub async fn gold(
    storage: Arc<dyn StorageBackend>,
    config: &PipelineConfig,
    format: OutputFormat,
) -> Result<()> {
    let summary = Aggregator::new(storage, config.clone())
        .run(RunId::generate())
        .await?;
    match format {
        OutputFormat::Json => super::print_json(&summary),
        OutputFormat::Text => {
            super::print_report("gold", &summary.report);
            print_rows(config, &summary);
            Ok(())
        }
    }
}

pub(crate) fn print_rows(config: &PipelineConfig, summary: &GoldSummary) {
    println!(
        "  {:<16} {:<24} {:>8}",
        config.category_field, config.partition_field, config.count_field
    );
    for row in &summary.rows {
        println!(
            "  {:<16} {:<24} {:>8}",
            row.category, row.partition_key, row.count
        );
    }
}
