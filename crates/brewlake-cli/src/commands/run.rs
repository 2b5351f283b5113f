//! Run command - every transformation stage in order.

use std::sync::Arc;

use anyhow::Result;

use brewlake_core::{RunId, StorageBackend};
use brewlake_pipeline::{PipelineConfig, run_all};

use crate::OutputFormat;

/// Execute the run command.
///
/// Stops at the first failing stage; there is no retry.
///
/// # Errors
///
/// Returns the first stage error.
pub async fn execute(
    storage: Arc<dyn StorageBackend>,
    config: &PipelineConfig,
    format: OutputFormat,
) -> Result<()> {
    let run_id = RunId::generate();
    let run = run_all(storage, config, run_id).await?;

    match format {
        OutputFormat::Json => super::print_json(&run),
        OutputFormat::Text => {
            println!("Run {run_id} completed");
            println!();
            super::print_report("clean", &run.clean);
            super::print_report("silver", &run.silver.report);
            super::print_report("gold", &run.gold.report);
            super::stages::print_rows(config, &run.gold);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewlake_core::MemoryBackend;
    use brewlake_pipeline::{Lander, row_codec};

    #[tokio::test]
    async fn run_writes_every_layer() {
        let storage = MemoryBackend::new();
        let shared: Arc<dyn StorageBackend> = Arc::new(storage.clone());
        let config = PipelineConfig::default();

        let records = row_codec::decode_raw(
            "page.json",
            br#"[{"name":"A","brewery_type":"micro","state":"Ohio"}]"#,
        )
        .unwrap();
        Lander::new(Arc::clone(&shared), config.layout.clone())
            .land(&records, "page.json")
            .await
            .unwrap();

        execute(shared, &config, OutputFormat::Json).await.unwrap();

        assert_eq!(
            storage.keys(),
            vec![
                "bronze_layer/cleaned/page.json".to_string(),
                "bronze_layer/raw/page.json".to_string(),
                "golden_layer/brewery_aggregated_by_type_and_location.parquet".to_string(),
                "silver_layer/ohio/breweries_ohio.parquet".to_string(),
            ]
        );
    }
}
