//! Land command - write a fetched batch into the raw layer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use brewlake_core::StorageBackend;
use brewlake_pipeline::{Lander, PipelineConfig, row_codec};

use crate::OutputFormat;

/// Arguments for the land command.
#[derive(Debug, Args)]
pub struct LandArgs {
    /// Local JSON file holding an array of records.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Raw-layer file name (defaults to the input's file name).
    #[arg(long)]
    pub file_name: Option<String>,
}

/// Execute the land command.
///
/// # Errors
///
/// Returns an error if the input cannot be read or is not a JSON array of
/// objects, or if the upload fails.
pub async fn execute(
    args: LandArgs,
    storage: Arc<dyn StorageBackend>,
    config: &PipelineConfig,
    format: OutputFormat,
) -> Result<()> {
    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let source = args.input.display().to_string();
    let records = row_codec::decode_raw(&source, &data)?;

    let file_name = match args.file_name {
        Some(name) => name,
        None => args
            .input
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .context("Input path has no file name; pass --file-name")?,
    };

    let key = Lander::new(storage, config.layout.clone())
        .land(&records, &file_name)
        .await?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "key": key,
            "records": records.len(),
        })),
        OutputFormat::Text => {
            println!("Landed {} records at {key}", records.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewlake_core::MemoryBackend;

    #[tokio::test]
    async fn land_uses_input_file_name_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("breweries_p1.json");
        std::fs::write(&input, br#"[{"name":"Brew Co","state":"Ohio"}]"#).unwrap();

        let storage = MemoryBackend::new();
        let args = LandArgs {
            input,
            file_name: None,
        };
        execute(
            args,
            Arc::new(storage.clone()),
            &PipelineConfig::default(),
            OutputFormat::Text,
        )
        .await
        .unwrap();

        assert_eq!(
            storage.keys(),
            vec!["bronze_layer/raw/breweries_p1.json".to_string()]
        );
    }
}
