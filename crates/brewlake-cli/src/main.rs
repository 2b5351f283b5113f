//! brewlake CLI - the `brewlake` binary.

use anyhow::Result;
use clap::Parser;

use brewlake_cli::commands::{land, run, stages};
use brewlake_cli::{Cli, Commands};
use brewlake_core::init_logging;
use brewlake_pipeline::PipelineConfig;
use brewlake_pipeline::metrics::register_metrics;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);
    register_metrics();

    let config = PipelineConfig::from_env()?;
    let storage = cli.storage()?;
    let format = cli.format;
    tracing::debug!(store_url = %cli.store_url, ?config, "configuration loaded");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Land(args) => land::execute(args, storage, &config, format).await,
            Commands::Clean => stages::clean(storage, &config, format).await,
            Commands::Silver => stages::silver(storage, &config, format).await,
            Commands::Gold => stages::gold(storage, &config, format).await,
            Commands::Run => run::execute(storage, &config, format).await,
        }
    })
}
