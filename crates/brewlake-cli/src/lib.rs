//! # brewlake-cli
//!
//! Command-line interface for the brewlake pipeline.
//!
//! ## Commands
//!
//! - `brewlake land` - Land a fetched JSON batch in the raw layer
//! - `brewlake clean` - Raw layer to cleaned layer
//! - `brewlake silver` - Cleaned layer to partitioned Parquet
//! - `brewlake gold` - Partitioned Parquet to the aggregate file
//! - `brewlake run` - `clean`, `silver` and `gold` in order
//!
//! ## Configuration
//!
//! Store settings come from flags or environment variables:
//!
//! - `BREWLAKE_STORE_URL` - `memory://`, `file:///dir` or `s3://bucket`
//! - `BREWLAKE_S3_ENDPOINT`, `BREWLAKE_S3_ACCESS_KEY`,
//!   `BREWLAKE_S3_SECRET_KEY`, `BREWLAKE_S3_REGION` - S3/MinIO settings
//! - `BREWLAKE_LOG_FORMAT` - `pretty` or `json`
//!
//! Pipeline settings (layer roots, field names, policies) are read from the
//! `BREWLAKE_*` variables documented on `PipelineConfig::from_env`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use brewlake_core::{LogFormat, ObjectStoreBackend, S3Settings, StorageBackend};

/// brewlake - medallion pipeline for brewery records.
#[derive(Debug, Parser)]
#[command(name = "brewlake")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Object store URL.
    #[arg(long, env = "BREWLAKE_STORE_URL")]
    pub store_url: String,

    /// S3-compatible endpoint, e.g. `http://minio:9000`.
    #[arg(long, env = "BREWLAKE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// S3 access key id.
    #[arg(long, env = "BREWLAKE_S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,

    /// S3 secret access key.
    #[arg(long, env = "BREWLAKE_S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    /// S3 region.
    #[arg(long, env = "BREWLAKE_S3_REGION")]
    pub s3_region: Option<String>,

    /// Log output format (`pretty` or `json`).
    #[arg(long, env = "BREWLAKE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// S3 settings assembled from flags.
    #[must_use]
    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            endpoint: self.s3_endpoint.clone(),
            access_key: self.s3_access_key.clone(),
            secret_key: self.s3_secret_key.clone(),
            region: self.s3_region.clone(),
        }
    }

    /// Opens the configured object store.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unsupported or S3 settings are
    /// incomplete.
    pub fn storage(&self) -> Result<Arc<dyn StorageBackend>> {
        let backend = ObjectStoreBackend::from_url(&self.store_url, &self.s3_settings())
            .with_context(|| format!("Failed to open store {}", self.store_url))?;
        Ok(Arc::new(backend))
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Land a fetched JSON batch in the raw layer.
    Land(commands::land::LandArgs),
    /// Clean raw files into the cleaned layer.
    Clean,
    /// Partition cleaned records into the silver layer.
    Silver,
    /// Aggregate the silver layer into the gold file.
    Gold,
    /// Run clean, silver and gold in order.
    Run,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}
