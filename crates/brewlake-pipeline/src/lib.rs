//! # brewlake-pipeline
//!
//! Layer transformations of the brewlake medallion pipeline.
//!
//! - **Lander**: writes fetched raw batches into the raw layer
//! - **Cleaner**: normalizes raw records into the cleaned layer
//! - **Partition Builder**: reshapes cleaned records into one Parquet file per
//!   partition key (silver)
//! - **Aggregator**: counts records per (category, partition key) into one
//!   Parquet file (gold)
//!
//! ## Storage Layout
//!
//! ```text
//! bronze_layer/
//! ├── raw/                 # Lander output (JSON arrays)
//! └── cleaned/             # Cleaner output, same base names
//! silver_layer/
//! └── {key}/{dataset}_{key}.parquet
//! golden_layer/
//! └── brewery_aggregated_by_type_and_location.parquet
//! ```
//!
//! Stages are independent and stateless between invocations; the caller
//! sequences them (see [`run_all`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use brewlake_core::{MemoryBackend, RunId};
//! use brewlake_pipeline::{PipelineConfig, run_all};
//!
//! let storage = Arc::new(MemoryBackend::new());
//! let config = PipelineConfig::default().validate()?;
//! let run = run_all(storage, &config, RunId::generate()).await?;
//! println!("{} aggregate rows", run.gold.rows.len());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod aggregator;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod lander;
pub mod metrics;
pub mod parquet_util;
pub mod partition_builder;
pub mod row_codec;
pub mod runner;
pub mod stage;

pub use aggregator::{AggregateRow, Aggregator, GoldSummary};
pub use cleaner::{CleanReport, Cleaner, clean};
pub use config::{AggregationMode, PipelineConfig, SchemaViolationPolicy, StageOptions};
pub use error::{PipelineError, Result};
pub use lander::Lander;
pub use partition_builder::{PartitionBuilder, PartitionFile, PartitionKey, SilverOutput};
pub use row_codec::RawRecord;
pub use runner::{PipelineRun, run_all};
pub use stage::StageReport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregator::{AggregateRow, Aggregator, GoldSummary};
    pub use crate::cleaner::{Cleaner, clean};
    pub use crate::config::{AggregationMode, PipelineConfig, SchemaViolationPolicy};
    pub use crate::error::{PipelineError, Result};
    pub use crate::lander::Lander;
    pub use crate::partition_builder::{PartitionBuilder, PartitionKey};
    pub use crate::runner::run_all;
}
