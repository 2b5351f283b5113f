//! # brewlake-core
//!
//! Core abstractions for the brewlake medallion pipeline.
//!
//! This crate provides the foundational types used by every stage:
//!
//! - **Storage**: the [`StorageBackend`] trait plus memory and `object_store`
//!   backed implementations
//! - **Records**: the schema-on-read [`Record`] / [`FieldValue`] model
//! - **Layer Paths**: the single source of truth for object keys
//! - **Scratch Space**: run-scoped temporary directories
//! - **Observability**: logging initialization and stage spans
//!
//! ## Example
//!
//! ```rust
//! use brewlake_core::prelude::*;
//!
//! let layout = LayerLayout::default();
//! let run_id = RunId::generate();
//! let scratch = ScratchDir::create(None, run_id).expect("scratch");
//! assert!(scratch.path().exists());
//! assert_eq!(layout.dir(Layer::Silver), "silver_layer/");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod env;
pub mod error;
pub mod id;
pub mod layer_paths;
pub mod observability;
pub mod record;
pub mod scratch;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::RunId;
    pub use crate::layer_paths::{Layer, LayerLayout};
    pub use crate::record::{FieldValue, Record};
    pub use crate::scratch::ScratchDir;
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, ObjectStoreBackend, S3Settings, StorageBackend,
    };
}

pub use error::{Error, Result};
pub use id::RunId;
pub use layer_paths::{Layer, LayerLayout};
pub use observability::{LogFormat, init_logging, stage_span};
pub use record::{FieldValue, Record};
pub use scratch::ScratchDir;
pub use storage::{MemoryBackend, ObjectMeta, ObjectStoreBackend, S3Settings, StorageBackend};
