//! Shared test utilities for brewlake integration tests.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: In-memory storage with operation recording and
//!   failure injection
//! - Brewery fixtures and layer seeding helpers
//! - Custom assertion helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use brewlake_test_utils::{TracingMemoryBackend, first_page, seed_raw};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let storage = TracingMemoryBackend::new();
//!     seed_raw(&storage, &LayerLayout::default(), "page_1.json", &first_page()).await;
//!     // ... run a stage ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod storage;

pub use assertions::*;
pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("brewlake=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
