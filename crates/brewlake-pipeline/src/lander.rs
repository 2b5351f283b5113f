//! Landing of fetched batches into the raw layer.

use std::sync::Arc;

use brewlake_core::layer_paths::{LayerLayout, ROW_EXTENSION, has_extension, validate_segment};
use brewlake_core::{Error, StorageBackend};

use crate::error::{PipelineError, Result};
use crate::row_codec::{self, RawRecord};

/// Writes already-fetched raw batches under the raw-layer prefix.
pub struct Lander {
    storage: Arc<dyn StorageBackend>,
    layout: LayerLayout,
}

impl Lander {
    /// Creates a lander writing into `layout`'s raw root.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, layout: LayerLayout) -> Self {
        Self { storage, layout }
    }

    /// Serializes `records` as one JSON array at `<raw_root>/<file_name>`.
    ///
    /// Returns the written key. An existing object is overwritten.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Core(Error::InvalidInput)` if `file_name` is not a
    ///   single segment ending in `.json`
    /// - `PipelineError::Upload` if the put fails
    pub async fn land(&self, records: &[RawRecord], file_name: &str) -> Result<String> {
        validate_segment(file_name)?;
        if !has_extension(file_name, ROW_EXTENSION) {
            return Err(Error::InvalidInput(format!(
                "raw file name must end with .{ROW_EXTENSION}: {file_name}"
            ))
            .into());
        }

        let key = self.layout.raw_file(file_name);
        let data = row_codec::encode_raw(&key, records)?;
        let size = data.len();
        self.storage
            .put(&key, data)
            .await
            .map_err(|source| PipelineError::Upload {
                path: key.clone(),
                source,
            })?;

        tracing::info!(path = %key, records = records.len(), size, "landed raw batch");
        Ok(key)
    }
}
