//! Error types for pipeline stages.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can abort a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required source prefix yielded no candidate files.
    #[error("no input files found under '{prefix}'")]
    NoInput {
        /// The prefix that was listed.
        prefix: String,
    },

    /// A decoded batch lacks a field required by the stage.
    #[error("schema error in '{path}': {message}")]
    Schema {
        /// The offending object key.
        path: String,
        /// What was missing or invalid.
        message: String,
    },

    /// All inputs were read but produced no output rows.
    #[error("no aggregate rows produced from '{prefix}'")]
    EmptyResult {
        /// The prefix that was aggregated.
        prefix: String,
    },

    /// Listing a prefix failed.
    #[error("failed to list '{prefix}'")]
    List {
        /// The prefix that was listed.
        prefix: String,
        /// Underlying storage error.
        #[source]
        source: brewlake_core::Error,
    },

    /// Reading an object failed.
    #[error("failed to read '{path}'")]
    Read {
        /// The object key.
        path: String,
        /// Underlying storage error.
        #[source]
        source: brewlake_core::Error,
    },

    /// Uploading an object failed.
    #[error("failed to upload '{path}'")]
    Upload {
        /// The target object key.
        path: String,
        /// Underlying storage error.
        #[source]
        source: brewlake_core::Error,
    },

    /// Encoding or decoding a file failed.
    #[error("codec error for '{path}': {message}")]
    Codec {
        /// The object key or local path.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// Local scratch I/O failed.
    #[error("scratch I/O failed for '{}'", path.display())]
    Scratch {
        /// The local path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: brewlake_core::Error,
    },

    /// Error from a core primitive (config, scratch creation).
    #[error(transparent)]
    Core(#[from] brewlake_core::Error),
}

impl PipelineError {
    /// Creates a schema error for `path`.
    #[must_use]
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a codec error for `path`.
    #[must_use]
    pub fn codec(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used as a metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoInput { .. } => "no_input",
            Self::Schema { .. } => "schema",
            Self::EmptyResult { .. } => "empty_result",
            Self::List { .. } => "list",
            Self::Read { .. } => "read",
            Self::Upload { .. } => "upload",
            Self::Codec { .. } => "codec",
            Self::Scratch { .. } => "scratch",
            Self::Core(_) => "core",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn upload_error_keeps_key_and_cause() {
        let err = PipelineError::Upload {
            path: "silver_layer/ca/breweries_ca.parquet".into(),
            source: brewlake_core::Error::storage("connection reset"),
        };
        assert_eq!(
            err.to_string(),
            "failed to upload 'silver_layer/ca/breweries_ca.parquet'"
        );
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("storage error: connection reset")
        );
        assert_eq!(err.kind(), "upload");
    }

    #[test]
    fn no_input_names_prefix() {
        let err = PipelineError::NoInput {
            prefix: "bronze_layer/cleaned/".into(),
        };
        assert!(err.to_string().contains("bronze_layer/cleaned/"));
    }
}
