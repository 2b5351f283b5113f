//! Environment variable helpers for configuration loading.
//!
//! Blank values are treated as unset. Present-but-unparseable values are
//! errors, never silently ignored.

use std::path::PathBuf;

use crate::error::Result;

/// Reads a trimmed, non-empty environment variable.
#[must_use]
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Reads a path-valued environment variable.
#[must_use]
pub fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

/// Reads an environment variable and parses it with `parse`.
///
/// # Errors
///
/// Returns the parse error if the variable is set but invalid.
pub fn env_parsed<T>(
    name: &str,
    parse: impl FnOnce(&str, &str) -> Result<T>,
) -> Result<Option<T>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse(name, &v).map(Some)
}
