//! Canonical storage paths for the medallion layers.
//!
//! This module is the single source of truth for object keys. Stages never
//! format keys themselves.
//!
//! # Path Layout (defaults)
//!
//! ```text
//! bronze_layer/
//! ├── raw/
//! │   └── {source_file}.json
//! └── cleaned/
//!     └── {source_file}.json
//! silver_layer/
//! └── {partition_key}/
//!     └── {dataset}_{partition_key}.parquet
//! golden_layer/
//! └── {aggregate_file}.parquet
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage layers, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Unmodified ingested records.
    Raw,
    /// Normalized records.
    Cleaned,
    /// Partitioned columnar files.
    Silver,
    /// Aggregated summary.
    Gold,
}

impl Layer {
    /// Returns the string name for this layer.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Cleaned => "cleaned",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File extension of row-oriented layers (raw, cleaned).
pub const ROW_EXTENSION: &str = "json";

/// File extension of columnar layers (silver, gold).
pub const COLUMNAR_EXTENSION: &str = "parquet";

/// Root prefixes of every layer.
///
/// # Example
///
/// ```
/// use brewlake_core::layer_paths::LayerLayout;
///
/// let layout = LayerLayout::default();
/// assert_eq!(layout.cleaned_file("bronze_breweries.json"), "bronze_layer/cleaned/bronze_breweries.json");
/// assert_eq!(
///     layout.partition_file("breweries", "ohio"),
///     "silver_layer/ohio/breweries_ohio.parquet"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerLayout {
    /// Raw landing root.
    pub raw_root: String,
    /// Cleaned layer root.
    pub cleaned_root: String,
    /// Silver layer root.
    pub silver_root: String,
    /// Gold layer root.
    pub gold_root: String,
}

impl Default for LayerLayout {
    fn default() -> Self {
        Self {
            raw_root: "bronze_layer/raw".to_string(),
            cleaned_root: "bronze_layer/cleaned".to_string(),
            silver_root: "silver_layer".to_string(),
            gold_root: "golden_layer".to_string(),
        }
    }
}

impl LayerLayout {
    /// Strips leading/trailing slashes and rejects empty or overlapping roots.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any root is empty or two layers share
    /// a root.
    pub fn normalized(mut self) -> Result<Self> {
        for (layer, root) in [
            (Layer::Raw, &mut self.raw_root),
            (Layer::Cleaned, &mut self.cleaned_root),
            (Layer::Silver, &mut self.silver_root),
            (Layer::Gold, &mut self.gold_root),
        ] {
            let trimmed = root.trim().trim_matches('/').to_string();
            if trimmed.is_empty() {
                return Err(Error::InvalidInput(format!("{layer} root cannot be empty")));
            }
            *root = trimmed;
        }

        let roots = [
            &self.raw_root,
            &self.cleaned_root,
            &self.silver_root,
            &self.gold_root,
        ];
        for (i, a) in roots.iter().enumerate() {
            for b in roots.iter().skip(i + 1) {
                if a == b || nested(a, b) || nested(b, a) {
                    return Err(Error::InvalidInput(format!(
                        "layer roots must not overlap: '{a}' and '{b}'"
                    )));
                }
            }
        }
        Ok(self)
    }

    /// Returns the root of a layer.
    #[must_use]
    pub fn root(&self, layer: Layer) -> &str {
        match layer {
            Layer::Raw => &self.raw_root,
            Layer::Cleaned => &self.cleaned_root,
            Layer::Silver => &self.silver_root,
            Layer::Gold => &self.gold_root,
        }
    }

    /// Returns the listing prefix of a layer (root with trailing slash).
    #[must_use]
    pub fn dir(&self, layer: Layer) -> String {
        format!("{}/", self.root(layer))
    }

    /// Returns the raw-layer key for a landed file.
    #[must_use]
    pub fn raw_file(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.raw_root)
    }

    /// Returns the cleaned-layer key for a source file name.
    #[must_use]
    pub fn cleaned_file(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.cleaned_root)
    }

    /// Returns the partition file name, e.g. `breweries_ohio.parquet`.
    #[must_use]
    pub fn partition_file_name(dataset: &str, partition_key: &str) -> String {
        format!("{dataset}_{partition_key}.{COLUMNAR_EXTENSION}")
    }

    /// Returns the path of a partition file relative to the silver root.
    #[must_use]
    pub fn partition_relative(dataset: &str, partition_key: &str) -> String {
        format!(
            "{partition_key}/{}",
            Self::partition_file_name(dataset, partition_key)
        )
    }

    /// Returns the silver-layer key for a partition file.
    #[must_use]
    pub fn partition_file(&self, dataset: &str, partition_key: &str) -> String {
        format!(
            "{}/{}",
            self.silver_root,
            Self::partition_relative(dataset, partition_key)
        )
    }

    /// Returns the gold-layer key for the aggregate file.
    #[must_use]
    pub fn gold_file(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.gold_root)
    }
}

fn nested(parent: &str, child: &str) -> bool {
    child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Returns the final path segment of a key.
#[must_use]
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Returns true if `key` ends with `.{extension}`.
#[must_use]
pub fn has_extension(key: &str, extension: &str) -> bool {
    base_name(key)
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext == extension)
}

/// Validates that `segment` can be used as a single path segment.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the segment is empty, `.`/`..`, or
/// contains a `/` or control character.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.chars().any(char::is_control)
    {
        return Err(Error::InvalidInput(format!(
            "'{segment}' is not a valid path segment"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_documented_keys() {
        let layout = LayerLayout::default();
        assert_eq!(layout.dir(Layer::Raw), "bronze_layer/raw/");
        assert_eq!(
            layout.raw_file("bronze_breweries.json"),
            "bronze_layer/raw/bronze_breweries.json"
        );
        assert_eq!(
            layout.cleaned_file("bronze_breweries.json"),
            "bronze_layer/cleaned/bronze_breweries.json"
        );
        assert_eq!(
            layout.partition_file("breweries", "california"),
            "silver_layer/california/breweries_california.parquet"
        );
        assert_eq!(
            layout.gold_file("brewery_aggregated_by_type_and_location.parquet"),
            "golden_layer/brewery_aggregated_by_type_and_location.parquet"
        );
    }

    #[test]
    fn normalized_trims_slashes() {
        let layout = LayerLayout {
            raw_root: "/landing/raw/".into(),
            ..LayerLayout::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(layout.raw_root, "landing/raw");
    }

    #[test]
    fn normalized_rejects_empty_and_overlapping_roots() {
        let empty = LayerLayout {
            gold_root: " / ".into(),
            ..LayerLayout::default()
        };
        assert!(empty.normalized().is_err());

        let nested_roots = LayerLayout {
            cleaned_root: "bronze_layer/raw/cleaned".into(),
            ..LayerLayout::default()
        };
        assert!(nested_roots.normalized().is_err());

        let shared_prefix_only = LayerLayout {
            cleaned_root: "bronze_layer/raw_cleaned".into(),
            ..LayerLayout::default()
        };
        assert!(shared_prefix_only.normalized().is_ok());
    }

    #[test]
    fn extension_and_base_name() {
        assert!(has_extension("bronze_layer/raw/a.json", "json"));
        assert!(!has_extension("bronze_layer/raw/a.json.tmp", "json"));
        assert!(!has_extension("bronze_layer/raw/.json", "json"));
        assert!(!has_extension("bronze_layer/raw/json", "json"));
        assert_eq!(base_name("a/b/c.parquet"), "c.parquet");
        assert_eq!(base_name("c.parquet"), "c.parquet");
    }

    #[test]
    fn segments_are_validated() {
        assert!(validate_segment("new_york").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("a/b").is_err());
    }
}
