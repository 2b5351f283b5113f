//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use brewlake_core::env::{env_parsed, env_path, env_string};
use brewlake_core::layer_paths::{COLUMNAR_EXTENSION, LayerLayout, has_extension, validate_segment};
use brewlake_core::{Error, Result, RunId, ScratchDir};

/// What a stage does with a file that violates its schema contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaViolationPolicy {
    /// Fail the whole stage with a schema error.
    #[default]
    Abort,
    /// Log the file, exclude it, and continue.
    Skip,
}

impl SchemaViolationPolicy {
    fn parse(name: &str, value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(Error::InvalidInput(format!(
                "{name} must be one of: abort, skip (got {value})"
            ))),
        }
    }
}

/// How the gold stage accounts rows that share a (category, key) pair
/// across silver files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One row per pair per silver file; partials are concatenated, not
    /// re-summed.
    #[default]
    PerFile,
    /// One row per pair; counts are summed across files.
    Summed,
}

impl AggregationMode {
    fn parse(name: &str, value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per_file" | "per-file" => Ok(Self::PerFile),
            "summed" => Ok(Self::Summed),
            _ => Err(Error::InvalidInput(format!(
                "{name} must be one of: per_file, summed (got {value})"
            ))),
        }
    }
}

/// Per-stage options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Schema violation handling for this stage.
    pub on_schema_violation: SchemaViolationPolicy,
}

/// Configuration shared by all stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Layer roots.
    pub layout: LayerLayout,
    /// Field every cleaned record must carry; silver files are split by it.
    pub partition_field: String,
    /// Category dimension of the gold aggregate.
    pub category_field: String,
    /// Name of the count column in the gold file.
    pub count_field: String,
    /// Dataset name used in partition file names.
    pub dataset_name: String,
    /// File name of the gold aggregate.
    pub gold_file_name: String,
    /// Cleaner options.
    pub cleaner: StageOptions,
    /// Partition builder options.
    pub silver: StageOptions,
    /// Aggregator options.
    pub gold: StageOptions,
    /// Gold-stage cross-file accounting.
    pub aggregation_mode: AggregationMode,
    /// Parent directory for run scratch directories (system temp if unset).
    pub scratch_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: LayerLayout::default(),
            partition_field: "state".to_string(),
            category_field: "brewery_type".to_string(),
            count_field: "brewery_count".to_string(),
            dataset_name: "breweries".to_string(),
            gold_file_name: "brewery_aggregated_by_type_and_location.parquet".to_string(),
            cleaner: StageOptions::default(),
            silver: StageOptions::default(),
            gold: StageOptions::default(),
            aggregation_mode: AggregationMode::default(),
            scratch_root: None,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from environment variables on top of defaults.
    ///
    /// Supported variables:
    /// - `BREWLAKE_RAW_ROOT`, `BREWLAKE_CLEANED_ROOT`, `BREWLAKE_SILVER_ROOT`,
    ///   `BREWLAKE_GOLD_ROOT`
    /// - `BREWLAKE_PARTITION_FIELD` (default: `state`)
    /// - `BREWLAKE_CATEGORY_FIELD` (default: `brewery_type`)
    /// - `BREWLAKE_DATASET_NAME` (default: `breweries`)
    /// - `BREWLAKE_GOLD_FILE`
    /// - `BREWLAKE_CLEAN_ON_SCHEMA_VIOLATION`, `BREWLAKE_SILVER_ON_SCHEMA_VIOLATION`,
    ///   `BREWLAKE_GOLD_ON_SCHEMA_VIOLATION` (`abort` | `skip`)
    /// - `BREWLAKE_AGGREGATION_MODE` (`per_file` | `summed`)
    /// - `BREWLAKE_SCRATCH_ROOT`
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid, or if the
    /// resulting configuration fails [`PipelineConfig::validate`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = env_string("BREWLAKE_RAW_ROOT") {
            config.layout.raw_root = root;
        }
        if let Some(root) = env_string("BREWLAKE_CLEANED_ROOT") {
            config.layout.cleaned_root = root;
        }
        if let Some(root) = env_string("BREWLAKE_SILVER_ROOT") {
            config.layout.silver_root = root;
        }
        if let Some(root) = env_string("BREWLAKE_GOLD_ROOT") {
            config.layout.gold_root = root;
        }
        if let Some(field) = env_string("BREWLAKE_PARTITION_FIELD") {
            config.partition_field = field;
        }
        if let Some(field) = env_string("BREWLAKE_CATEGORY_FIELD") {
            config.category_field = field;
        }
        if let Some(name) = env_string("BREWLAKE_DATASET_NAME") {
            config.dataset_name = name;
        }
        if let Some(name) = env_string("BREWLAKE_GOLD_FILE") {
            config.gold_file_name = name;
        }
        if let Some(policy) = env_parsed(
            "BREWLAKE_CLEAN_ON_SCHEMA_VIOLATION",
            SchemaViolationPolicy::parse,
        )? {
            config.cleaner.on_schema_violation = policy;
        }
        if let Some(policy) = env_parsed(
            "BREWLAKE_SILVER_ON_SCHEMA_VIOLATION",
            SchemaViolationPolicy::parse,
        )? {
            config.silver.on_schema_violation = policy;
        }
        if let Some(policy) =
            env_parsed("BREWLAKE_GOLD_ON_SCHEMA_VIOLATION", SchemaViolationPolicy::parse)?
        {
            config.gold.on_schema_violation = policy;
        }
        if let Some(mode) = env_parsed("BREWLAKE_AGGREGATION_MODE", AggregationMode::parse)? {
            config.aggregation_mode = mode;
        }
        config.scratch_root = env_path("BREWLAKE_SCRATCH_ROOT");

        config.validate()
    }

    /// Normalizes layer roots and checks names.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for empty field names, a dataset name
    /// that is not a path segment, or a gold file without the columnar
    /// extension.
    pub fn validate(mut self) -> Result<Self> {
        self.layout = self.layout.normalized()?;

        for (name, value) in [
            ("partition_field", &self.partition_field),
            ("category_field", &self.category_field),
            ("count_field", &self.count_field),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!("{name} cannot be empty")));
            }
        }
        if self.count_field == self.category_field || self.count_field == self.partition_field {
            return Err(Error::InvalidInput(format!(
                "count_field '{}' collides with a dimension field",
                self.count_field
            )));
        }

        validate_segment(&self.dataset_name)?;
        validate_segment(&self.gold_file_name)?;
        if !has_extension(&self.gold_file_name, COLUMNAR_EXTENSION) {
            return Err(Error::InvalidInput(format!(
                "gold_file_name must end with .{COLUMNAR_EXTENSION}"
            )));
        }
        Ok(self)
    }

    /// Creates the scratch directory for one stage run.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn scratch_dir(&self, run_id: RunId) -> Result<ScratchDir> {
        ScratchDir::create(self.scratch_root.as_deref(), run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default().validate().expect("valid");
        assert_eq!(config.partition_field, "state");
        assert_eq!(config.category_field, "brewery_type");
        assert_eq!(config.silver.on_schema_violation, SchemaViolationPolicy::Abort);
        assert_eq!(config.aggregation_mode, AggregationMode::PerFile);
    }

    #[test]
    fn validate_rejects_bad_names() {
        let config = PipelineConfig {
            partition_field: " ".into(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            gold_file_name: "summary.csv".into(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            dataset_name: "a/b".into(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            count_field: "state".into(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn policies_parse() {
        assert_eq!(
            SchemaViolationPolicy::parse("X", "SKIP").unwrap(),
            SchemaViolationPolicy::Skip
        );
        assert!(SchemaViolationPolicy::parse("X", "ignore").is_err());
        assert_eq!(
            AggregationMode::parse("X", "summed").unwrap(),
            AggregationMode::Summed
        );
        assert_eq!(
            AggregationMode::parse("X", "per-file").unwrap(),
            AggregationMode::PerFile
        );
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"dataset_name":"pubs","gold":{"on_schema_violation":"skip"},"aggregation_mode":"summed"}"#,
        )
        .unwrap();
        assert_eq!(config.dataset_name, "pubs");
        assert_eq!(config.gold.on_schema_violation, SchemaViolationPolicy::Skip);
        assert_eq!(config.aggregation_mode, AggregationMode::Summed);
        assert_eq!(config.partition_field, "state");
    }
}
