//! CLI command implementations.

pub mod land;
pub mod run;
pub mod stages;

use anyhow::{Context, Result};
use serde::Serialize;

use brewlake_pipeline::StageReport;

use crate::OutputFormat;

/// Prints `value` as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Prints the counters of one stage.
pub fn print_report(stage: &str, report: &StageReport) {
    println!("{stage}:");
    println!("  Files read:    {}", report.files_read);
    println!("  Files skipped: {}", report.files_skipped);
    println!("  Rows:          {}", report.rows);
    println!("  Written:       {}", report.keys_written.len());
    for key in &report.keys_written {
        println!("    {key}");
    }
}

/// Prints `report` in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn emit_report(format: OutputFormat, stage: &str, report: &StageReport) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            print_report(stage, report);
            Ok(())
        }
    }
}
