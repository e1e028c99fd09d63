//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting extraction and viewing results in a human-readable format.

use tabled::{Table, Tabled};

use dxf2geo_core::drivers::Driver;
use dxf2geo_core::extract::ExtractionSummary;
use dxf2geo_core::filters::FilterReport;
use dxf2geo_core::loader::LoadOutcome;
use dxf2geo_core::run_log::ExtractStatus;
use dxf2geo_core::visualise::MapSummary;

/// Table row representation for displaying driver information.
#[derive(Tabled)]
pub struct DriverRow {
    /// Short identifier for the driver (e.g., `GPKG`).
    #[tabled(rename = "Short Name")]
    pub short_name: String,
    /// Full descriptive name of the driver format.
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    /// Whether the translator accepts this format as a drawing.
    #[tabled(rename = "Input")]
    pub input: String,
    /// Whether extraction can write this format.
    #[tabled(rename = "Extract")]
    pub extract: String,
    /// Whether the loader can read this format back.
    #[tabled(rename = "Load")]
    pub load: String,
}

impl From<&Driver> for DriverRow {
    fn from(driver: &Driver) -> Self {
        Self {
            short_name: driver.short_name.to_string(),
            long_name: driver.long_name.to_string(),
            input: driver.capabilities.input.as_str().to_string(),
            extract: driver.capabilities.extract.as_str().to_string(),
            load: driver.capabilities.load.as_str().to_string(),
        }
    }
}

/// One requested geometry type in an extraction summary.
#[derive(Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "Geometry")]
    pub geometry_type: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Features")]
    pub features: usize,
    #[tabled(rename = "Time (ms)")]
    pub elapsed_ms: u64,
    /// Output file, or the failure detail
    #[tabled(rename = "Output")]
    pub output: String,
}

/// One step of a filter chain.
#[derive(Tabled)]
pub struct FilterRow {
    #[tabled(rename = "Filter")]
    pub name: String,
    #[tabled(rename = "Before")]
    pub before: usize,
    #[tabled(rename = "After")]
    pub after: usize,
    #[tabled(rename = "Removed")]
    pub removed: usize,
}

/// Features drawn per geometry type.
#[derive(Tabled)]
pub struct LayerRow {
    #[tabled(rename = "Layer")]
    pub geometry_type: String,
    #[tabled(rename = "Features")]
    pub features: usize,
}

/// Rows for an extraction summary, in request order.
#[must_use]
pub fn outcome_rows(summary: &ExtractionSummary) -> Vec<OutcomeRow> {
    summary
        .outcomes
        .iter()
        .map(|outcome| {
            let output = match (&outcome.output, &outcome.error) {
                (_, Some(error)) => first_line(error).to_string(),
                (Some(path), None) => path.display().to_string(),
                (None, None) => "-".to_string(),
            };
            let status = match outcome.status {
                ExtractStatus::Succeeded if outcome.feature_count == 0 => "empty",
                ExtractStatus::Succeeded => "ok",
                ExtractStatus::Failed => "failed",
            };
            OutcomeRow {
                geometry_type: outcome.geometry_type.to_string(),
                status: status.to_string(),
                features: outcome.feature_count,
                elapsed_ms: outcome.elapsed_ms,
                output,
            }
        })
        .collect()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Display the result of an extraction run.
pub fn display_extraction(summary: &ExtractionSummary) {
    println!(
        "\nExtracted {} to {} ({})\n",
        summary.input.display(),
        summary.output_dir.display(),
        summary.format
    );
    println!("{}", Table::new(outcome_rows(summary)));
    println!(
        "\n{} succeeded, {} failed, {} feature(s) total. Log: {}",
        summary.succeeded(),
        summary.failed(),
        summary.total_features(),
        summary.log_path.display()
    );
}

/// Display what was loaded, filtered and drawn.
pub fn display_view(loaded: &LoadOutcome, reports: &[FilterReport], map: &MapSummary) {
    println!(
        "\nLoaded {} record(s) from {} file(s)",
        loaded.table.len(),
        loaded.files.len()
    );
    if !loaded.invalid.is_empty() {
        println!("Dropped {} invalid record(s)", loaded.invalid.len());
    }

    if !reports.is_empty() {
        println!("\n=== Filters ===");
        let rows: Vec<FilterRow> = reports
            .iter()
            .map(|report| FilterRow {
                name: report.name.to_string(),
                before: report.before,
                after: report.after,
                removed: report.removed(),
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    if !map.layers.is_empty() {
        println!("\n=== Layers ===");
        let rows: Vec<LayerRow> = map
            .layers
            .iter()
            .map(|(ty, features)| LayerRow {
                geometry_type: ty.to_string(),
                features: *features,
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    println!("\nWrote {} feature(s) to {}", map.total(), map.path.display());
}
