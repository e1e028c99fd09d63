//! Command-line interface for `dxf2geo`, which pulls geometry out of CAD drawings.
//!
//! This binary is a thin façade over [`dxf2geo_core`]: it parses arguments,
//! configures logging, merges flags over an optional TOML config file and
//! delegates to the library.
//!
//! # Available Commands
//!
//! - `extract` - Split a DXF drawing into one vector file per geometry type
//! - `view` - Load extracted files, filter them and write an HTML map
//! - `formats` - List the supported formats and their capabilities

mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tabled::Table;
use tracing::{Level, error, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use dxf2geo_core::drivers::{OutputFormat, get_drivers};
use dxf2geo_core::extract::ExtractionSummary;
use dxf2geo_core::filters::LayerPattern;
use dxf2geo_core::{
    Dxf2GeoError, Extractor, GeometryLoader, GeometryType, PipelineConfig, plot_geometries_with,
};

use crate::display::{DriverRow, display_extraction, display_view};

#[derive(Parser)]
#[command(
    name = "dxf2geo",
    version,
    about = "Extract CAD drawing geometry into GIS vector files",
    long_about = "dxf2geo splits a DXF drawing into one Shapefile or GeoPackage per geometry type\n\
                  using GDAL's ogr2ogr, then loads, cleans and previews the result as an HTML map."
)]
/// Command-line arguments and options for the `dxf2geo` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `dxf2geo` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Extracts each geometry type of a drawing into its own vector file.
    ///
    /// Writes `<output>/<type>/<type>.<ext>` per type plus `<output>/export.log`.
    /// A type that fails is logged and skipped unless `--strict` is given.
    Extract(ExtractArgs),

    /// Loads extracted files, applies filters and writes an interactive HTML map.
    View(ViewArgs),

    /// Lists the supported formats and what each can be used for.
    Formats,
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the source DXF drawing.
    #[arg(short, long, value_name = "DXF")]
    input: PathBuf,

    /// Output directory; must be empty or absent unless `--overwrite` is given.
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Geometry types to extract (e.g., "POINT,LINESTRING").
    #[arg(long, value_name = "TYPE", value_delimiter = ',')]
    types: Vec<GeometryType>,

    /// Output format: "shp" or "gpkg".
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Replace a non-empty output directory.
    #[arg(long)]
    overwrite: bool,

    /// Exit with an error if any type fails or writes no features.
    #[arg(long)]
    strict: bool,

    /// Keep directories for types that wrote no features.
    #[arg(long)]
    keep_empty: bool,

    /// Write every feature to `<output>/all_geometries/all_geometries.gpkg`; GPKG only.
    #[arg(long)]
    flatten: bool,

    /// Keep only these layers (case-insensitive).
    #[arg(long, value_name = "LAYER", value_delimiter = ',')]
    include_layers: Vec<String>,

    /// Drop these layers (case-insensitive); wins over every include rule.
    #[arg(long, value_name = "LAYER", value_delimiter = ',')]
    exclude_layers: Vec<String>,

    /// Keep layers matching this regular expression; may be repeated.
    #[arg(long, value_name = "REGEX")]
    include_layer_pattern: Vec<LayerPattern>,

    /// Drop layers matching this regular expression; may be repeated.
    #[arg(long, value_name = "REGEX")]
    exclude_layer_pattern: Vec<LayerPattern>,

    /// Drop lines shorter than this.
    #[arg(long, value_name = "N")]
    min_length: Option<f64>,

    /// Drop polygons with a smaller area.
    #[arg(long, value_name = "N")]
    min_area: Option<f64>,

    /// Per geometry type time limit for ogr2ogr, in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path to the ogr2ogr executable.
    #[arg(long, value_name = "PATH")]
    ogr2ogr: Option<PathBuf>,

    /// Path to the ogrinfo executable used to check the input.
    #[arg(long, value_name = "PATH")]
    ogrinfo: Option<PathBuf>,

    /// TOML configuration file; flags take precedence over it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ViewArgs {
    /// Extraction output directory, or a single Shapefile or GeoPackage.
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// HTML file to write.
    #[arg(short, long, value_name = "HTML")]
    output: PathBuf,

    /// Keep only modelspace records.
    #[arg(long)]
    modelspace: bool,

    /// Modelspace layer names to keep; implies `--modelspace`.
    #[arg(long, value_name = "LAYER", value_delimiter = ',')]
    layers: Vec<String>,

    /// Drop short horizontal and vertical lines.
    #[arg(long)]
    drop_short_lines: bool,

    /// Length below which an axis-aligned line is dropped; implies `--drop-short-lines`.
    #[arg(long, value_name = "N")]
    max_line_length: Option<f64>,

    /// Allowed deviation from horizontal or vertical, in degrees; implies `--drop-short-lines`.
    #[arg(long, value_name = "DEG")]
    angle_tolerance: Option<f64>,

    /// TOML configuration file; flags take precedence over it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Map title.
    #[arg(long)]
    title: Option<String>,
}

/// Entry point for the `dxf2geo` command-line interface.
///
/// # Errors
///
/// Returns an error if the logging system cannot be initialized. Command
/// failures are reported on stderr and turn into exit code 1.
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true) // Show module paths for better context
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let result = match cli.command {
        Commands::Extract(args) => {
            info!("Extracting {} to {}", args.input.display(), args.output.display());
            handle_extract(args).map(|summary| display_extraction(&summary))
        },
        Commands::View(args) => {
            info!("Viewing {}", args.input.display());
            handle_view(args)
        },
        Commands::Formats => {
            handle_formats();
            Ok(())
        },
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            report(&err);
            Ok(ExitCode::FAILURE)
        },
    }
}

fn report(err: &Dxf2GeoError) {
    error!("{err:?}");
    eprintln!("Error: {}", err.user_message());
    if let Some(suggestion) = err.recovery_suggestion() {
        eprintln!("Hint: {suggestion}");
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Dxf2GeoError> {
    match path {
        Some(path) => {
            info!("Using config {}", path.display());
            Ok(PipelineConfig::load(path)?)
        },
        None => Ok(PipelineConfig::default()),
    }
}

fn handle_extract(args: ExtractArgs) -> Result<ExtractionSummary, Dxf2GeoError> {
    let mut config = load_config(args.config.as_deref())?;
    let extract = &mut config.extract;

    if !args.types.is_empty() {
        extract.options.geometry_types = args.types;
    }
    if let Some(format) = args.format {
        extract.options.format = format;
    }
    extract.options.overwrite |= args.overwrite;
    extract.options.strict |= args.strict;
    extract.options.keep_empty |= args.keep_empty;
    extract.options.flatten |= args.flatten;
    if !args.include_layers.is_empty()
        || !args.exclude_layers.is_empty()
        || !args.include_layer_pattern.is_empty()
        || !args.exclude_layer_pattern.is_empty()
        || args.min_length.is_some()
        || args.min_area.is_some()
    {
        let filters = extract.options.filters.get_or_insert_with(Default::default);
        filters.include_layers.extend(args.include_layers);
        filters.exclude_layers.extend(args.exclude_layers);
        filters.include_layer_patterns.extend(args.include_layer_pattern);
        filters.exclude_layer_patterns.extend(args.exclude_layer_pattern);
        if args.min_length.is_some() {
            filters.min_length = args.min_length;
        }
        if args.min_area.is_some() {
            filters.min_area = args.min_area;
        }
    }
    if args.timeout.is_some() {
        extract.timeout_secs = args.timeout;
    }
    if args.ogr2ogr.is_some() {
        extract.ogr2ogr = args.ogr2ogr;
    }
    if args.ogrinfo.is_some() {
        extract.ogrinfo = args.ogrinfo;
    }
    extract.validate()?;

    Extractor::new(extract.translator(), extract.options.clone()).run(&args.input, &args.output)
}

fn handle_view(args: ViewArgs) -> Result<(), Dxf2GeoError> {
    let mut config = load_config(args.config.as_deref())?;
    let filters = &mut config.filters;

    if args.modelspace || !args.layers.is_empty() {
        let modelspace = filters.modelspace.get_or_insert_with(Default::default);
        if !args.layers.is_empty() {
            modelspace.layers = args.layers.into_iter().collect();
        }
    }
    if args.drop_short_lines || args.max_line_length.is_some() || args.angle_tolerance.is_some() {
        let short_lines = filters.short_lines.get_or_insert_with(Default::default);
        if let Some(max_length) = args.max_line_length {
            short_lines.max_length = max_length;
        }
        if let Some(tolerance) = args.angle_tolerance {
            short_lines.angle_tolerance_deg = tolerance;
        }
    }
    if let Some(title) = args.title {
        config.view.title = title;
    }
    config.filters.validate()?;

    let loaded = GeometryLoader::default().load(&args.input)?;
    let (table, reports) = config.filters.chain().apply(&loaded.table);
    let map = plot_geometries_with(&table, &args.output, &config.view)?;

    display_view(&loaded, &reports, &map);
    Ok(())
}

/// Prints every registered format and its capabilities.
fn handle_formats() {
    let drivers = get_drivers();

    println!("\nFormats ({} total):\n", drivers.len());

    let rows: Vec<DriverRow> = drivers.iter().map(DriverRow::from).collect();
    println!("{}", Table::new(rows));
}
