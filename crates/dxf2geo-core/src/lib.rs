//! `dxf2geo-core` turns CAD drawings into per-geometry-type vector files and
//! back into one in-memory collection for cleaning and viewing.
//!
//! This crate includes:
//! - **Extraction**: [`extract_geometries`] runs an external translator once per
//!   geometry type, writing `<output>/<type>/<type>.<ext>` and an `export.log`.
//! - **Loading**: [`load_geometries`] reads every Shapefile or GeoPackage under
//!   a directory into a [`GeometryTable`].
//! - **Filters**: pure, composable record filters ([`filter_modelspace`],
//!   [`filter_short_axis_aligned_lines`], [`filter_features`]).
//! - **Visualisation**: [`plot_geometries`] writes a self-contained HTML map.
//! - **Driver Registry**: the static list of formats and their capabilities.

pub mod config;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod filters;
pub mod geometry_type;
pub mod loader;
pub mod partition;
pub mod run_log;
pub mod translator;
pub mod types;
pub mod visualise;

pub use config::PipelineConfig;
pub use error::{Dxf2GeoError, Result};
pub use extract::{ExtractOptions, ExtractionSummary, Extractor, extract_geometries};
pub use filters::{
    FilterChain, RecordFilter, filter_features, filter_modelspace,
    filter_short_axis_aligned_lines,
};
pub use geometry_type::{GeometryType, TypeSelection};
pub use loader::{GeometryLoader, load_geometries};
pub use types::{GeometryRecord, GeometryTable};
pub use visualise::{MapOptions, plot_geometries, plot_geometries_with};
