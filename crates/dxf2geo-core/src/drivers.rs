//! Driver registry for the formats the pipeline touches.
//!
//! The registry is static and mirrors GDAL/OGR driver names, because those names
//! are passed straight to the translator (`ogr2ogr -f <short_name>`). It records
//! which formats can be given as input, which can be written per geometry type,
//! and which the loader reads back.
//!
//! # Examples
//!
//! ```
//! use dxf2geo_core::drivers::{find_driver, OutputFormat};
//!
//! let gpkg = find_driver("geopackage").expect("GPKG driver should exist");
//! assert!(gpkg.capabilities.load.is_supported());
//!
//! let format: OutputFormat = "shp".parse().unwrap();
//! assert_eq!(format.extension(), "shp");
//! ```

use std::fmt;
use std::str::FromStr;

use dxf2geo_core_common::{VectorReader, VectorRetainer};
pub use dxf2geo_core_common::{Driver, DriverCapabilities, SupportStatus};
use serde::{Deserialize, Serialize};
use vector_gpkg::GpkgReader;
use vector_shapefile::ShapefileReader;

use crate::error::{ConfigError, format_not_found};

const fn caps(input: SupportStatus, extract: SupportStatus, load: SupportStatus) -> DriverCapabilities {
    DriverCapabilities {
        input,
        extract,
        load,
    }
}

/// Returns the complete registry of known drivers.
#[must_use]
pub fn get_drivers() -> Vec<Driver> {
    use SupportStatus::{NotSupported, Supported};

    vec![
        // Source drawing
        Driver::new(
            "DXF",
            "AutoCAD DXF",
            Some("dxf"),
            &["autocad"],
            caps(Supported, NotSupported, NotSupported),
        ),
        // Per-geometry-type outputs
        Driver::new(
            "ESRI Shapefile",
            "ESRI Shapefile / DBF",
            Some("shp"),
            &["shp", "shapefile"],
            caps(NotSupported, Supported, Supported),
        ),
        Driver::new(
            "GPKG",
            "GeoPackage vector",
            Some("gpkg"),
            &["geopackage"],
            caps(NotSupported, Supported, Supported),
        ),
    ]
}

/// Returns drivers with at least one fully supported operation.
#[must_use]
pub fn get_available_drivers() -> Vec<Driver> {
    get_drivers()
        .into_iter()
        .filter(|driver| driver.capabilities.has_supported_operation())
        .collect()
}

/// Finds a driver by short name or alias (case-insensitive).
#[must_use]
pub fn find_driver(name: &str) -> Option<Driver> {
    get_drivers().into_iter().find(|driver| driver.matches(name))
}

/// Short names of every driver with a supported operation.
#[must_use]
pub fn get_driver_names() -> Vec<&'static str> {
    get_available_drivers()
        .iter()
        .map(|driver| driver.short_name)
        .collect()
}

/// Short names of the drivers the translator can write per geometry type.
#[must_use]
pub fn get_output_format_names() -> Vec<&'static str> {
    get_drivers()
        .iter()
        .filter(|driver| driver.capabilities.extract.is_supported())
        .map(|driver| driver.short_name)
        .collect()
}

/// Output format of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    /// One `.shp` (with `.dbf`/`.shx`/`.prj` sidecars) per geometry type
    #[default]
    Shapefile,
    /// One single-table `.gpkg` per geometry type
    GeoPackage,
}

impl OutputFormat {
    /// Every output format, in registry order.
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Shapefile, OutputFormat::GeoPackage];

    /// GDAL/OGR driver name passed to the translator.
    #[must_use]
    pub const fn ogr_driver(self) -> &'static str {
        match self {
            OutputFormat::Shapefile => "ESRI Shapefile",
            OutputFormat::GeoPackage => "GPKG",
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            OutputFormat::Shapefile => "shp",
            OutputFormat::GeoPackage => "gpkg",
        }
    }

    /// Reader used to count and load features written in this format.
    #[must_use]
    pub fn reader(self) -> Box<dyn VectorReader> {
        match self {
            OutputFormat::Shapefile => Box::new(ShapefileReader::new()),
            OutputFormat::GeoPackage => Box::new(GpkgReader::new()),
        }
    }

    /// Removes features from a file written in this format.
    #[must_use]
    pub fn retainer(self) -> Box<dyn VectorRetainer> {
        match self {
            OutputFormat::Shapefile => Box::new(ShapefileReader::new()),
            OutputFormat::GeoPackage => Box::new(GpkgReader::new()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ogr_driver())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|format| {
                find_driver(format.ogr_driver()).is_some_and(|driver| driver.matches(s))
            })
            .ok_or_else(|| format_not_found(s.trim()))
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.ogr_driver().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        let drivers = get_drivers();
        assert_eq!(drivers.len(), 3);
        assert!(drivers.iter().any(|d| d.short_name == "DXF"));
        assert!(drivers.iter().all(|d| d.capabilities.has_any_support()));

        let available = get_driver_names();
        assert_eq!(available, vec!["DXF", "ESRI Shapefile", "GPKG"]);
    }

    #[test]
    fn test_find_driver_by_alias() {
        assert_eq!(find_driver("shapefile").unwrap().short_name, "ESRI Shapefile");
        assert_eq!(find_driver("esri shapefile").unwrap().short_name, "ESRI Shapefile");
        assert_eq!(find_driver("GeoPackage").unwrap().short_name, "GPKG");
        assert!(find_driver("KML").is_none());
    }

    #[test]
    fn test_dxf_is_input_only() {
        let dxf = find_driver("dxf").unwrap();
        assert!(dxf.capabilities.input.is_supported());
        assert!(!dxf.capabilities.extract.is_available());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("gpkg".parse::<OutputFormat>().unwrap(), OutputFormat::GeoPackage);
        assert_eq!("shp".parse::<OutputFormat>().unwrap(), OutputFormat::Shapefile);
        assert_eq!(
            "ESRI Shapefile".parse::<OutputFormat>().unwrap(),
            OutputFormat::Shapefile
        );
        assert!("geojson".parse::<OutputFormat>().is_err());
        assert!("dxf".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_names() {
        assert_eq!(get_output_format_names(), vec!["ESRI Shapefile", "GPKG"]);
        assert_eq!(OutputFormat::default(), OutputFormat::Shapefile);
        assert_eq!(OutputFormat::GeoPackage.reader().extension(), "gpkg");
    }
}
