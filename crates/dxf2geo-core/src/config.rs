//! Optional TOML configuration for a whole pipeline run.
//!
//! ```toml
//! [extract]
//! geometry_types = ["POINT", "LINESTRING"]
//! format = "gpkg"
//! timeout_secs = 300
//!
//! [extract.filters]
//! exclude_layer_patterns = ["(?i)^defpoints$"]
//!
//! [filters.modelspace]
//! layers = ["0", "WALLS"]
//!
//! [filters.short_lines]
//! max_length = 0.5
//!
//! [view]
//! title = "Site plan"
//! ```
//!
//! Every section is optional. A filter runs only when its section is present.
//! `[extract.filters]` is applied to the extracted files themselves, while
//! `[filters.*]` only shapes what `view` draws.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extract::ExtractOptions;
use crate::filters::{
    FeatureFilter, FeatureFilterOptions, FilterChain, ModelspaceFilter, ModelspaceOptions,
    ShortLineFilter, ShortLineOptions,
};
use crate::translator::Ogr2Ogr;
use crate::visualise::MapOptions;

/// The `[extract]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    #[serde(flatten)]
    pub options: ExtractOptions,
    /// Per geometry type limit on the translator; unset means no limit
    pub timeout_secs: Option<u64>,
    pub ogr2ogr: Option<PathBuf>,
    pub ogrinfo: Option<PathBuf>,
}

impl ExtractConfig {
    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Builds the `ogr2ogr` translator described by this section.
    #[must_use]
    pub fn translator(&self) -> Ogr2Ogr {
        let mut translator =
            Ogr2Ogr::new().with_timeout(self.timeout_secs.map(Duration::from_secs));
        if let Some(program) = &self.ogr2ogr {
            translator = translator.with_program(program.clone());
        }
        if let Some(ogrinfo) = &self.ogrinfo {
            translator = translator.with_ogrinfo(ogrinfo.clone());
        }
        translator
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for invalid extraction options or a
    /// zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()?;
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidOption {
                option: "timeout_secs".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

/// The `[filters]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub modelspace: Option<ModelspaceOptions>,
    pub short_lines: Option<ShortLineOptions>,
    pub features: Option<FeatureFilterOptions>,
}

impl FilterConfig {
    /// Builds the chain of configured filters.
    ///
    /// Order is features, then modelspace, then short lines.
    #[must_use]
    pub fn chain(&self) -> FilterChain {
        let mut chain = FilterChain::new();
        if let Some(options) = &self.features {
            chain = chain.with(FeatureFilter::new(options.clone()));
        }
        if let Some(options) = &self.modelspace {
            chain = chain.with(ModelspaceFilter::new(options.clone()));
        }
        if let Some(options) = self.short_lines {
            chain = chain.with(ShortLineFilter::new(options));
        }
        chain
    }

    /// # Errors
    ///
    /// Returns the first invalid filter option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(options) = &self.features {
            options.validate()?;
        }
        if let Some(options) = &self.modelspace {
            options.validate()?;
        }
        if let Some(options) = &self.short_lines {
            options.validate()?;
        }
        Ok(())
    }
}

/// A full pipeline configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extract: ExtractConfig,
    pub filters: FilterConfig,
    pub view: MapOptions,
}

impl PipelineConfig {
    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`], [`ConfigError::Parse`] or the first
    /// invalid option.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parses and validates TOML text. `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or the first invalid option.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            toml::from_str(content).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extract.validate()?;
        self.filters.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::OutputFormat;
    use crate::geometry_type::GeometryType;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_default() {
        let config = PipelineConfig::parse("", Path::new("dxf2geo.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.filters.chain().is_empty());
        assert_eq!(config.view.title, "dxf2geo");
    }

    #[test]
    fn test_full_file() {
        let content = r#"
            [extract]
            geometry_types = ["point", "LINESTRING"]
            format = "gpkg"
            strict = true
            timeout_secs = 30
            ogr2ogr = "/opt/gdal/bin/ogr2ogr"

            [filters.modelspace]
            layers = ["0", "WALLS"]

            [filters.short_lines]
            max_length = 0.5

            [filters.features]
            exclude_layers = ["defpoints"]
            bbox = [0.0, 0.0, 100.0, 100.0]

            [view]
            title = "Site plan"
        "#;
        let config = PipelineConfig::parse(content, Path::new("dxf2geo.toml")).unwrap();

        let extract = &config.extract.options;
        assert_eq!(
            extract.geometry_types,
            vec![GeometryType::Point, GeometryType::LineString]
        );
        assert_eq!(extract.format, OutputFormat::GeoPackage);
        assert!(extract.strict);
        assert!(!extract.overwrite);
        assert_eq!(config.extract.timeout_secs, Some(30));

        let modelspace = config.filters.modelspace.as_ref().unwrap();
        assert_eq!(modelspace.layer_field, "Layer");
        assert!(modelspace.layers.contains("WALLS"));

        let short = config.filters.short_lines.unwrap();
        assert!((short.max_length - 0.5).abs() < f64::EPSILON);
        assert!((short.angle_tolerance_deg - 1.0).abs() < f64::EPSILON);

        let features = config.filters.features.as_ref().unwrap();
        assert!(features.drop_empty);
        assert_eq!(features.bbox, Some([0.0, 0.0, 100.0, 100.0]));

        assert_eq!(config.filters.chain().len(), 3);
        assert_eq!(config.view.title, "Site plan");
    }

    #[test]
    fn test_extract_filters_and_flatten() {
        let content = r#"
            [extract]
            format = "gpkg"
            flatten = true

            [extract.filters]
            min_length = 1.0
            exclude_layer_patterns = ["(?i)^tmp$"]
        "#;
        let config = PipelineConfig::parse(content, Path::new("dxf2geo.toml")).unwrap();
        let extract = &config.extract.options;
        assert!(extract.flatten);
        let filters = extract.filters.as_ref().unwrap();
        assert_eq!(filters.min_length, Some(1.0));
        assert_eq!(filters.exclude_layer_patterns[0].as_str(), "(?i)^tmp$");
        assert!(config.filters.features.is_none());
    }

    #[test]
    fn test_flattened_shapefile_is_rejected() {
        let err = PipelineConfig::parse(
            "[extract]\nformat = \"shp\"\nflatten = true\n",
            Path::new("c.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { ref option, .. } if option == "flatten"));
    }

    #[test]
    fn test_bad_layer_pattern_is_parse_error() {
        let err = PipelineConfig::parse(
            "[filters.features]\ninclude_layer_patterns = [\"(\"]\n",
            Path::new("c.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("regular expression"));
    }

    #[test]
    fn test_translator_from_config() {
        let config = ExtractConfig {
            timeout_secs: Some(5),
            ogr2ogr: Some(PathBuf::from("/usr/local/bin/ogr2ogr")),
            ..ExtractConfig::default()
        };
        let translator = config.translator();
        assert_eq!(translator.program(), Path::new("/usr/local/bin/ogr2ogr"));
        assert_eq!(translator.ogrinfo(), Path::new("ogrinfo"));
        assert_eq!(translator.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = PipelineConfig::parse(
            "[filters.short_lines]\nangle_tolerance_deg = 90.0\n",
            Path::new("c.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { .. }));

        let err = PipelineConfig::parse("[extract]\ntimeout_secs = 0\n", Path::new("c.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        let err = PipelineConfig::parse("[extract]\ngeometry_types = []\n", Path::new("c.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("geometry_types"));
    }

    #[test]
    fn test_unknown_geometry_type_is_parse_error() {
        let err = PipelineConfig::parse(
            "[extract]\ngeometry_types = [\"curve\"]\n",
            Path::new("c.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = PipelineConfig::load(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dxf2geo.toml");
        fs::write(&path, "[extract]\nformat = \"shapefile\"\noverwrite = true\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.extract.options.format, OutputFormat::Shapefile);
        assert!(config.extract.options.overwrite);
    }
}
