//! Driver definitions for the formats `dxf2geo` reads and writes.
//!
//! A driver names a vector format and states what the pipeline can do with it:
//! hand it to the translator as input, have the translator write it, or read it
//! back with the loader. The registry itself lives in `dxf2geo-core`.

/// Support status for a specific driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// The feature is fully supported and implemented.
    Supported,
    /// The feature is not supported by the driver.
    NotSupported,
    /// The feature is planned for future implementation.
    Planned,
}

impl SupportStatus {
    /// Returns `true` if the operation is fully supported and implemented.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportStatus::Supported)
    }

    /// Returns `true` if the operation is supported or planned (i.e., not explicitly unsupported).
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, SupportStatus::NotSupported)
    }

    /// Returns the string representation of this support status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::NotSupported => "Not Supported",
            SupportStatus::Planned => "Planned",
        }
    }
}

/// Capabilities of a driver within the extraction pipeline.
#[derive(Debug, Clone, Copy)]
pub struct DriverCapabilities {
    /// The translator can read this format as a source drawing.
    pub input: SupportStatus,
    /// The translator can write per-geometry-type outputs in this format.
    pub extract: SupportStatus,
    /// The loader can read this format back into a geometry table.
    pub load: SupportStatus,
}

impl DriverCapabilities {
    /// Returns `true` if at least one operation is supported or planned.
    #[must_use]
    pub fn has_any_support(&self) -> bool {
        self.input.is_available() || self.extract.is_available() || self.load.is_available()
    }

    /// Returns `true` if at least one operation is fully supported and implemented.
    #[must_use]
    pub fn has_supported_operation(&self) -> bool {
        self.input.is_supported() || self.extract.is_supported() || self.load.is_supported()
    }
}

/// Vector format driver definition.
#[derive(Debug, Clone)]
pub struct Driver {
    /// Short name, identical to the GDAL/OGR driver name (e.g., `"GPKG"`).
    pub short_name: &'static str,
    /// Long descriptive name for display purposes.
    pub long_name: &'static str,
    /// File extension without the dot, when the format is file based.
    pub extension: Option<&'static str>,
    /// Alternative names accepted on the command line (e.g., `"shp"`).
    pub aliases: &'static [&'static str],
    /// Operations supported by this driver.
    pub capabilities: DriverCapabilities,
}

impl Driver {
    /// Creates a new driver definition with specified capabilities.
    #[must_use]
    pub const fn new(
        short_name: &'static str,
        long_name: &'static str,
        extension: Option<&'static str>,
        aliases: &'static [&'static str],
        capabilities: DriverCapabilities,
    ) -> Self {
        Self {
            short_name,
            long_name,
            extension,
            aliases,
            capabilities,
        }
    }

    /// Returns `true` if `name` is the short name or one of the aliases (case-insensitive).
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.short_name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}
