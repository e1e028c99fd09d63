//! Types shared by the vector format readers.
//!
//! Every reader turns a file on disk into [`VectorLayer`]s made of
//! [`FeatureRecord`]s and reports failures as [`VectorReadError`].

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use geo_types::Geometry;
pub use serde_json::{Map as JsonMap, Value as JsonValue};

/// Attribute map of a feature, keyed by field name.
pub type JsonObject = JsonMap<String, JsonValue>;

/// One feature read from a vector file.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub properties: JsonObject,
    pub geometry: Option<Geometry<f64>>,
}

impl fmt::Display for FeatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geom = if self.geometry.is_some() {
            "Some(Geometry)"
        } else {
            "None"
        };
        write!(
            f,
            "FeatureRecord(properties={} keys, geometry={geom})",
            self.properties.len()
        )
    }
}

/// A named group of features: a shapefile, or one feature table of a GeoPackage.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    /// Layer name (file stem for shapefiles, table name for GeoPackages)
    pub name: String,
    /// File the layer was read from
    pub path: PathBuf,
    /// Features in file order
    pub records: Vec<FeatureRecord>,
}

impl VectorLayer {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A position within a source file.
///
/// Indices are 0-based record numbers as reported by the underlying reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Record (feature) index within the layer
    pub record: Option<u64>,
    /// Layer or table the record belongs to
    pub layer: Option<String>,
    /// Byte offset from the start of the source
    pub byte_offset: Option<u64>,
}

impl SourcePosition {
    /// Returns true when the position does not contain any location metadata.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.is_none() && self.layer.is_none() && self.byte_offset.is_none()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(layer) = &self.layer {
            parts.push(format!("layer {layer}"));
        }
        if let Some(record) = self.record {
            parts.push(format!("record {record}"));
        }
        if let Some(byte) = self.byte_offset {
            parts.push(format!("byte {byte}"));
        }

        if parts.is_empty() {
            write!(f, "unknown position")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors that can occur when reading a vector file.
#[derive(Debug)]
pub enum VectorReadError {
    /// An underlying I/O failure occurred.
    Io {
        /// The originating error.
        source: std::io::Error,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// The file could not be decoded.
    Parse {
        /// Human readable description of the failure.
        message: String,
        /// Optional position describing where the failure occurred.
        position: Option<SourcePosition>,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// The file decoded but does not have the expected structure.
    Schema {
        /// Human readable description of the failure.
        message: String,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// Other error type not classified above.
    Other {
        /// Human readable description of the failure.
        message: String,
    },
}

impl VectorReadError {
    fn fmt_context(context: Option<&str>) -> String {
        context
            .map(|c| format!(" while reading {c}"))
            .unwrap_or_default()
    }

    fn fmt_position(position: Option<&SourcePosition>) -> String {
        position
            .filter(|pos| !pos.is_empty())
            .map(|pos| format!(" at {pos}"))
            .unwrap_or_default()
    }

    /// Build a parse error without a known position.
    #[must_use]
    pub fn parse(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            position: None,
            context: Some(context.into()),
        }
    }

    /// Attach additional context to the error, returning the updated error.
    #[must_use]
    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        match &mut self {
            VectorReadError::Io {
                context: existing, ..
            }
            | VectorReadError::Parse {
                context: existing, ..
            }
            | VectorReadError::Schema {
                context: existing, ..
            } => match existing {
                Some(existing) if !existing.is_empty() => {
                    existing.push_str("; ");
                    existing.push_str(&context);
                },
                _ => *existing = Some(context),
            },
            VectorReadError::Other { message } => {
                message.push_str(" (");
                message.push_str(&context);
                message.push(')');
            },
        }
        self
    }
}

impl fmt::Display for VectorReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorReadError::Io { source, context } => {
                write!(
                    f,
                    "I/O error{}: {source}",
                    Self::fmt_context(context.as_deref())
                )
            },
            VectorReadError::Parse {
                message,
                position,
                context,
            } => write!(
                f,
                "Parse error{}{}: {message}",
                Self::fmt_context(context.as_deref()),
                Self::fmt_position(position.as_ref())
            ),
            VectorReadError::Schema { message, context } => write!(
                f,
                "Schema error{}: {message}",
                Self::fmt_context(context.as_deref())
            ),
            VectorReadError::Other { message } => f.write_str(message),
        }
    }
}

impl StdError for VectorReadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            VectorReadError::Io { source, .. } => Some(source),
            VectorReadError::Parse { .. }
            | VectorReadError::Schema { .. }
            | VectorReadError::Other { .. } => None,
        }
    }
}

impl From<std::io::Error> for VectorReadError {
    fn from(source: std::io::Error) -> Self {
        VectorReadError::Io {
            source,
            context: None,
        }
    }
}

/// Result type alias that uses [`VectorReadError`].
pub type VectorReadResult<T> = Result<T, VectorReadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_source_position() {
        let pos = SourcePosition {
            layer: Some("linestring".to_string()),
            record: Some(3),
            ..SourcePosition::default()
        };

        assert_eq!(pos.to_string(), "layer linestring, record 3");
        assert_eq!(SourcePosition::default().to_string(), "unknown position");
    }

    #[test]
    fn display_parse_error_with_context() {
        let error = VectorReadError::Parse {
            message: "bad geometry header".to_string(),
            position: Some(SourcePosition {
                record: Some(7),
                ..Default::default()
            }),
            context: Some("out/point/point.gpkg".to_string()),
        };

        assert_eq!(
            error.to_string(),
            "Parse error while reading out/point/point.gpkg at record 7: bad geometry header"
        );
    }

    #[test]
    fn additional_context_is_appended() {
        let error = VectorReadError::parse("truncated", "a.shp").with_additional_context("layer a");
        match error {
            VectorReadError::Parse { context, .. } => {
                assert_eq!(context.as_deref(), Some("a.shp; layer a"));
            },
            _ => panic!("Expected Parse error"),
        }

        let other = VectorReadError::Other {
            message: "boom".to_string(),
        }
        .with_additional_context("ctx");
        assert_eq!(other.to_string(), "boom (ctx)");
    }

    #[test]
    fn io_error_exposes_source() {
        let error = VectorReadError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(error.source().is_some());
        assert!(error.to_string().starts_with("I/O error"));
    }

    #[test]
    fn feature_record_display() {
        let record = FeatureRecord {
            properties: [("Layer".to_string(), JsonValue::String("0".into()))]
                .into_iter()
                .collect(),
            geometry: Some(Geometry::Point(geo_types::Point::new(1.0, 2.0))),
        };

        let display = format!("{record}");
        assert!(display.contains("properties=1 keys"));
        assert!(display.contains("Some(Geometry)"));
    }
}
