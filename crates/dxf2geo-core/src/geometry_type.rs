//! The geometry types extraction is partitioned by, and the single flattened
//! partition that holds all of them.

use std::fmt;
use std::str::FromStr;

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An OGR geometry type name used as a partition key.
///
/// The upper-case name (`"LINESTRING"`) is what the translator filters on; the
/// lower-case name (`"linestring"`) names the output subdirectory and file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryType {
    /// Every supported geometry type.
    pub const ALL: [GeometryType; 6] = [
        GeometryType::Point,
        GeometryType::MultiPoint,
        GeometryType::LineString,
        GeometryType::MultiLineString,
        GeometryType::Polygon,
        GeometryType::MultiPolygon,
    ];

    /// The types extracted when none are requested.
    pub const DEFAULT: [GeometryType; 5] = [
        GeometryType::Point,
        GeometryType::LineString,
        GeometryType::Polygon,
        GeometryType::MultiLineString,
        GeometryType::MultiPolygon,
    ];

    /// Upper-case OGR name, e.g. `"MULTIPOLYGON"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            GeometryType::Point => "POINT",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
        }
    }

    /// Lower-case name used for the output subdirectory and file stem.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            GeometryType::Point => "point",
            GeometryType::MultiPoint => "multipoint",
            GeometryType::LineString => "linestring",
            GeometryType::MultiLineString => "multilinestring",
            GeometryType::Polygon => "polygon",
            GeometryType::MultiPolygon => "multipolygon",
        }
    }

    #[must_use]
    pub const fn is_point(self) -> bool {
        matches!(self, GeometryType::Point | GeometryType::MultiPoint)
    }

    #[must_use]
    pub const fn is_line(self) -> bool {
        matches!(self, GeometryType::LineString | GeometryType::MultiLineString)
    }

    #[must_use]
    pub const fn is_polygon(self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }

    /// `true` when both types are points, both lines, or both polygons.
    #[must_use]
    pub const fn same_family(self, other: GeometryType) -> bool {
        (self.is_point() && other.is_point())
            || (self.is_line() && other.is_line())
            || (self.is_polygon() && other.is_polygon())
    }

    /// Classifies a geometry value. `Line`, `Rect` and `Triangle` map to their
    /// simple-feature equivalents; collections have no type and yield `None`.
    #[must_use]
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(GeometryType::Point),
            Geometry::MultiPoint(_) => Some(GeometryType::MultiPoint),
            Geometry::Line(_) | Geometry::LineString(_) => Some(GeometryType::LineString),
            Geometry::MultiLineString(_) => Some(GeometryType::MultiLineString),
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                Some(GeometryType::Polygon)
            },
            Geometry::MultiPolygon(_) => Some(GeometryType::MultiPolygon),
            Geometry::GeometryCollection(_) => None,
        }
    }

    /// Removes duplicates, keeping the first occurrence of each type.
    #[must_use]
    pub fn dedup(types: &[GeometryType]) -> Vec<GeometryType> {
        let mut seen = Vec::with_capacity(types.len());
        for ty in types {
            if !seen.contains(ty) {
                seen.push(*ty);
            }
        }
        seen
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        let ty = match name.as_str() {
            "POINT" => GeometryType::Point,
            "MULTIPOINT" => GeometryType::MultiPoint,
            "LINE" | "LINESTRING" => GeometryType::LineString,
            "MULTILINESTRING" => GeometryType::MultiLineString,
            "POLYGON" => GeometryType::Polygon,
            "MULTIPOLYGON" => GeometryType::MultiPolygon,
            _ => {
                return Err(ConfigError::InvalidOption {
                    option: "geometry type".to_string(),
                    message: format!(
                        "'{}' is not one of {}",
                        s.trim(),
                        GeometryType::ALL.map(GeometryType::as_str).join(", ")
                    ),
                });
            },
        };
        Ok(ty)
    }
}

impl TryFrom<String> for GeometryType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GeometryType> for String {
    fn from(value: GeometryType) -> Self {
        value.as_str().to_string()
    }
}

/// What one extraction partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeSelection {
    /// Features of one geometry type
    Only(GeometryType),
    /// Every feature, written to one mixed-type layer
    All,
}

impl TypeSelection {
    /// Directory, file stem and layer name of the flattened partition.
    pub const ALL_DIR_NAME: &'static str = "all_geometries";

    /// OGR name, or `"ALL"` for the flattened partition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TypeSelection::Only(ty) => ty.as_str(),
            TypeSelection::All => "ALL",
        }
    }

    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            TypeSelection::Only(ty) => ty.dir_name(),
            TypeSelection::All => Self::ALL_DIR_NAME,
        }
    }

    /// The geometry type, unless this is the flattened partition.
    #[must_use]
    pub const fn single(self) -> Option<GeometryType> {
        match self {
            TypeSelection::Only(ty) => Some(ty),
            TypeSelection::All => None,
        }
    }
}

impl From<GeometryType> for TypeSelection {
    fn from(value: GeometryType) -> Self {
        TypeSelection::Only(value)
    }
}

impl PartialEq<GeometryType> for TypeSelection {
    fn eq(&self, other: &GeometryType) -> bool {
        self.single() == Some(*other)
    }
}

impl fmt::Display for TypeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            return Ok(TypeSelection::All);
        }
        s.parse().map(TypeSelection::Only)
    }
}

impl TryFrom<String> for TypeSelection {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeSelection> for String {
    fn from(value: TypeSelection) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Point, Rect, coord};

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("point".parse::<GeometryType>().unwrap(), GeometryType::Point);
        assert_eq!(
            " MultiLineString ".parse::<GeometryType>().unwrap(),
            GeometryType::MultiLineString
        );
        assert_eq!("line".parse::<GeometryType>().unwrap(), GeometryType::LineString);
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = "curve".parse::<GeometryType>().unwrap_err();
        assert!(err.to_string().contains("'curve' is not one of"));
    }

    #[test]
    fn test_names() {
        assert_eq!(GeometryType::MultiPolygon.as_str(), "MULTIPOLYGON");
        assert_eq!(GeometryType::MultiPolygon.dir_name(), "multipolygon");
        assert_eq!(GeometryType::LineString.to_string(), "LINESTRING");
    }

    #[test]
    fn test_classification() {
        assert!(GeometryType::MultiLineString.is_line());
        assert!(!GeometryType::Polygon.is_line());
        assert!(GeometryType::MultiPolygon.is_polygon());
        assert!(GeometryType::MultiPoint.is_point());
        assert!(GeometryType::LineString.same_family(GeometryType::MultiLineString));
        assert!(!GeometryType::Point.same_family(GeometryType::Polygon));

        assert_eq!(
            GeometryType::of(&Geometry::Point(Point::new(0.0, 0.0))),
            Some(GeometryType::Point)
        );
        assert_eq!(
            GeometryType::of(&Geometry::LineString(LineString::from(vec![(0.0, 0.0)]))),
            Some(GeometryType::LineString)
        );
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        assert_eq!(
            GeometryType::of(&Geometry::Rect(rect)),
            Some(GeometryType::Polygon)
        );
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let types = [
            GeometryType::LineString,
            GeometryType::Point,
            GeometryType::LineString,
        ];
        assert_eq!(
            GeometryType::dedup(&types),
            vec![GeometryType::LineString, GeometryType::Point]
        );
    }

    #[test]
    fn test_serde_uses_ogr_names() {
        let json = serde_json::to_string(&GeometryType::MultiPoint).unwrap();
        assert_eq!(json, "\"MULTIPOINT\"");
        let parsed: GeometryType = serde_json::from_str("\"polygon\"").unwrap();
        assert_eq!(parsed, GeometryType::Polygon);
    }

    #[test]
    fn test_type_selection_names() {
        let all = TypeSelection::All;
        assert_eq!(all.to_string(), "ALL");
        assert_eq!(all.dir_name(), "all_geometries");
        assert_eq!(all.single(), None);

        let point = TypeSelection::from(GeometryType::Point);
        assert_eq!(point.dir_name(), "point");
        assert_eq!(point, GeometryType::Point);
        assert_ne!(all, GeometryType::Point);

        assert_eq!(serde_json::to_string(&all).unwrap(), "\"ALL\"");
        let parsed: TypeSelection = serde_json::from_str("\"multipolygon\"").unwrap();
        assert_eq!(parsed, TypeSelection::Only(GeometryType::MultiPolygon));
        assert_eq!("all".parse::<TypeSelection>().unwrap(), TypeSelection::All);
    }
}
