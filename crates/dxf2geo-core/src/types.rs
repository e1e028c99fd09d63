//! In-memory geometry collection produced by the loader and consumed by the
//! filters and the visualiser.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use dxf2geo_core_common::{JsonObject, JsonValue};
use geo::{BoundingRect, CoordsIter};
use geo_types::{Geometry, LineString, Polygon, Rect, coord};

use crate::geometry_type::GeometryType;

/// One feature: a geometry, its type tag, where it came from, and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    /// The planar geometry
    pub geometry: Geometry<f64>,
    /// Geometry type this record was extracted as
    pub geometry_type: GeometryType,
    /// Layer it was read from (shapefile stem or GeoPackage table)
    pub source: String,
    /// Attribute fields inherited from the source drawing
    pub properties: JsonObject,
}

impl GeometryRecord {
    /// Creates a record tagged with the type of its own geometry.
    ///
    /// Returns `None` for geometry collections, which have no partition type.
    #[must_use]
    pub fn new(geometry: Geometry<f64>, properties: JsonObject) -> Option<Self> {
        let geometry_type = GeometryType::of(&geometry)?;
        Some(Self {
            geometry,
            geometry_type,
            source: geometry_type.dir_name().to_string(),
            properties,
        })
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Looks up an attribute by exact field name.
    #[must_use]
    pub fn property(&self, field: &str) -> Option<&JsonValue> {
        self.properties.get(field)
    }
}

/// An ordered collection of [`GeometryRecord`]s.
///
/// Records of different geometry types may be mixed; [`GeometryTable::by_type`]
/// recovers the per-type collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryTable {
    records: Vec<GeometryRecord>,
}

impl GeometryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_records(records: Vec<GeometryRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: GeometryRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[GeometryRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeometryRecord> {
        self.records.iter()
    }

    /// Returns a new table with the records for which `keep` is true, in order.
    /// `self` is left untouched.
    #[must_use]
    pub fn retain_cloned<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&GeometryRecord) -> bool,
    {
        Self {
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Groups records by geometry type, preserving order within each group.
    #[must_use]
    pub fn by_type(&self) -> BTreeMap<GeometryType, Vec<&GeometryRecord>> {
        let mut groups: BTreeMap<GeometryType, Vec<&GeometryRecord>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.geometry_type).or_default().push(record);
        }
        groups
    }

    /// Number of records per geometry type.
    #[must_use]
    pub fn count_by_type(&self) -> BTreeMap<GeometryType, usize> {
        self.by_type()
            .into_iter()
            .map(|(ty, records)| (ty, records.len()))
            .collect()
    }

    /// Bounding rectangle of every non-empty geometry.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.records
            .iter()
            .filter_map(|record| record.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }
}

impl FromIterator<GeometryRecord> for GeometryTable {
    fn from_iter<I: IntoIterator<Item = GeometryRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for GeometryTable {
    type Item = GeometryRecord;
    type IntoIter = std::vec::IntoIter<GeometryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a GeometryTable {
    type Item = &'a GeometryRecord;
    type IntoIter = std::slice::Iter<'a, GeometryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The feature has no geometry
    Missing,
    /// A coordinate is NaN or infinite
    NonFinite,
    /// A line has fewer than 2 vertices, or a ring fewer than 4
    TooFewVertices,
    /// The geometry kind cannot be partitioned (e.g. a collection)
    Unsupported(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Missing => f.write_str("missing geometry"),
            InvalidReason::NonFinite => f.write_str("non-finite coordinate"),
            InvalidReason::TooFewVertices => f.write_str("too few vertices"),
            InvalidReason::Unsupported(kind) => write!(f, "unsupported geometry kind {kind}"),
        }
    }
}

/// A record dropped during load, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidGeometry {
    /// File the record was read from
    pub path: PathBuf,
    /// Layer within the file
    pub layer: String,
    /// 0-based record index within the layer
    pub index: usize,
    pub reason: InvalidReason,
}

impl fmt::Display for InvalidGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} layer {} record {}: {}",
            self.path.display(),
            self.layer,
            self.index,
            self.reason
        )
    }
}

/// Returns `true` for geometries with no coordinates at all.
#[must_use]
pub fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    geometry.coords_count() == 0
}

fn check_line(line: &LineString<f64>, min: usize) -> Result<(), InvalidReason> {
    if line.0.is_empty() || line.0.len() >= min {
        Ok(())
    } else {
        Err(InvalidReason::TooFewVertices)
    }
}

fn check_polygon(polygon: &Polygon<f64>) -> Result<(), InvalidReason> {
    check_line(polygon.exterior(), 4)?;
    polygon
        .interiors()
        .iter()
        .try_for_each(|ring| check_line(ring, 4))
}

/// Checks that a geometry can be carried through the pipeline.
///
/// Empty geometries are valid here; dropping them is a filter decision.
///
/// # Errors
///
/// Returns the first [`InvalidReason`] found.
pub fn validate_geometry(geometry: &Geometry<f64>) -> Result<(), InvalidReason> {
    if geometry
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return Err(InvalidReason::NonFinite);
    }

    match geometry {
        Geometry::LineString(line) => check_line(line, 2),
        Geometry::MultiLineString(lines) => lines.0.iter().try_for_each(|l| check_line(l, 2)),
        Geometry::Polygon(polygon) => check_polygon(polygon),
        Geometry::MultiPolygon(polygons) => polygons.0.iter().try_for_each(check_polygon),
        Geometry::GeometryCollection(_) => {
            Err(InvalidReason::Unsupported("GEOMETRYCOLLECTION".to_string()))
        },
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::Line(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => Ok(()),
    }
}
