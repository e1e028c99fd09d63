//! Conversions from `shapefile` shapes and dBase values.

use dxf2geo_core_common::JsonValue;
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};

/// Planar view of the three shapefile point flavours.
trait PlanarPoint {
    fn coord(&self) -> Coord<f64>;
}

impl PlanarPoint for shapefile::Point {
    fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

impl PlanarPoint for shapefile::PointM {
    fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

impl PlanarPoint for shapefile::PointZ {
    fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

fn line_string<P: PlanarPoint>(points: &[P]) -> LineString<f64> {
    LineString::new(points.iter().map(PlanarPoint::coord).collect())
}

fn parts_to_geometry<P: PlanarPoint>(parts: &[Vec<P>]) -> Option<Geometry<f64>> {
    match parts {
        [] => None,
        [single] => Some(Geometry::LineString(line_string(single))),
        many => Some(Geometry::MultiLineString(MultiLineString::new(
            many.iter().map(|part| line_string(part)).collect(),
        ))),
    }
}

/// Groups rings into polygons: every outer ring opens a polygon, inner rings
/// attach to the most recent outer ring.
fn rings_to_geometry<P: PlanarPoint>(rings: &[PolygonRing<P>]) -> Option<Geometry<f64>> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push((line_string(points), Vec::new())),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some((_, holes)) => holes.push(line_string(points)),
                // An inner ring before any outer ring is promoted to an outer ring.
                None => polygons.push((line_string(points), Vec::new())),
            },
        }
    }

    let mut polygons: Vec<Polygon<f64>> = polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect();

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

fn multipoint<P: PlanarPoint>(points: &[P]) -> Option<Geometry<f64>> {
    Some(Geometry::MultiPoint(MultiPoint::new(
        points.iter().map(|p| Point::from(p.coord())).collect(),
    )))
}

/// Converts a shape to a planar geometry.
///
/// Single-part polylines and polygons become `LineString`/`Polygon`, multi-part
/// ones become their `Multi*` counterparts. Null shapes and multipatches have no
/// planar equivalent and yield `None`.
#[must_use]
pub fn shape_to_geometry(shape: &Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::NullShape | Shape::Multipatch(_) => None,
        Shape::Point(p) => Some(Geometry::Point(Point::from(p.coord()))),
        Shape::PointM(p) => Some(Geometry::Point(Point::from(p.coord()))),
        Shape::PointZ(p) => Some(Geometry::Point(Point::from(p.coord()))),
        Shape::Polyline(line) => parts_to_geometry(line.parts()),
        Shape::PolylineM(line) => parts_to_geometry(line.parts()),
        Shape::PolylineZ(line) => parts_to_geometry(line.parts()),
        Shape::Polygon(polygon) => rings_to_geometry(polygon.rings()),
        Shape::PolygonM(polygon) => rings_to_geometry(polygon.rings()),
        Shape::PolygonZ(polygon) => rings_to_geometry(polygon.rings()),
        Shape::Multipoint(points) => multipoint(points.points()),
        Shape::MultipointM(points) => multipoint(points.points()),
        Shape::MultipointZ(points) => multipoint(points.points()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number(value: f64) -> JsonValue {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT {
        JsonValue::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
    }
}

/// Converts a dBase field value to JSON.
///
/// Character values lose the dBase right padding. Whole-number numerics become
/// JSON integers so flags such as `PaperSpace` compare as `1`, not `1.0`.
#[must_use]
pub fn field_value_to_json(value: FieldValue) -> JsonValue {
    match value {
        FieldValue::Character(text) => text.map_or(JsonValue::Null, |s| {
            JsonValue::String(s.trim_end().to_string())
        }),
        FieldValue::Memo(text) => JsonValue::String(text),
        FieldValue::Numeric(n) => n.map_or(JsonValue::Null, number),
        FieldValue::Float(n) => n.map_or(JsonValue::Null, |f| number(f64::from(f))),
        FieldValue::Double(n) | FieldValue::Currency(n) => number(n),
        FieldValue::Integer(n) => JsonValue::from(n),
        FieldValue::Logical(flag) => flag.map_or(JsonValue::Null, JsonValue::Bool),
        other => JsonValue::String(format!("{other:?}")),
    }
}
