//! Minimal GeoPackage writer for building test fixtures.
//!
//! Produces just enough of the GeoPackage schema for [`crate::GpkgReader`]:
//! `gpkg_contents`, `gpkg_geometry_columns` and one table per layer with an
//! integer `fid`, a `geom` BLOB and untyped attribute columns.

use std::path::Path;

use dxf2geo_core_common::{JsonObject, JsonValue};
use geo_types::{Coord, Geometry, LineString, Polygon};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use crate::quote_identifier;

const SCHEMA: &str = "
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT,
    srs_id INTEGER
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    PRIMARY KEY (table_name, column_name)
);
";

/// An open fixture GeoPackage.
pub struct GpkgFixture {
    conn: Connection,
}

impl GpkgFixture {
    /// Creates a new GeoPackage at `path` with the metadata tables.
    ///
    /// # Errors
    ///
    /// Returns any SQLite error.
    pub fn create(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Registers a feature table with the given attribute columns.
    ///
    /// # Errors
    ///
    /// Returns any SQLite error.
    pub fn add_layer(&self, table: &str, columns: &[&str]) -> rusqlite::Result<()> {
        let mut ddl = format!(
            "CREATE TABLE {} (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB",
            quote_identifier(table)
        );
        for column in columns {
            ddl.push_str(", ");
            ddl.push_str(&quote_identifier(column));
        }
        ddl.push(')');
        self.conn.execute(&ddl, [])?;

        self.conn.execute(
            "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id) \
             VALUES (?1, 'features', ?1, 0)",
            params![table],
        )?;
        self.conn.execute(
            "INSERT INTO gpkg_geometry_columns \
             (table_name, column_name, geometry_type_name, srs_id, z, m) \
             VALUES (?1, 'geom', 'GEOMETRY', 0, 0, 0)",
            params![table],
        )?;
        Ok(())
    }

    /// Inserts one feature. Every key of `properties` must be a column of the table.
    ///
    /// # Errors
    ///
    /// Returns any SQLite error.
    pub fn insert(
        &self,
        table: &str,
        geometry: Option<&Geometry<f64>>,
        properties: &JsonObject,
    ) -> rusqlite::Result<()> {
        let mut columns = vec!["geom".to_string()];
        let mut values = vec![geometry.map_or(Value::Null, |g| Value::Blob(encode_geometry(g)))];
        for (key, value) in properties {
            columns.push(quote_identifier(key));
            values.push(json_to_value(value));
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Inserts a feature whose geometry column holds arbitrary bytes.
    ///
    /// # Errors
    ///
    /// Returns any SQLite error.
    pub fn insert_raw_geometry(&self, table: &str, bytes: &[u8]) -> rusqlite::Result<()> {
        let sql = format!("INSERT INTO {} (geom) VALUES (?1)", quote_identifier(table));
        self.conn.execute(&sql, params![bytes])?;
        Ok(())
    }
}

/// Writes a GeoPackage holding a single layer whose columns are the union of
/// the property keys.
///
/// # Errors
///
/// Returns any SQLite error.
pub fn write_layer(
    path: &Path,
    table: &str,
    features: &[(Option<Geometry<f64>>, JsonObject)],
) -> rusqlite::Result<()> {
    let mut columns: Vec<&str> = features
        .iter()
        .flat_map(|(_, properties)| properties.keys().map(String::as_str))
        .collect();
    columns.sort_unstable();
    columns.dedup();

    let fixture = GpkgFixture::create(path)?;
    fixture.add_layer(table, &columns)?;
    for (geometry, properties) in features {
        fixture.insert(table, geometry.as_ref(), properties)?;
    }
    Ok(())
}

fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real))
            .unwrap_or(Value::Null),
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn has_no_coords(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::LineString(line) => line.0.is_empty(),
        Geometry::Polygon(polygon) => polygon.exterior().0.is_empty(),
        Geometry::MultiPoint(points) => points.0.is_empty(),
        Geometry::MultiLineString(lines) => lines.0.iter().all(|l| l.0.is_empty()),
        Geometry::MultiPolygon(polygons) => {
            polygons.0.iter().all(|p| p.exterior().0.is_empty())
        },
        Geometry::GeometryCollection(collection) => collection.0.iter().all(has_no_coords),
        Geometry::Point(_) | Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
            false
        },
    }
}

/// Encodes a geometry as a GeoPackage blob: an 8-byte header without an
/// envelope followed by little-endian WKB. Geometries without coordinates
/// carry the empty flag, as GDAL writes them.
#[must_use]
pub fn encode_geometry(geometry: &Geometry<f64>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"GP");
    out.push(0); // version
    // little-endian header, no envelope
    out.push(if has_no_coords(geometry) { 0b0001_0001 } else { 0b0000_0001 });
    out.extend_from_slice(&0i32.to_le_bytes());
    write_wkb(&mut out, geometry);
    out
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

fn write_header(out: &mut Vec<u8>, code: u32) {
    out.push(1);
    out.extend_from_slice(&code.to_le_bytes());
}

fn write_coords(out: &mut Vec<u8>, coords: &[Coord<f64>]) {
    write_len(out, coords.len());
    for c in coords {
        out.extend_from_slice(&c.x.to_le_bytes());
        out.extend_from_slice(&c.y.to_le_bytes());
    }
}

fn write_polygon_body(out: &mut Vec<u8>, polygon: &Polygon<f64>) {
    write_len(out, 1 + polygon.interiors().len());
    write_coords(out, &polygon.exterior().0);
    for ring in polygon.interiors() {
        write_coords(out, &ring.0);
    }
}

fn write_wkb(out: &mut Vec<u8>, geometry: &Geometry<f64>) {
    match geometry {
        Geometry::Point(p) => {
            write_header(out, 1);
            out.extend_from_slice(&p.x().to_le_bytes());
            out.extend_from_slice(&p.y().to_le_bytes());
        },
        Geometry::Line(line) => {
            write_wkb(out, &Geometry::LineString(LineString::from(*line)));
        },
        Geometry::LineString(line) => {
            write_header(out, 2);
            write_coords(out, &line.0);
        },
        Geometry::Polygon(polygon) => {
            write_header(out, 3);
            write_polygon_body(out, polygon);
        },
        Geometry::MultiPoint(points) => {
            write_header(out, 4);
            write_len(out, points.0.len());
            for p in &points.0 {
                write_wkb(out, &Geometry::Point(*p));
            }
        },
        Geometry::MultiLineString(lines) => {
            write_header(out, 5);
            write_len(out, lines.0.len());
            for line in &lines.0 {
                write_header(out, 2);
                write_coords(out, &line.0);
            }
        },
        Geometry::MultiPolygon(polygons) => {
            write_header(out, 6);
            write_len(out, polygons.0.len());
            for polygon in &polygons.0 {
                write_header(out, 3);
                write_polygon_body(out, polygon);
            }
        },
        Geometry::GeometryCollection(collection) => {
            write_header(out, 7);
            write_len(out, collection.0.len());
            for member in &collection.0 {
                write_wkb(out, member);
            }
        },
        Geometry::Rect(rect) => write_wkb(out, &Geometry::Polygon(rect.to_polygon())),
        Geometry::Triangle(triangle) => {
            write_wkb(out, &Geometry::Polygon(triangle.to_polygon()));
        },
    }
}
