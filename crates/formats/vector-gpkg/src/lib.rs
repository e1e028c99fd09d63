//! GeoPackage reader for the `dxf2geo` loader.
//!
//! Every table registered in `gpkg_contents` with `data_type = 'features'` is
//! read as one [`VectorLayer`], in row order. The feature id column (`fid`) is
//! not carried into the attributes. [`retain_geopackage`] deletes rows in place.

pub mod blob;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::path::Path;

use dxf2geo_core_common::{
    FeatureRecord, JsonObject, JsonValue, SourcePosition, VectorLayer, VectorReadError,
    VectorReadResult, VectorReader, VectorRetainer,
};
use log::{debug, warn};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

pub use blob::{BlobError, decode_geometry};

const FEATURE_TABLES_SQL: &str = "SELECT c.table_name, g.column_name \
     FROM gpkg_contents c \
     JOIN gpkg_geometry_columns g ON c.table_name = g.table_name \
     WHERE c.data_type = 'features' \
     ORDER BY c.table_name";

/// Reads `.gpkg` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct GpkgReader;

impl GpkgReader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl VectorReader for GpkgReader {
    fn driver_name(&self) -> &'static str {
        "GPKG"
    }

    fn extension(&self) -> &'static str {
        "gpkg"
    }

    fn read_layers(&self, path: &Path) -> VectorReadResult<Vec<VectorLayer>> {
        read_geopackage(path)
    }
}

impl VectorRetainer for GpkgReader {
    fn retain_features(
        &self,
        path: &Path,
        keep: &mut dyn FnMut(&str, usize) -> bool,
    ) -> VectorReadResult<usize> {
        retain_geopackage(path, keep)
    }
}

fn sqlite_error(context: &str) -> impl Fn(rusqlite::Error) -> VectorReadError + '_ {
    move |err| VectorReadError::parse(format!("SQLite error: {err}"), context)
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Reads every feature table of a GeoPackage, ordered by table name.
///
/// # Errors
///
/// Returns a [`VectorReadError`] if the file is missing, is not a GeoPackage,
/// or a table cannot be queried.
pub fn read_geopackage(path: &Path) -> VectorReadResult<Vec<VectorLayer>> {
    let context = path.display().to_string();
    let conn = open(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let tables = feature_tables(&conn).map_err(not_a_geopackage(&context))?;

    let mut layers = Vec::with_capacity(tables.len());
    for (table, geometry_column) in tables {
        let records = read_table(&conn, &table, &geometry_column)
            .map_err(|err| err.with_additional_context(format!("table {table}")))?;
        debug!("Read {} feature(s) from {context}:{table}", records.len());
        layers.push(VectorLayer {
            name: table,
            path: path.to_path_buf(),
            records,
        });
    }
    Ok(layers)
}

/// Deletes every feature row for which `keep(table, index)` returns `false`,
/// in one transaction. Indices follow the row order of [`read_geopackage`].
///
/// # Errors
///
/// Returns a [`VectorReadError`] if the file is missing, is not a GeoPackage,
/// or a row cannot be deleted. Nothing is deleted on error.
pub fn retain_geopackage(
    path: &Path,
    keep: &mut dyn FnMut(&str, usize) -> bool,
) -> VectorReadResult<usize> {
    let context = path.display().to_string();
    let mut conn = open(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    let tables = feature_tables(&conn).map_err(not_a_geopackage(&context))?;

    let removed = delete_rows(&mut conn, &tables, keep).map_err(sqlite_error(&context))?;
    if removed > 0 {
        debug!("Deleted {removed} feature(s) from {context}");
    }
    Ok(removed)
}

fn delete_rows(
    conn: &mut Connection,
    tables: &[(String, String)],
    keep: &mut dyn FnMut(&str, usize) -> bool,
) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let mut removed = 0;
    for (table, _) in tables {
        let quoted = quote_identifier(table);
        let rowids = {
            let mut stmt = tx.prepare(&format!("SELECT rowid FROM {quoted} ORDER BY rowid"))?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut delete = tx.prepare(&format!("DELETE FROM {quoted} WHERE rowid = ?1"))?;
        for (index, rowid) in rowids.into_iter().enumerate() {
            if !keep(table, index) {
                delete.execute([rowid])?;
                removed += 1;
            }
        }
    }
    tx.commit()?;
    Ok(removed)
}

fn open(path: &Path, mode: OpenFlags) -> VectorReadResult<Connection> {
    let context = path.display().to_string();
    if !path.is_file() {
        return Err(VectorReadError::Io {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            context: Some(context),
        });
    }
    Connection::open_with_flags(path, mode | OpenFlags::SQLITE_OPEN_NO_MUTEX)
        .map_err(sqlite_error(&context))
}

fn not_a_geopackage(context: &str) -> impl Fn(rusqlite::Error) -> VectorReadError + '_ {
    move |err| VectorReadError::Schema {
        message: format!("Not a GeoPackage feature container: {err}"),
        context: Some(context.to_string()),
    }
}

fn feature_tables(conn: &Connection) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(FEATURE_TABLES_SQL)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn read_table(
    conn: &Connection,
    table: &str,
    geometry_column: &str,
) -> VectorReadResult<Vec<FeatureRecord>> {
    let context = format!("table {table}");
    let sql = format!("SELECT * FROM {} ORDER BY rowid", quote_identifier(table));
    let mut stmt = conn.prepare(&sql).map_err(sqlite_error(&context))?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt.query([]).map_err(sqlite_error(&context))?;
    let mut records = Vec::new();
    let mut index: u64 = 0;

    while let Some(row) = rows.next().map_err(sqlite_error(&context))? {
        let mut properties = JsonObject::new();
        let mut geometry = None;

        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(sqlite_error(&context))?;
            if name.eq_ignore_ascii_case(geometry_column) {
                geometry = match value {
                    ValueRef::Blob(bytes) => match decode_geometry(bytes) {
                        Ok(geometry) => Some(geometry),
                        Err(err) => {
                            // Kept without geometry; the loader reports it as invalid.
                            warn!("{table} record {index}: {err}");
                            None
                        },
                    },
                    ValueRef::Null => None,
                    _ => {
                        return Err(VectorReadError::Parse {
                            message: format!("geometry column '{geometry_column}' is not a BLOB"),
                            position: Some(SourcePosition {
                                record: Some(index),
                                layer: Some(table.to_string()),
                                ..SourcePosition::default()
                            }),
                            context: None,
                        });
                    },
                };
            } else if name.eq_ignore_ascii_case("fid") {
                continue;
            } else if let Some(json) = value_to_json(value) {
                properties.insert(name.clone(), json);
            }
        }

        records.push(FeatureRecord {
            properties,
            geometry,
        });
        index += 1;
    }

    Ok(records)
}

/// Converts an SQLite value to JSON. BLOB attributes have no JSON form and are skipped.
fn value_to_json(value: ValueRef<'_>) -> Option<JsonValue> {
    match value {
        ValueRef::Null => Some(JsonValue::Null),
        ValueRef::Integer(n) => Some(JsonValue::from(n)),
        ValueRef::Real(f) => Some(
            serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        ),
        ValueRef::Text(bytes) => Some(JsonValue::String(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
        ValueRef::Blob(_) => None,
    }
}
