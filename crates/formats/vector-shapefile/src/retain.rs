//! In-place thinning of a shapefile.
//!
//! The `.shp`, `.shx` and `.dbf` files are read fully, then rewritten with the
//! surviving shape/record pairs and the original attribute table layout.

use std::io::{Seek, Write};
use std::path::Path;

use dxf2geo_core_common::{SourcePosition, VectorReadError, VectorReadResult};
use log::debug;
use shapefile::dbase::Record;
use shapefile::{Shape, Writer};

/// Rewrites the shapefile at `path` keeping the pairs for which
/// `keep(layer, index)` returns `true`; the layer is the file stem. Returns the
/// number of pairs removed. The files are left untouched when nothing is removed.
///
/// # Errors
///
/// Returns a [`VectorReadError`] if the shapefile cannot be read or rewritten,
/// or if a kept shape is a null shape, which the writer cannot encode.
pub fn retain_shapefile(
    path: &Path,
    keep: &mut dyn FnMut(&str, usize) -> bool,
) -> VectorReadResult<usize> {
    let context = path.display().to_string();
    let layer = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut reader = shapefile::Reader::from_path(path).map_err(|err| {
        VectorReadError::parse(format!("Failed to open shapefile: {err}"), context.clone())
    })?;
    let pairs = reader.read().map_err(|err| {
        VectorReadError::parse(format!("Failed to decode shapes: {err}"), context.clone())
    })?;
    let table_info = reader.into_table_info();

    let total = pairs.len();
    let kept: Vec<(Shape, Record)> = pairs
        .into_iter()
        .enumerate()
        .filter_map(|(index, pair)| keep(&layer, index).then_some(pair))
        .collect();
    let removed = total - kept.len();
    if removed == 0 {
        return Ok(0);
    }

    let mut writer = Writer::from_path_with_info(path, table_info).map_err(|err| {
        VectorReadError::parse(format!("Failed to rewrite shapefile: {err}"), context.clone())
    })?;
    for (index, (shape, record)) in kept.iter().enumerate() {
        write_pair(&mut writer, shape, record).map_err(|message| VectorReadError::Parse {
            message,
            position: Some(SourcePosition {
                record: Some(index as u64),
                layer: Some(layer.clone()),
                ..SourcePosition::default()
            }),
            context: Some(context.clone()),
        })?;
    }
    drop(writer);

    debug!("Removed {removed} of {total} shape(s) from {context}");
    Ok(removed)
}

fn write_pair<T: Write + Seek>(
    writer: &mut Writer<T>,
    shape: &Shape,
    record: &Record,
) -> Result<(), String> {
    let result = match shape {
        Shape::NullShape => return Err("null shapes cannot be rewritten".to_string()),
        Shape::Point(s) => writer.write_shape_and_record(s, record),
        Shape::PointM(s) => writer.write_shape_and_record(s, record),
        Shape::PointZ(s) => writer.write_shape_and_record(s, record),
        Shape::Polyline(s) => writer.write_shape_and_record(s, record),
        Shape::PolylineM(s) => writer.write_shape_and_record(s, record),
        Shape::PolylineZ(s) => writer.write_shape_and_record(s, record),
        Shape::Polygon(s) => writer.write_shape_and_record(s, record),
        Shape::PolygonM(s) => writer.write_shape_and_record(s, record),
        Shape::PolygonZ(s) => writer.write_shape_and_record(s, record),
        Shape::Multipoint(s) => writer.write_shape_and_record(s, record),
        Shape::MultipointM(s) => writer.write_shape_and_record(s, record),
        Shape::MultipointZ(s) => writer.write_shape_and_record(s, record),
        Shape::Multipatch(s) => writer.write_shape_and_record(s, record),
    };
    result.map_err(|err| format!("Failed to write shape: {err}"))
}
