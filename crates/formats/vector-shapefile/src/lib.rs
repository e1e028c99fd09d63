//! ESRI Shapefile reader for the `dxf2geo` loader.
//!
//! A shapefile holds exactly one layer. Shapes are converted to `geo-types`
//! geometries (Z and M values are dropped) and dBase attributes to JSON values.
//! [`retain_shapefile`] rewrites a shapefile without the dropped shapes.

mod convert;
mod retain;

use std::path::Path;

use dxf2geo_core_common::{
    FeatureRecord, SourcePosition, VectorLayer, VectorReadError, VectorReadResult, VectorReader,
    VectorRetainer,
};
use log::debug;

pub use convert::{field_value_to_json, shape_to_geometry};
pub use retain::retain_shapefile;

/// Reads `.shp` files (with their `.dbf`/`.shx` sidecars).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapefileReader;

impl ShapefileReader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl VectorReader for ShapefileReader {
    fn driver_name(&self) -> &'static str {
        "ESRI Shapefile"
    }

    fn extension(&self) -> &'static str {
        "shp"
    }

    fn read_layers(&self, path: &Path) -> VectorReadResult<Vec<VectorLayer>> {
        Ok(vec![read_shapefile(path)?])
    }
}

impl VectorRetainer for ShapefileReader {
    fn retain_features(
        &self,
        path: &Path,
        keep: &mut dyn FnMut(&str, usize) -> bool,
    ) -> VectorReadResult<usize> {
        retain_shapefile(path, keep)
    }
}

/// Reads a single shapefile into a [`VectorLayer`] named after the file stem.
///
/// # Errors
///
/// Returns a [`VectorReadError`] if the shapefile or its attribute table cannot
/// be opened, or if a shape/record pair fails to decode.
pub fn read_shapefile(path: &Path) -> VectorReadResult<VectorLayer> {
    let context = path.display().to_string();
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut reader = shapefile::Reader::from_path(path).map_err(|err| {
        VectorReadError::parse(format!("Failed to open shapefile: {err}"), context.clone())
    })?;

    let mut records = Vec::new();
    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item.map_err(|err| VectorReadError::Parse {
            message: format!("Failed to decode shape: {err}"),
            position: Some(SourcePosition {
                record: Some(index as u64),
                layer: Some(name.clone()),
                ..SourcePosition::default()
            }),
            context: Some(context.clone()),
        })?;

        let geometry = shape_to_geometry(&shape);
        let properties =
            std::collections::HashMap::<String, shapefile::dbase::FieldValue>::from(record)
                .into_iter()
                .map(|(field, value)| (field, field_value_to_json(value)))
                .collect();

        records.push(FeatureRecord {
            properties,
            geometry,
        });
    }

    debug!("Read {} shape(s) from {context}", records.len());
    Ok(VectorLayer {
        name,
        path: path.to_path_buf(),
        records,
    })
}
