//! Reads extraction outputs back into one [`GeometryTable`].
//!
//! Shapefiles and GeoPackages are accepted interchangeably and may be mixed.
//! Each record is tagged with the geometry type of the `<type>/` directory it
//! was found in, falling back to the type of its own geometry.

use std::fs;
use std::path::{Path, PathBuf};

use dxf2geo_core_common::{VectorReadError, VectorReader};
use log::{debug, info, warn};
use vector_gpkg::GpkgReader;
use vector_shapefile::ShapefileReader;

use crate::error::{LoadError, Result};
use crate::geometry_type::GeometryType;
use crate::types::{GeometryRecord, GeometryTable, InvalidGeometry, InvalidReason, validate_geometry};

/// Everything a load produced: the records, what was dropped, and what was read.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub table: GeometryTable,
    /// Records dropped because their geometry was missing or invalid
    pub invalid: Vec<InvalidGeometry>,
    /// Files read, in load order
    pub files: Vec<PathBuf>,
}

/// A recognised file and the type tag implied by its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Discovered {
    path: PathBuf,
    tag: Option<GeometryType>,
}

/// Loads vector files with a set of format readers.
pub struct GeometryLoader {
    readers: Vec<Box<dyn VectorReader>>,
}

impl Default for GeometryLoader {
    fn default() -> Self {
        Self {
            readers: vec![Box::new(ShapefileReader::new()), Box::new(GpkgReader::new())],
        }
    }
}

impl GeometryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reader_for(&self, path: &Path) -> Option<&dyn VectorReader> {
        self.readers
            .iter()
            .find(|reader| reader.accepts(path))
            .map(|reader| &**reader)
    }

    fn is_recognised(&self, path: &Path) -> bool {
        path.is_file() && self.reader_for(path).is_some()
    }

    fn dir_tag(dir: &Path) -> Option<GeometryType> {
        dir.file_name()?.to_str()?.parse().ok()
    }

    fn read_dir_sorted(dir: &Path) -> std::result::Result<Vec<PathBuf>, LoadError> {
        let entries = fs::read_dir(dir).map_err(|source| LoadError::Read {
            path: dir.to_path_buf(),
            source: VectorReadError::from(source),
        })?;
        let mut paths = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|source| LoadError::Read {
                path: dir.to_path_buf(),
                source: VectorReadError::from(source),
            })?;
        paths.sort();
        Ok(paths)
    }

    /// Finds the recognised files under `path`: the file itself, or the
    /// top-level files of a directory plus those one level down.
    fn discover(&self, path: &Path) -> std::result::Result<Vec<Discovered>, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let mut found = Vec::new();
        if path.is_file() {
            if self.is_recognised(path) {
                found.push(Discovered {
                    path: path.to_path_buf(),
                    tag: path.parent().and_then(Self::dir_tag),
                });
            }
        } else {
            for entry in Self::read_dir_sorted(path)? {
                if entry.is_dir() {
                    let tag = Self::dir_tag(&entry);
                    for nested in Self::read_dir_sorted(&entry)? {
                        if self.is_recognised(&nested) {
                            found.push(Discovered { path: nested, tag });
                        }
                    }
                } else if self.is_recognised(&entry) {
                    found.push(Discovered {
                        path: entry,
                        tag: None,
                    });
                }
            }
        }

        if found.is_empty() {
            return Err(LoadError::NoOutputFound {
                path: path.to_path_buf(),
            });
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    /// Loads every recognised file under `path`.
    ///
    /// # Errors
    ///
    /// - [`LoadError::NotFound`] if `path` does not exist
    /// - [`LoadError::NoOutputFound`] if it holds no `.shp` or `.gpkg` file
    /// - [`LoadError::Read`] if a recognised file cannot be read
    pub fn load(&self, path: &Path) -> std::result::Result<LoadOutcome, LoadError> {
        let mut outcome = LoadOutcome::default();

        for Discovered { path: file, tag } in self.discover(path)? {
            let Some(reader) = self.reader_for(&file) else {
                continue;
            };
            let layers = reader.read_layers(&file).map_err(|source| LoadError::Read {
                path: file.clone(),
                source,
            })?;

            for layer in layers {
                debug!("{}: layer {} with {} record(s)", file.display(), layer.name, layer.len());
                for (index, feature) in layer.records.into_iter().enumerate() {
                    let invalid = |reason| InvalidGeometry {
                        path: file.clone(),
                        layer: layer.name.clone(),
                        index,
                        reason,
                    };
                    let Some(geometry) = feature.geometry else {
                        outcome.invalid.push(invalid(InvalidReason::Missing));
                        continue;
                    };
                    if let Err(reason) = validate_geometry(&geometry) {
                        outcome.invalid.push(invalid(reason));
                        continue;
                    }
                    let Some(record) = GeometryRecord::new(geometry, feature.properties) else {
                        outcome
                            .invalid
                            .push(invalid(InvalidReason::Unsupported("GEOMETRYCOLLECTION".into())));
                        continue;
                    };

                    let geometry_type = match tag {
                        Some(tag) if tag.same_family(record.geometry_type) => tag,
                        _ => record.geometry_type,
                    };
                    outcome.table.push(GeometryRecord {
                        geometry_type,
                        ..record.with_source(layer.name.clone())
                    });
                }
            }
            outcome.files.push(file);
        }

        for invalid in &outcome.invalid {
            warn!("Dropped invalid geometry: {invalid}");
        }
        info!(
            "Loaded {} record(s) from {} file(s), dropped {} invalid",
            outcome.table.len(),
            outcome.files.len(),
            outcome.invalid.len()
        );
        Ok(outcome)
    }
}

/// Loads the outputs of an extraction run (or a single output file) into one table.
///
/// Invalid records are dropped and logged; use [`GeometryLoader::load`] to
/// inspect them.
///
/// # Errors
///
/// See [`GeometryLoader::load`].
pub fn load_geometries(path: &Path) -> Result<GeometryTable> {
    Ok(GeometryLoader::default().load(path)?.table)
}
