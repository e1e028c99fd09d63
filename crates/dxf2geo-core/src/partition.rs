//! Output directory layout: one subdirectory per geometry type plus the run log.
//!
//! ```text
//! <root>/
//!   export.log
//!   point/point.shp
//!   linestring/linestring.shp
//!   ...
//! ```
//!
//! A flattened run has a single `all_geometries/all_geometries.gpkg` partition.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::drivers::OutputFormat;
use crate::error::OutputError;
use crate::geometry_type::{GeometryType, TypeSelection};
use crate::run_log::LOG_FILE_NAME;

/// Where one geometry type is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub geometry_type: TypeSelection,
    /// `<root>/<type>`
    pub dir: PathBuf,
    /// `<root>/<type>/<type>.<ext>`
    pub output: PathBuf,
}

/// The full set of partitions for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub root: PathBuf,
    pub log_path: PathBuf,
    pub partitions: Vec<Partition>,
}

impl PartitionPlan {
    /// Plans one partition per requested type, duplicates removed in request
    /// order. An empty request means [`GeometryType::DEFAULT`].
    #[must_use]
    pub fn new(root: &Path, geometry_types: &[GeometryType], format: OutputFormat) -> Self {
        let types = if geometry_types.is_empty() {
            GeometryType::DEFAULT.to_vec()
        } else {
            GeometryType::dedup(geometry_types)
        };

        let partitions = types
            .into_iter()
            .map(|ty| Partition::new(root, ty.into(), format))
            .collect();
        Self::with_partitions(root, partitions)
    }

    /// Plans the single partition of a flattened run.
    #[must_use]
    pub fn flattened(root: &Path, format: OutputFormat) -> Self {
        Self::with_partitions(root, vec![Partition::new(root, TypeSelection::All, format)])
    }

    fn with_partitions(root: &Path, partitions: Vec<Partition>) -> Self {
        Self {
            root: root.to_path_buf(),
            log_path: root.join(LOG_FILE_NAME),
            partitions,
        }
    }

    /// The single geometry types planned; empty for a flattened run.
    #[must_use]
    pub fn geometry_types(&self) -> Vec<GeometryType> {
        self.partitions
            .iter()
            .filter_map(|p| p.geometry_type.single())
            .collect()
    }
}

impl Partition {
    fn new(root: &Path, geometry_type: TypeSelection, format: OutputFormat) -> Self {
        let dir = root.join(geometry_type.dir_name());
        let output = dir
            .join(geometry_type.dir_name())
            .with_extension(format.extension());
        Self {
            geometry_type,
            dir,
            output,
        }
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Makes `root` an empty directory.
///
/// A missing directory is created. An existing empty one is used as is. A
/// non-empty one is refused with [`OutputError::DirectoryNotEmpty`] unless
/// `overwrite` is set, in which case it is deleted and recreated.
///
/// # Errors
///
/// Returns an [`OutputError`] if the directory is refused or cannot be
/// created or removed.
pub fn prepare_output_dir(root: &Path, overwrite: bool) -> Result<(), OutputError> {
    let create_error = |source| OutputError::CreateDir {
        path: root.to_path_buf(),
        source,
    };

    if root.exists() {
        if !root.is_dir() {
            return Err(create_error(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists and is not a directory",
            )));
        }
        if is_empty_dir(root).map_err(create_error)? {
            return Ok(());
        }
        if !overwrite {
            return Err(OutputError::DirectoryNotEmpty {
                path: root.to_path_buf(),
            });
        }
        info!("Replacing existing output directory {}", root.display());
        remove_dir(root)?;
    }

    fs::create_dir_all(root).map_err(create_error)
}

/// Refuses an output directory that contains the input drawing, which a
/// replacing run would otherwise delete. Both paths are compared after
/// resolving symlinks and relative components.
///
/// # Errors
///
/// Returns [`OutputError::InputInsideOutput`], or [`OutputError::CreateDir`] if
/// an existing output path cannot be resolved.
pub fn check_input_outside(input: &Path, root: &Path) -> Result<(), OutputError> {
    if !root.exists() {
        return Ok(());
    }
    let resolve = |path: &Path| {
        fs::canonicalize(path).map_err(|source| OutputError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    };
    if resolve(input)?.starts_with(resolve(root)?) {
        return Err(OutputError::InputInsideOutput {
            input: input.to_path_buf(),
            output: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Creates a partition's subdirectory.
///
/// # Errors
///
/// Returns [`OutputError::CreateDir`] on failure.
pub fn create_partition_dir(partition: &Partition) -> Result<(), OutputError> {
    fs::create_dir_all(&partition.dir).map_err(|source| OutputError::CreateDir {
        path: partition.dir.clone(),
        source,
    })
}

/// Recursively removes a directory; a missing directory is not an error.
///
/// # Errors
///
/// Returns [`OutputError::Remove`] on failure.
pub fn remove_dir(path: &Path) -> Result<(), OutputError> {
    match fs::remove_dir_all(path) {
        Err(source) if source.kind() != io::ErrorKind::NotFound => Err(OutputError::Remove {
            path: path.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}
