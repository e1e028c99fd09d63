//! I/O traits for reading vector outputs back into memory and thinning them in place.

use std::path::Path;

use vector_shared::{VectorLayer, VectorReadResult};

/// Trait for reading every feature layer from a vector file.
///
/// Implementations are registered with the loader by file extension, so a
/// directory may mix formats freely.
pub trait VectorReader: Send + Sync {
    /// Short driver name, matching the registry entry (e.g., `"ESRI Shapefile"`).
    fn driver_name(&self) -> &'static str;

    /// File extension handled by this reader, lower case, without the dot.
    fn extension(&self) -> &'static str;

    /// Reads all feature layers stored in `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`vector_shared::VectorReadError`] if the file cannot be opened
    /// or decoded.
    fn read_layers(&self, path: &Path) -> VectorReadResult<Vec<VectorLayer>>;

    /// Returns `true` if `path` has this reader's extension (case-insensitive).
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension()))
    }

    /// Counts the features in `path` across all of its layers.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`VectorReader::read_layers`].
    fn count_features(&self, path: &Path) -> VectorReadResult<usize> {
        Ok(self.read_layers(path)?.iter().map(VectorLayer::len).sum())
    }
}

/// Trait for dropping features from a vector file in place.
///
/// Features are addressed by layer name and their index within that layer, in
/// the order [`VectorReader::read_layers`] returns them.
pub trait VectorRetainer: Send + Sync {
    /// Rewrites `path` keeping only the features for which `keep(layer, index)`
    /// returns `true`. Returns the number of features removed.
    ///
    /// # Errors
    ///
    /// Returns a [`vector_shared::VectorReadError`] if the file cannot be read
    /// or rewritten.
    fn retain_features(
        &self,
        path: &Path,
        keep: &mut dyn FnMut(&str, usize) -> bool,
    ) -> VectorReadResult<usize>;
}
