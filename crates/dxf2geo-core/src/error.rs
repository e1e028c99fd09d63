//! Error types for `dxf2geo` operations.
//!
//! The root [`Dxf2GeoError`] delegates to one enum per pipeline stage. Only
//! input and output problems abort an extraction run: a [`TranslationError`]
//! is caught per geometry type by the orchestrator and written to the run log.

use std::path::PathBuf;

use dxf2geo_core_common::VectorReadError;
use thiserror::Error;

use crate::geometry_type::TypeSelection;

/// Main error type for `dxf2geo` operations.
#[derive(Debug, Error)]
pub enum Dxf2GeoError {
    /// The source drawing is missing or cannot be read
    #[error(transparent)]
    Input(#[from] InputError),

    /// The external translator failed for one geometry type
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Reading extracted outputs back failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Output directory or artefact could not be written
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Invalid options or configuration file
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Strict mode: at least one requested type failed or wrote no features
    #[error(
        "Extraction incomplete: {failed} of {requested} geometry type(s) failed or produced no features (see {})",
        log_path.display()
    )]
    IncompleteExtraction {
        /// Number of types that failed or were empty
        failed: usize,
        /// Number of types requested
        requested: usize,
        /// The run log describing each attempt
        log_path: PathBuf,
    },

    /// Generic errors from dependencies
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Problems with the source drawing. Always fatal.
#[derive(Debug, Error)]
pub enum InputError {
    /// The input path does not exist
    #[error("Input file not found: '{path}'")]
    NotFound {
        /// The missing path
        path: PathBuf,
    },

    /// The input path exists but is not a regular file
    #[error("Input path is not a file: '{path}'")]
    NotAFile {
        /// The offending path
        path: PathBuf,
    },

    /// The translator could not open the input at all
    #[error("Cannot read input '{path}': {detail}")]
    Unreadable {
        /// The input path
        path: PathBuf,
        /// Translator diagnostics
        detail: String,
    },
}

/// Failure translating one geometry type.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The translator executable could not be started
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        /// The program that was invoked
        program: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The translator exited with a non-zero status
    #[error("Translator failed for {geometry_type} (exit status {}): {stderr}", status.map_or_else(|| "signal".to_string(), |s| s.to_string()))]
    Failed {
        /// The geometry type being translated
        geometry_type: TypeSelection,
        /// Exit code, `None` when terminated by a signal
        status: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The translator did not finish in time and was killed
    #[error("Translator timed out for {geometry_type} after {timeout_secs}s")]
    TimedOut {
        /// The geometry type being translated
        geometry_type: TypeSelection,
        /// The configured timeout
        timeout_secs: u64,
    },

    /// The translator reported success but wrote nothing
    #[error("Translator produced no output for {geometry_type} at '{path}'")]
    MissingOutput {
        /// The geometry type being translated
        geometry_type: TypeSelection,
        /// The expected output file
        path: PathBuf,
    },

    /// The written output could not be read back to count features
    #[error("Output for {geometry_type} at '{path}' is unreadable: {source}")]
    Unreadable {
        /// The geometry type being translated
        geometry_type: TypeSelection,
        /// The output file
        path: PathBuf,
        /// The underlying reader error
        #[source]
        source: VectorReadError,
    },

    /// Features rejected by the extraction filters could not be removed
    #[error("Failed to filter output for {geometry_type} at '{path}': {source}")]
    Filter {
        /// The geometry type being translated
        geometry_type: TypeSelection,
        /// The output file
        path: PathBuf,
        /// The underlying rewrite error
        #[source]
        source: VectorReadError,
    },
}

/// Failures of the geometry loader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The path to load from does not exist
    #[error("Path not found: '{path}'")]
    NotFound {
        /// The missing path
        path: PathBuf,
    },

    /// No `.shp` or `.gpkg` file was found
    #[error("No vector output found in '{path}' (expected .shp or .gpkg files)")]
    NoOutputFound {
        /// The directory or file that was scanned
        path: PathBuf,
    },

    /// A recognised file could not be read
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// The file being read
        path: PathBuf,
        /// The underlying reader error
        #[source]
        source: VectorReadError,
    },
}

/// Output directory and artefact errors.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The output directory already holds files and overwriting was not requested
    #[error("Output directory '{path}' is not empty")]
    DirectoryNotEmpty {
        /// The output directory
        path: PathBuf,
    },

    /// The input drawing lies inside the output directory
    #[error("Input '{}' is inside the output directory '{}'", input.display(), output.display())]
    InputInsideOutput {
        /// The input drawing
        input: PathBuf,
        /// The output directory
        output: PathBuf,
    },

    /// Failed to create a directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The directory
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a directory
    #[error("Failed to remove '{path}': {source}")]
    Remove {
        /// The directory
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write '{path}': {source}")]
    Write {
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Unknown output format name
    #[error("Unknown output format '{name}'. Available formats: {available}")]
    UnknownFormat {
        /// The requested name
        name: String,
        /// Comma-separated list of formats that can be extracted
        available: String,
    },

    /// The configuration file could not be read
    #[error("Failed to read config '{path}': {source}")]
    Read {
        /// The config file
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this tool
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        /// The config file
        path: PathBuf,
        /// The underlying error
        #[source]
        source: toml::de::Error,
    },
}

/// Type alias for Results using `Dxf2GeoError`.
pub type Result<T> = std::result::Result<T, Dxf2GeoError>;

impl Dxf2GeoError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Input(e) => e.to_string(),
            Self::Translation(e) => format!("Translation error: {e}"),
            Self::Load(e) => e.to_string(),
            Self::Output(e) => e.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::IncompleteExtraction { .. } => self.to_string(),
            Self::Other(e) => format!("Error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Input(InputError::NotFound { .. } | InputError::NotAFile { .. }) => {
                Some("Check that the DXF path is correct and the file exists.".to_string())
            },
            Self::Input(InputError::Unreadable { .. }) => Some(
                "Check that GDAL is installed with DXF support ('ogrinfo --formats').".to_string(),
            ),
            Self::Translation(TranslationError::Spawn { .. }) => Some(
                "Install GDAL or pass the ogr2ogr location with '--ogr2ogr'.".to_string(),
            ),
            Self::Translation(TranslationError::TimedOut { .. }) => {
                Some("Increase the limit with '--timeout'.".to_string())
            },
            Self::Load(LoadError::NoOutputFound { .. }) => {
                Some("Run 'dxf2geo extract' first, or point at its output directory.".to_string())
            },
            Self::Output(OutputError::DirectoryNotEmpty { .. }) => Some(
                "Choose an empty directory or pass '--overwrite' to replace its contents."
                    .to_string(),
            ),
            Self::Output(OutputError::InputInsideOutput { .. }) => Some(
                "Write the extraction to a directory that does not contain the drawing."
                    .to_string(),
            ),
            Self::Config(ConfigError::UnknownFormat { .. }) => {
                Some("Run 'dxf2geo formats' to see the available formats.".to_string())
            },
            Self::IncompleteExtraction { .. } => Some(
                "Inspect export.log for the failing types, or drop '--strict'.".to_string(),
            ),
            _ => None,
        }
    }

    /// Check if this error is potentially recoverable by changing options.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Translation(_)
                | Self::Output(
                    OutputError::DirectoryNotEmpty { .. } | OutputError::InputInsideOutput { .. }
                )
        )
    }
}

/// Extension trait for adding output context to errors.
pub trait OutputErrorExt<T> {
    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`OutputError::Write`] if the underlying operation fails.
    fn with_write_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> OutputErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            Dxf2GeoError::Output(OutputError::Write {
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

/// Helper to create `ConfigError::UnknownFormat` listing the extractable formats.
#[must_use]
pub fn format_not_found(name: &str) -> ConfigError {
    use crate::drivers::get_output_format_names;

    ConfigError::UnknownFormat {
        name: name.to_string(),
        available: get_output_format_names().join(", "),
    }
}
