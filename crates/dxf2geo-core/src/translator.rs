//! The process boundary to the CAD-to-vector translator.
//!
//! [`Translator`] is the narrow seam the orchestrator depends on: one input
//! file, one output file, one geometry type (or all of them, flattened). [`Ogr2Ogr`] implements it with
//! GDAL's command-line tools.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::drivers::OutputFormat;
use crate::error::{InputError, TranslationError};
use crate::geometry_type::TypeSelection;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One translation: write the features of `geometry_type` from `input` to `output`.
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub geometry_type: TypeSelection,
    pub format: OutputFormat,
}

/// Converts a drawing into a vector file restricted to one geometry type.
pub trait Translator {
    /// Name recorded in the run log.
    fn name(&self) -> String;

    /// Checks that `input` can be opened at all. Failure here aborts the run.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if the input is unreadable.
    fn check_readable(&self, _input: &Path) -> Result<(), InputError> {
        Ok(())
    }

    /// Performs one translation.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] if the translation did not complete.
    fn translate(&self, request: &TranslationRequest<'_>) -> Result<(), TranslationError>;
}

/// GDAL's `ogr2ogr`, with `ogrinfo` used to check the input up front.
#[derive(Debug, Clone)]
pub struct Ogr2Ogr {
    program: PathBuf,
    ogrinfo: PathBuf,
    timeout: Option<Duration>,
}

impl Default for Ogr2Ogr {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ogr2ogr"),
            ogrinfo: PathBuf::from("ogrinfo"),
            timeout: None,
        }
    }
}

impl Ogr2Ogr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific `ogr2ogr` executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Uses a specific `ogrinfo` executable for the input check.
    #[must_use]
    pub fn with_ogrinfo(mut self, ogrinfo: impl Into<PathBuf>) -> Self {
        self.ogrinfo = ogrinfo.into();
        self
    }

    /// Kills a translation that runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn ogrinfo(&self) -> &Path {
        &self.ogrinfo
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Arguments passed to `ogr2ogr` for a request.
    ///
    /// A single type is selected with `-where OGR_GEOMETRY=...`; the flattened
    /// partition copies everything into one `GEOMETRY` layer.
    #[must_use]
    pub fn args(request: &TranslationRequest<'_>) -> Vec<OsString> {
        let selection = request.geometry_type;
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            request.format.ogr_driver().into(),
            "-overwrite".into(),
            "-skipfailures".into(),
            "-nln".into(),
            selection.dir_name().into(),
            "-nlt".into(),
        ];
        match selection.single() {
            Some(ty) => args.extend([
                ty.as_str().into(),
                "-where".into(),
                format!("OGR_GEOMETRY='{}'", ty.as_str()).into(),
            ]),
            None => args.push("GEOMETRY".into()),
        }
        args.push(request.output.as_os_str().to_owned());
        args.push(request.input.as_os_str().to_owned());
        args
    }
}

impl Translator for Ogr2Ogr {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    fn check_readable(&self, input: &Path) -> Result<(), InputError> {
        let mut command = Command::new(&self.ogrinfo);
        command.args(["-ro", "-so"]).arg(input);

        let unreadable = |detail: String| InputError::Unreadable {
            path: input.to_path_buf(),
            detail,
        };
        match run(command, self.timeout) {
            Ok(RunOutcome::Exited { status, .. }) if status.success() => Ok(()),
            Ok(RunOutcome::Exited { stderr, .. }) => Err(unreadable(stderr)),
            Ok(RunOutcome::TimedOut) => Err(unreadable("ogrinfo timed out".to_string())),
            Err(err) => Err(unreadable(format!(
                "failed to run '{}': {err}",
                self.ogrinfo.display()
            ))),
        }
    }

    fn translate(&self, request: &TranslationRequest<'_>) -> Result<(), TranslationError> {
        let mut command = Command::new(&self.program);
        command.args(Self::args(request));
        debug!("Running {command:?}");

        let outcome = run(command, self.timeout).map_err(|source| TranslationError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        match outcome {
            RunOutcome::Exited { status, .. } if status.success() => Ok(()),
            RunOutcome::Exited { status, stderr } => Err(TranslationError::Failed {
                geometry_type: request.geometry_type,
                status: status.code(),
                stderr,
            }),
            RunOutcome::TimedOut => Err(TranslationError::TimedOut {
                geometry_type: request.geometry_type,
                timeout_secs: self.timeout.map_or(0, |t| t.as_secs()),
            }),
        }
    }
}

enum RunOutcome {
    Exited { status: ExitStatus, stderr: String },
    TimedOut,
}

/// Runs a command to completion or until `timeout`, capturing stderr.
fn run(mut command: Command, timeout: Option<Duration>) -> std::io::Result<RunOutcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let mut child = command.spawn()?;

    let stderr = child.stderr.take();
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr {
            // Partial output is still useful diagnostics.
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    // The reader is detached: a grandchild may still hold the pipe open.
                    return Ok(RunOutcome::TimedOut);
                }
                thread::sleep(POLL_INTERVAL);
            }
        },
    };

    let stderr = reader.join().unwrap_or_default().trim().to_string();
    Ok(RunOutcome::Exited { status, stderr })
}
