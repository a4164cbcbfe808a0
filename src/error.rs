//! Error types for the docs2fichas library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FichaError`]: **Fatal**: the run cannot proceed (bad directories,
//!   model backend unreachable, model process failed). Returned as
//!   `Err(FichaError)` from [`crate::run::run`] and
//!   [`crate::controller::RunHandle::wait`].
//!
//! * [`ExtractionError`]: **Non-fatal**: a single source file could not be
//!   decoded or staged. The file is skipped, the error is recorded in
//!   [`crate::output::RunOutput::skipped`] and the run continues.
//!
//! Every fatal variant belongs to one [`ErrorClass`] so callers can react to
//! the class (e.g. "start the backend") without matching every variant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`FichaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Bad or missing directories; rejected before any run starts.
    Validation,
    /// The model backend is not reachable.
    Connection,
    /// The model process failed for any other reason.
    Inference,
    /// The unit could not be encoded for transmission to the model process.
    Encoding,
    /// Staging or results filesystem failure.
    Io,
    /// Unexpected internal failure (worker panic, runtime creation).
    Internal,
}

/// All fatal errors returned by the docs2fichas library.
///
/// Per-file decode failures use [`ExtractionError`] and never surface here.
#[derive(Debug, Error)]
pub enum FichaError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// No input directory was given.
    #[error("Please select an input directory")]
    MissingInputDir,

    /// No output directory was given.
    #[error("Please select an output directory")]
    MissingOutputDir,

    /// The input directory does not exist.
    #[error("Input directory does not exist: '{path}'")]
    InputDirNotFound { path: PathBuf },

    /// The input path exists but is not a directory.
    #[error("Input path is not a directory: '{path}'")]
    InputNotADirectory { path: PathBuf },

    /// The input directory exists but could not be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output directory is absent and could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run is already in flight on this controller.
    #[error("A run is already in progress; wait for it to finish before starting another")]
    RunInProgress,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The prompt or model id cannot be passed to the runner as an argument.
    #[error("Invalid request: {0}")]
    InvalidArgument(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The runner reported that it could not reach its backend.
    #[error(
        "Model backend is not running or not accessible.\n\
Please start the server (e.g. `{runner} serve`) and try again.\n\
Diagnostic: {diagnostic}"
    )]
    BackendUnreachable { runner: String, diagnostic: String },

    /// The runner exited with a non-zero status for another reason.
    #[error("Error processing '{unit}' with the model (exit code {status}): {diagnostic}", status = exit_code_label(*.code))]
    InferenceFailed {
        unit: String,
        code: Option<i32>,
        diagnostic: String,
    },

    /// The runner executable could not be started at all.
    #[error("Could not start model runner '{runner}': {source}\nIs it installed and on PATH?")]
    RunnerUnavailable {
        runner: String,
        #[source]
        source: std::io::Error,
    },

    /// The unit could not be encoded for transmission to the runner.
    #[error("Encoding error processing '{unit}': {detail}. The content may contain unsupported characters.")]
    Encoding { unit: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A staging artifact or the staging directory could not be written/read.
    #[error("Staging failure at '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A ficha could not be written to the results directory.
    #[error("Failed to write ficha '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_code_label(code: Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

impl FichaError {
    /// The taxonomy class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            FichaError::MissingInputDir
            | FichaError::MissingOutputDir
            | FichaError::InputDirNotFound { .. }
            | FichaError::InputNotADirectory { .. }
            | FichaError::InputDirUnreadable { .. }
            | FichaError::OutputDirCreateFailed { .. }
            | FichaError::RunInProgress
            | FichaError::InvalidConfig(_)
            | FichaError::InvalidArgument(_) => ErrorClass::Validation,
            FichaError::BackendUnreachable { .. } => ErrorClass::Connection,
            FichaError::InferenceFailed { .. } | FichaError::RunnerUnavailable { .. } => {
                ErrorClass::Inference
            }
            FichaError::Encoding { .. } => ErrorClass::Encoding,
            FichaError::Staging { .. } | FichaError::OutputWriteFailed { .. } => ErrorClass::Io,
            FichaError::Internal(_) => ErrorClass::Internal,
        }
    }
}

/// A non-fatal error for a single source file.
///
/// The file is skipped; all other files are processed normally.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionError {
    /// The PDF could not be parsed.
    #[error("Error processing PDF {file}: {detail}")]
    Pdf { file: String, detail: String },

    /// The Word document is corrupt or in an unsupported format.
    #[error("Error processing Word document {file}: {detail}")]
    Word { file: String, detail: String },

    /// The file could not be read from disk.
    #[error("Error reading {file}: {detail}")]
    Read { file: String, detail: String },

    /// The decoded text could not be written to the staging directory.
    #[error("Error staging {file}: {detail}")]
    Stage { file: String, detail: String },
}

impl ExtractionError {
    /// Name of the file that failed.
    pub fn file(&self) -> &str {
        match self {
            ExtractionError::Pdf { file, .. }
            | ExtractionError::Word { file, .. }
            | ExtractionError::Read { file, .. }
            | ExtractionError::Stage { file, .. } => file,
        }
    }
}
