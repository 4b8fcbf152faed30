//! Error types for the edgequake-docconv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocConvError`] — **Fatal**: the operation cannot proceed at all
//!   (bad configuration file, destination folder cannot be created). Returned
//!   as `Err(DocConvError)` from construction APIs, and recorded as
//!   [`crate::report::StageReport::aborted`] when a run stops early.
//!
//! * [`StageError`] — **Non-fatal**: a single stage failed (tool directory
//!   missing, converter exited non-zero, timeout) but the remaining stages
//!   still run. Stored inside [`crate::report::StageResult`] so callers can
//!   inspect partial success rather than losing the whole run to one tool.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docconv library.
///
/// Stage-level failures use [`StageError`] and are stored in
/// [`crate::report::StageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocConvError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be read.
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file was read but is not a flat JSON object.
    #[error("Configuration file '{path}' is malformed: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    // ── Request errors ────────────────────────────────────────────────────
    /// A conversion request field cannot be used as a path component.
    #[error("Invalid conversion request: {0}")]
    InvalidRequest(String),

    // ── Filesystem errors ─────────────────────────────────────────────────
    /// The per-document destination folder could not be created.
    #[error("Cannot create destination folder '{path}': {source}\nCheck the upload directory exists and is writable.")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required tool directory or archive is missing.
    Configuration,
    /// An external process failed to launch, exited non-zero, or timed out.
    ProcessExecution,
    /// A filesystem operation failed.
    Io,
    /// Anything else, including a panicking collaborator.
    Internal,
}

/// A non-fatal error for a single stage.
///
/// Stored alongside [`crate::report::StageResult`] when a stage fails.
/// The pipeline always continues with the next stage.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum StageError {
    /// The configured tool directory does not exist or is not a directory.
    #[error("missing tool directory: '{path}'")]
    MissingToolDirectory { path: PathBuf },

    /// No archive in the tool directory starts with the main-archive prefix.
    #[error("main archive not found: no '{prefix}*' archive in '{dir}'")]
    MainArchiveNotFound { dir: PathBuf, prefix: String },

    /// An argument vector was empty, so there is no program to run.
    #[error("empty command line")]
    EmptyCommand,

    /// The process could not be spawned at all.
    #[error("failed to launch '{program}': {detail}")]
    LaunchFailed { program: String, detail: String },

    /// The process ran and exited with a non-zero status.
    #[error("process exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    /// The process was terminated by a signal and has no exit code.
    #[error("process terminated without exit code: {stderr}")]
    Terminated { stderr: String },

    /// The process exceeded the configured timeout and was killed.
    #[error("process timed out after {}", format_millis(.millis))]
    Timeout { millis: u64 },

    /// A filesystem operation failed.
    #[error("{op} failed for '{path}': {detail}")]
    Io {
        op: String,
        path: PathBuf,
        detail: String,
    },

    /// Unexpected failure inside a stage.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StageError {
    /// Classify this error into the four-way taxonomy callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::MissingToolDirectory { .. } | StageError::MainArchiveNotFound { .. } => {
                ErrorKind::Configuration
            }
            StageError::EmptyCommand
            | StageError::LaunchFailed { .. }
            | StageError::NonZeroExit { .. }
            | StageError::Terminated { .. }
            | StageError::Timeout { .. } => ErrorKind::ProcessExecution,
            StageError::Io { .. } => ErrorKind::Io,
            StageError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn timeout(limit: std::time::Duration) -> Self {
        StageError::Timeout {
            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn io(op: &str, path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        StageError::Io {
            op: op.to_string(),
            path: path.into(),
            detail: err.to_string(),
        }
    }
}

fn format_millis(millis: &u64) -> String {
    let millis = *millis;
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}
