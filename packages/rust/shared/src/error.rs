//! Error types for the intake pipelines.
//!
//! Library crates use [`IntakeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only two variants abort a run: [`IntakeError::Mapping`] (the spreadsheet
//! is missing, unreadable, or lacks a respondent-identifier column) and
//! [`IntakeError::Io`] (destination directory unwritable or missing).
//! Everything else is isolated to a single artifact and surfaced through
//! the forensic log while the batch continues.

use std::path::PathBuf;

/// Top-level error type for all intake operations.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// Mapping spreadsheet missing, unreadable, or structurally invalid.
    /// Fatal: aborts the run before any artifact is touched.
    #[error("mapping error: {message}")]
    Mapping { message: String },

    /// Filesystem I/O error. Fatal when it concerns the destination root.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// External content engine failed on one artifact (corrupt file,
    /// unreachable URL, unsupported format). Per-artifact, non-fatal.
    #[error("engine error: {message}")]
    Engine { message: String },

    /// Two distinct source artifacts resolved to the same canonical
    /// output name. Fatal for the artifact, non-fatal for the run.
    #[error("output collision on {canonical}: {first} vs {second}")]
    Collision {
        canonical: String,
        first: String,
        second: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Data validation error (bad URL, malformed links file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IntakeError>;

impl IntakeError {
    /// Create a mapping error from any displayable message.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping {
            message: msg.into(),
        }
    }

    /// Create an engine error from any displayable message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole run (as opposed to one artifact).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Mapping { .. } | Self::Io { .. } | Self::Config { .. })
    }
}
