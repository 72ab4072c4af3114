//! Error types for Stitch
//!
//! Uses `thiserror` for library errors. Per-path dispatch problems (conflicts,
//! transport failures, unrecognized files) are logged and skipped at the
//! dispatch boundary; only pre-flight structural problems surface as errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stitch operations
pub type StitchResult<T> = Result<T, StitchError>;

/// Main error type for Stitch operations
#[derive(Error, Debug)]
pub enum StitchError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (metadata, tracking record, server payloads)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file parsing error
    #[error("invalid config in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    /// Path is not inside a tracked content root
    #[error("'{path}' is not under a tracked content root (missing .stitch/tracking.json)")]
    UntrackedRoot { path: PathBuf },

    /// Path escapes the tracked content root
    #[error("path '{path}' is outside the tracked root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Tracking record points at a different node than the requested target
    #[error("tracked content belongs to node '{recorded}' but the target is '{requested}' - use transfer mode to push across nodes")]
    NodeMismatch { recorded: String, requested: String },

    /// Transfer mode requested between incompatible server versions
    #[error("cannot transfer from server version {recorded} to {requested} - major versions differ")]
    VersionIncompatible { recorded: String, requested: String },

    /// Entity directory has no readable metadata file
    #[error("no {file} found in {dir}")]
    MissingMetadata { dir: PathBuf, file: String },

    /// Remote collaborator reported a failure outside the put/create protocol
    #[error("remote error: {message}")]
    Remote { message: String },
}
