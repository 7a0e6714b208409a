//! Error types shared across the sideload storage, pipelines, and lifecycle glue.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Canonical error type for the sideload subsystem.
#[derive(Error, Debug)]
pub enum SideloadError {
    #[error("no sideloaded payload for index {index} term {term}")]
    NotFound { index: u64, term: u64 },

    #[error("directory not empty: {path}", path = path.display())]
    DirectoryNotEmpty { path: PathBuf },

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("filename is only available for on-disk sideload storage")]
    FilenameUnsupported,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a [`SideloadError`].
pub type SideloadResult<T> = Result<T, SideloadError>;

/// Typed error produced by the inlining pipeline's snapshot-batch entry point
/// when a payload a snapshot needs has already been truncated away. The
/// caller is expected to restart snapshotting from a fresh engine + log
/// snapshot pair rather than retry this call directly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sideloaded payload missing for index {index} term {term}, snapshot must restart")]
pub struct MustRetrySnapshotDueToTruncation {
    pub index: u64,
    pub term: u64,
}
