//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// File already exists (for operations that require new files)
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// Path exists but is a directory (or something else that isn't a regular file)
    #[display("not a regular file: {}", _0.display())]
    NotAFile(#[error(not(source))] PathBuf),
    /// Path exists but is not a directory
    #[display("not a directory: {}", _0.display())]
    NotADirectory(#[error(not(source))] PathBuf),
    /// A directory exists but its entries cannot be listed
    #[display("cannot list directory: {}", _0.display())]
    Unlistable(#[error(not(source))] PathBuf),
    /// File is held open by another process (sharing violation)
    #[display("file is locked: {}", _0.display())]
    Locked(#[error(not(source))] PathBuf),
    /// Path contains invalid characters or is not a single folder name
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Map an I/O error onto the kind the caller can act on, attaching the
    /// path that caused it.
    pub fn from_io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            std::io::ErrorKind::NotADirectory => Self::NotADirectory(path.to_path_buf()),
            _ if is_sharing_violation(&err) => Self::Locked(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` when the error means the path no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The path the error refers to, if it carries one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::AlreadyExists(p)
            | Self::NotAFile(p)
            | Self::NotADirectory(p)
            | Self::Unlistable(p)
            | Self::Locked(p)
            | Self::InvalidPath(p) => Some(p),
            Self::Io(_) | Self::BackendError(_) => None,
        }
    }
}

/// `ERROR_SHARING_VIOLATION` (32) and `ERROR_LOCK_VIOLATION` (33) are what
/// Windows reports while a browser still holds a download open.
#[cfg(windows)]
fn is_sharing_violation(err: &IoError) -> bool {
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_sharing_violation(_err: &IoError) -> bool {
    false
}
