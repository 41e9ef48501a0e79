//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the narrow set of
//! filesystem operations the organizer needs: observing a file while it is
//! being written, listing a directory, and relocating files into category
//! folders. Keeping them behind a trait lets the completion detector and the
//! mover be exercised against [`MockBackend`] with scripted behaviour.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{MockBackend, Step};
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for filesystem access.
///
/// All paths are absolute. Operations are asynchronous so that a slow disk
/// (or a network share masquerading as a downloads folder) never blocks the
/// runtime that is also servicing filesystem notifications.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use blamite_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_if_present(backend: &dyn StorageBackend, path: &Path) -> Result<u64> {
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// Stream metadata for the regular files directly inside `dir`.
    ///
    /// Subdirectories are never descended into. A `dir` that cannot be read
    /// yields a single error carrying `dir` as its [`path`](crate::error::ErrorKind::path)
    /// and ends the stream; an entry that cannot be inspected yields an error
    /// and the stream carries on with the next one.
    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a>;

    /// Check if a path exists (file or directory).
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Fetch metadata for a regular file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing
    /// exists at `path`, and [`NotAFile`](crate::error::ErrorKind::NotAFile)
    /// if it is a directory.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Check that the file can be opened and read without conflicting with
    /// another process's lock.
    ///
    /// Reads at most one byte. Fails with
    /// [`Locked`](crate::error::ErrorKind::Locked) or
    /// [`PermissionDenied`](crate::error::ErrorKind::PermissionDenied) while a
    /// writer still holds the file, and
    /// [`NotFound`](crate::error::ErrorKind::NotFound) once it is gone.
    async fn probe(&self, path: &Path) -> Result<()>;

    /// Create a directory and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Move a file.
    ///
    /// Parent directories of `to` are **not** created. If `to` already exists
    /// it may be replaced; callers that must never overwrite check first.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}
