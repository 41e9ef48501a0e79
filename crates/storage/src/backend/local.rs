//! Local filesystem storage backend.
//!
//! Files are accessed using standard filesystem operations via `tokio::fs`
//! for async I/O.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{FileInfo, StorageBackend};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio::io::AsyncReadExt;

enum ListEntry {
    File(FileInfo),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use blamite_storage::backend::{LocalBackend, StorageBackend};
/// use std::path::Path;
///
/// # async fn example() -> blamite_storage::error::Result<()> {
/// let backend = LocalBackend::new("downloads");
/// let info = backend.stat(Path::new("/home/me/Downloads/report.pdf")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Re-use same data collection from file metadata for both list and stat functions
    fn metadata(path: &Path, metadata: &Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(|e| ErrorKind::from_io(e, path))?.into();
        Ok(FileInfo::new(PathBuf::from(path), metadata.len(), modified))
    }

    /// Pulled out of the listing stream so that `?` can be used; inside the
    /// `stream!` block every error has to be converted and yielded by hand.
    async fn process_entry(&self, entry: DirEntry) -> Result<ListEntry> {
        let path = entry.path();
        // `DirEntry::metadata` does not follow symlinks; a link to a
        // finished download should be organized like the download itself.
        let metadata = fs::metadata(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        if metadata.is_file() {
            return Ok(ListEntry::File(Self::metadata(&path, &metadata)?));
        }
        Ok(ListEntry::Skip)
    }

    /// Fallback for `rename` across filesystems: copy, then remove the source.
    async fn copy_and_remove(from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to).await.map_err(|e| ErrorKind::from_io(e, to))?;
        if let Err(e) = fs::remove_file(from).await {
            // Leave the filesystem as we found it rather than keeping two copies.
            _ = fs::remove_file(to).await;
            exn::bail!(ErrorKind::from_io(e, from));
        }
        Ok(())
    }
}
impl Default for LocalBackend {
    fn default() -> Self {
        Self::new("local")
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a> {
        Box::pin(stream! {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    yield Err(unlistable(err, dir));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => { yield Err(exn::Exn::from(ErrorKind::from_io(e, dir))); break; },
                };
                match self.process_entry(entry).await {
                    Ok(ListEntry::File(f)) => yield Ok(f),
                    // Directories, sockets, and broken symlinks.
                    Ok(ListEntry::Skip) => {},
                    Err(e) => yield Err(e),
                };
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await.map_err(|e| ErrorKind::from_io(e, path))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let metadata = fs::metadata(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotAFile(path.to_path_buf()));
        }
        Self::metadata(path, &metadata)
    }

    async fn probe(&self, path: &Path) -> Result<()> {
        let mut file = fs::File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        let mut buffer = [0u8; 1];
        file.read(&mut buffer).await.map_err(|e| ErrorKind::from_io(e, path))?;
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(path).await.map_err(|e| ErrorKind::from_io(e, path))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        match fs::rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Rename crosses filesystems; copying instead",
                );
                Self::copy_and_remove(from, to).await
            },
            Err(e) => exn::bail!(ErrorKind::from_io(e, from)),
        }
    }
}

/// Failing to open `dir` for listing always names `dir`, even when the I/O
/// error itself does not map onto a kind that carries a path.
#[track_caller]
fn unlistable(err: std::io::Error, dir: &Path) -> exn::Exn<ErrorKind> {
    let kind = ErrorKind::from_io(err, dir);
    if kind.path().is_some() {
        return exn::Exn::from(kind);
    }
    exn::Exn::from(kind).raise(ErrorKind::Unlistable(dir.to_path_buf()))
}
