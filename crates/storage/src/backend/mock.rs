//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::OffsetDateTime;

/// One scripted change applied to a file the next time it is stat'ed.
///
/// Scripts model a writer working on the file in between polls: a completion
/// detector that stats once per polling round consumes exactly one step per
/// round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Set the file size and release any lock.
    Size(u64),
    /// Set the file size and hold a lock (probing fails).
    Locked(u64),
    /// Delete the file.
    Remove,
}

#[derive(Clone, Debug)]
struct Entry {
    size: u64,
    modified: OffsetDateTime,
    locked: bool,
}

#[derive(Default)]
struct State {
    files: HashMap<PathBuf, Entry>,
    dirs: HashSet<PathBuf>,
    scripts: HashMap<PathBuf, VecDeque<Step>>,
    stats: HashMap<PathBuf, usize>,
    failing_dirs: HashSet<PathBuf>,
    silent_renames: bool,
}

/// In-memory storage backend for testing.
///
/// State lives behind a [`Mutex`] (never held across an `.await`), so all
/// trait methods operate on `&self`. Beyond plain storage it can script how a
/// file changes between polls ([`Step`]), refuse to create particular
/// directories, and "succeed" at renames without doing anything, which is
/// how the organizer's failure paths get exercised.
///
/// # Examples
///
/// ```
/// use blamite_storage::backend::{MockBackend, StorageBackend, Step};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("/downloads/a.pdf", 10)]);
/// backend.script("/downloads/a.pdf", [Step::Size(20)]);
/// assert_eq!(backend.stat(Path::new("/downloads/a.pdf")).await?.size, 20);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    state: Mutex<State>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files of the given sizes.
    ///
    /// Parent directories of every file are registered as existing.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, u64)>) -> Self {
        let backend = Self {
            name: "mock".to_string(),
            state: Mutex::new(State::default()),
        };
        let now = OffsetDateTime::now_utc();
        for (path, size) in files {
            backend.insert(path, size, now);
        }
        backend
    }

    /// Add (or replace) a file with an explicit modification time.
    pub fn insert(&self, path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) {
        let path = path.into();
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            register_dirs(&mut state.dirs, parent);
        }
        state.files.insert(path, Entry { size, modified, locked: false });
    }

    /// Register an (empty) directory.
    pub fn insert_dir(&self, path: impl AsRef<Path>) {
        register_dirs(&mut self.lock().dirs, path.as_ref());
    }

    /// Queue steps to apply to `path`, one per call to [`stat`](StorageBackend::stat).
    pub fn script(&self, path: impl Into<PathBuf>, steps: impl IntoIterator<Item = Step>) {
        self.lock().scripts.entry(path.into()).or_default().extend(steps);
    }

    /// Hold or release the lock on a file.
    pub fn set_locked(&self, path: impl AsRef<Path>, locked: bool) {
        if let Some(entry) = self.lock().files.get_mut(path.as_ref()) {
            entry.locked = locked;
        }
    }

    /// Make [`create_dir_all`](StorageBackend::create_dir_all) fail for `path`.
    pub fn fail_create_dir(&self, path: impl Into<PathBuf>) {
        self.lock().failing_dirs.insert(path.into());
    }

    /// Make [`rename`](StorageBackend::rename) report success without moving anything.
    pub fn silent_renames(&self) {
        self.lock().silent_renames = true;
    }

    /// Does a file (not a directory) exist at `path`?
    pub fn has_file(&self, path: impl AsRef<Path>) -> bool {
        self.lock().files.contains_key(path.as_ref())
    }

    /// How many times `path` has been stat'ed.
    pub fn stat_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock().stats.get(path.as_ref()).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, u64); 0] = [];
        Self::with_files(files)
    }
}

fn register_dirs(dirs: &mut HashSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a> {
        // Snapshot matching entries under the lock, then drop it before
        // yielding to avoid holding the lock across yield points.
        let snapshot = {
            let state = self.lock();
            if state.files.contains_key(dir) {
                Err(ErrorKind::NotADirectory(dir.to_path_buf()))
            } else if !state.dirs.contains(dir) {
                Err(ErrorKind::NotFound(dir.to_path_buf()))
            } else {
                let mut files: Vec<_> = state
                    .files
                    .iter()
                    .filter(|(path, _)| path.parent() == Some(dir))
                    .map(|(path, entry)| FileInfo::new(path.clone(), entry.size, entry.modified))
                    .collect();
                files.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(files)
            }
        };
        Box::pin(stream! {
            match snapshot {
                Err(kind) => yield Err(exn::Exn::from(kind)),
                Ok(files) => for file in files {
                    yield Ok(file);
                },
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let state = self.lock();
        Ok(state.files.contains_key(path) || state.dirs.contains(path))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let mut state = self.lock();
        *state.stats.entry(path.to_path_buf()).or_default() += 1;
        let step = state.scripts.get_mut(path).and_then(VecDeque::pop_front);
        match step {
            Some(Step::Remove) => {
                state.files.remove(path);
            },
            Some(Step::Size(size)) | Some(Step::Locked(size)) => {
                let locked = matches!(step, Some(Step::Locked(_)));
                let entry = state.files.entry(path.to_path_buf()).or_insert(Entry {
                    size,
                    modified: OffsetDateTime::now_utc(),
                    locked,
                });
                entry.size = size;
                entry.locked = locked;
                entry.modified = OffsetDateTime::now_utc();
            },
            None => {},
        }
        match state.files.get(path) {
            Some(entry) => Ok(FileInfo::new(path, entry.size, entry.modified)),
            None if state.dirs.contains(path) => exn::bail!(ErrorKind::NotAFile(path.to_path_buf())),
            None => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        }
    }

    async fn probe(&self, path: &Path) -> Result<()> {
        match self.lock().files.get(path) {
            Some(entry) if entry.locked => exn::bail!(ErrorKind::Locked(path.to_path_buf())),
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.failing_dirs.contains(path) {
            exn::bail!(ErrorKind::PermissionDenied(path.to_path_buf()));
        }
        if state.files.contains_key(path) {
            exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf()));
        }
        register_dirs(&mut state.dirs, path);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.lock();
        if !state.files.contains_key(from) {
            exn::bail!(ErrorKind::NotFound(from.to_path_buf()));
        }
        if !to.parent().is_some_and(|parent| state.dirs.contains(parent)) {
            exn::bail!(ErrorKind::NotFound(to.to_path_buf()));
        }
        if state.silent_renames {
            return Ok(());
        }
        if let Some(entry) = state.files.remove(from) {
            state.files.insert(to.to_path_buf(), entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_script_applies_one_step_per_stat() {
        let backend = MockBackend::with_files([("/dl/a.pdf", 0)]);
        backend.script("/dl/a.pdf", [Step::Size(10), Step::Locked(20), Step::Remove]);
        let path = Path::new("/dl/a.pdf");
        assert_eq!(backend.stat(path).await.unwrap().size, 10);
        backend.probe(path).await.unwrap();
        assert_eq!(backend.stat(path).await.unwrap().size, 20);
        assert!(matches!(&*backend.probe(path).await.unwrap_err(), ErrorKind::Locked(_)));
        assert!(backend.stat(path).await.unwrap_err().is_not_found());
        assert_eq!(backend.stat_count(path), 3);
    }

    #[tokio::test]
    async fn test_list_only_direct_children() {
        let backend = MockBackend::with_files([("/dl/a.pdf", 1), ("/dl/b.txt", 2), ("/dl/sub/c.pdf", 3)]);
        let files: Vec<_> = backend.list_stream(Path::new("/dl")).try_collect().await.unwrap();
        let names: Vec<_> = files.iter().map(FileInfo::file_name).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt"]);
        let missing: Result<Vec<_>> = backend.list_stream(Path::new("/missing")).try_collect().await;
        assert!(missing.unwrap_err().is_not_found());
        let file: Result<Vec<_>> = backend.list_stream(Path::new("/dl/a.pdf")).try_collect().await;
        assert!(matches!(&*file.unwrap_err(), ErrorKind::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_rename_requires_destination_directory() {
        let backend = MockBackend::with_files([("/dl/a.pdf", 1)]);
        let to = Path::new("/org/PDFs/a.pdf");
        assert!(backend.rename(Path::new("/dl/a.pdf"), to).await.is_err());
        backend.create_dir_all(Path::new("/org/PDFs")).await.unwrap();
        backend.rename(Path::new("/dl/a.pdf"), to).await.unwrap();
        assert!(backend.has_file(to));
        assert!(!backend.has_file("/dl/a.pdf"));
    }

    #[tokio::test]
    async fn test_faults() {
        let backend = MockBackend::with_files([("/dl/a.pdf", 1)]);
        backend.fail_create_dir("/org/PDFs");
        assert!(backend.create_dir_all(Path::new("/org/PDFs")).await.is_err());
        backend.insert_dir("/org/Images");
        backend.silent_renames();
        backend.rename(Path::new("/dl/a.pdf"), Path::new("/org/Images/a.pdf")).await.unwrap();
        assert!(backend.has_file("/dl/a.pdf"));
        assert!(!backend.has_file("/org/Images/a.pdf"));
    }
}
