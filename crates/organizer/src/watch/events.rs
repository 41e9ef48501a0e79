//! Filesystem notifications for the watched directory.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A live, non-recursive subscription to changes in one directory.
///
/// Notifications arrive on a thread owned by `notify`; they are forwarded
/// into a channel so the watch loop can receive them asynchronously.
/// Dropping the subscription stops the notifications.
pub struct Subscription {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl Subscription {
    /// Starts receiving notifications for `dir`.
    ///
    /// Fails with [`Subscribe`](ErrorKind::Subscribe) if the directory does
    /// not exist, is not a directory, or the platform refuses to watch it.
    pub fn new(dir: &Path) -> Result<Self> {
        // Some platforms report canonical paths (`/private/var` for `/var`).
        let dir = dir.canonicalize().or_raise(|| ErrorKind::Subscribe(dir.to_path_buf()))?;
        // Watching a file would succeed and then report nothing useful.
        if !dir.is_dir() {
            exn::bail!(ErrorKind::Subscribe(dir));
        }
        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // The receiver is gone once the loop has stopped.
            _ = tx.send(event);
        })
        .or_raise(|| ErrorKind::Subscribe(dir.clone()))?;
        watcher.watch(&dir, RecursiveMode::NonRecursive).or_raise(|| ErrorKind::Subscribe(dir.clone()))?;
        tracing::debug!(path = %dir.display(), "Subscribed to filesystem events");
        Ok(Self { dir, _watcher: watcher, events })
    }

    /// The watched directory, canonicalized.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Waits for the next batch of paths that may be new files.
    ///
    /// Returns `None` once the notification source has shut down.
    pub(crate) async fn next(&mut self) -> Option<Vec<PathBuf>> {
        loop {
            match self.events.recv().await? {
                Ok(event) => {
                    let paths = arrivals(event, &self.dir);
                    if !paths.is_empty() {
                        return Some(paths);
                    }
                },
                Err(e) => tracing::warn!(path = %self.dir.display(), error = %e, "Filesystem notification error"),
            }
        }
    }
}

/// Paths that an event says have just appeared directly inside `dir`.
///
/// Creations count, and so do renames into the directory: browsers write
/// `report.pdf.crdownload` and rename it to `report.pdf` once it is done.
/// Directory creations and everything else are ignored.
pub(crate) fn arrivals(event: Event, dir: &Path) -> Vec<PathBuf> {
    let paths = match event.kind {
        EventKind::Create(CreateKind::Folder) => vec![],
        EventKind::Create(_) => event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths,
        // Use get(1), the destination, even if more than two paths are attached.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1).cloned().into_iter().collect(),
        // Some platforms cannot tell which side of a rename this is. A path
        // that no longer exists is filtered out later by the detector.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths,
        _ => vec![],
    };
    paths.into_iter().filter(|path| path.parent() == Some(dir)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::RemoveKind;

    const DIR: &str = "/home/me/Downloads";

    fn paths(event: Event) -> Vec<PathBuf> {
        arrivals(event, Path::new(DIR))
    }

    #[test]
    fn test_creation() {
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/home/me/Downloads/a.pdf"));
        assert_eq!(paths(event), vec![PathBuf::from("/home/me/Downloads/a.pdf")]);
        let event = Event::new(EventKind::Create(CreateKind::Any)).add_path(PathBuf::from("/home/me/Downloads/b.txt"));
        assert_eq!(paths(event), vec![PathBuf::from("/home/me/Downloads/b.txt")]);
    }

    #[test]
    fn test_folder_creation_is_ignored() {
        let event = Event::new(EventKind::Create(CreateKind::Folder)).add_path(PathBuf::from("/home/me/Downloads/new"));
        assert!(paths(event).is_empty());
    }

    #[test]
    fn test_rename_into_directory() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/home/me/Downloads/report.pdf.crdownload"))
            .add_path(PathBuf::from("/home/me/Downloads/report.pdf"));
        assert_eq!(paths(event), vec![PathBuf::from("/home/me/Downloads/report.pdf")]);
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/home/me/Downloads/report.pdf"));
        assert_eq!(paths(event), vec![PathBuf::from("/home/me/Downloads/report.pdf")]);
    }

    #[test]
    fn test_rename_out_and_other_events_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/home/me/Downloads/report.pdf"));
        assert!(paths(event).is_empty());
        let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/home/me/Downloads/a.pdf"));
        assert!(paths(event).is_empty());
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/home/me/Downloads/a.pdf"));
        assert!(paths(event).is_empty());
    }

    #[test]
    fn test_subscribe_rejects_missing_and_regular_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("Downloads");
        std::fs::write(&file, b"not a folder").unwrap();
        for path in [file, temp_dir.path().join("missing")] {
            let Err(err) = Subscription::new(&path) else {
                panic!("subscribed to {}", path.display());
            };
            assert!(matches!(&*err, ErrorKind::Subscribe(_)));
        }
    }

    #[test]
    fn test_paths_outside_directory_are_ignored() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/home/me/Downloads/sub/a.pdf"))
            .add_path(PathBuf::from("/tmp/a.pdf"));
        assert!(paths(event).is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_to_missing_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let Err(err) = Subscription::new(&missing) else {
            panic!("subscribing to a missing directory should fail");
        };
        assert!(matches!(&*err, ErrorKind::Subscribe(p) if p == &missing));
    }
}
