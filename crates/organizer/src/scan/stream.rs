use crate::candidate::CandidateFile;
use crate::classify::ClassificationTable;
use crate::error::{ErrorKind, Result};
use crate::scan::{admit, cutoff};
use async_stream::stream;
use blamite_config::Settings;
use blamite_storage::BackendHandle;
use exn::ResultExt;
use futures::Stream;
use std::path::Path;
use time::OffsetDateTime;

/// Lists a directory and yields the files worth organizing.
#[derive(Clone, Copy)]
pub struct DirectoryScanner<'a> {
    backend: &'a BackendHandle,
    table: &'a ClassificationTable,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(backend: &'a BackendHandle, table: &'a ClassificationTable) -> Self {
        Self { backend, table }
    }

    /// Streams eligible files directly inside `dir`, judged against `now`.
    ///
    /// The stream is lazy and finite; scanning again means calling this
    /// again. A directory that cannot be listed yields a single
    /// [`ErrorKind::Scan`] and ends the stream. Entries that cannot be
    /// inspected are logged and skipped.
    pub fn scan(
        self,
        dir: &'a Path,
        settings: Settings,
        now: OffsetDateTime,
    ) -> impl Stream<Item = Result<CandidateFile>> + 'a {
        let cutoff = cutoff(&settings, now);
        tracing::debug!(path = %dir.display(), ?cutoff, "Scanning directory");
        stream! {
            for await entry in self.backend.list_stream(dir) {
                match entry {
                    Ok(info) => match admit(self.table, &info, cutoff) {
                        Ok(candidate) => yield Ok(candidate),
                        Err(reason) => tracing::debug!(path = %info.path.display(), %reason, "Not organizing"),
                    },
                    // Listing the directory itself failed; nothing else is coming.
                    Err(e) if e.path() == Some(dir) => {
                        let failed: Result<CandidateFile> = Err(e).or_raise(|| ErrorKind::Scan(dir.to_path_buf()));
                        yield failed;
                        return;
                    },
                    Err(e) => tracing::warn!(path = %dir.display(), error = ?e, "Skipping unreadable entry"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blamite_config::Config;
    use blamite_storage::backend::{LocalBackend, MockBackend};
    use futures::TryStreamExt;
    use std::sync::Arc;
    use time::Duration;

    fn table() -> ClassificationTable {
        ClassificationTable::new(&Config::default().categories)
    }

    #[tokio::test]
    async fn test_scan_filters_and_skips_subdirectories() {
        let now = OffsetDateTime::now_utc();
        let mock = MockBackend::default();
        mock.insert("/dl/new.pdf", 1, now - Duration::days(1));
        mock.insert("/dl/old.pdf", 1, now - Duration::days(31));
        mock.insert("/dl/song.mp3", 1, now);
        mock.insert("/dl/tool.exe", 1, now);
        mock.insert("/dl/video.mp4.crdownload", 1, now);
        mock.insert("/dl/nested/inner.pdf", 1, now);
        let backend: BackendHandle = Arc::new(mock);
        let table = table();
        let found: Vec<_> = DirectoryScanner::new(&backend, &table)
            .scan(Path::new("/dl"), Settings::default(), now)
            .try_collect()
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(CandidateFile::file_name).collect();
        assert_eq!(names, vec!["new.pdf", "song.mp3"]);
    }

    #[tokio::test]
    async fn test_scan_all_files() {
        let now = OffsetDateTime::now_utc();
        let mock = MockBackend::default();
        mock.insert("/dl/ancient.txt", 1, now - Duration::days(3650));
        let backend: BackendHandle = Arc::new(mock);
        let table = table();
        let settings = Settings { backtrack_all_files: true, backtrack_days: 1, ..Settings::default() };
        let found: Vec<_> =
            DirectoryScanner::new(&backend, &table).scan(Path::new("/dl"), settings, now).try_collect().await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let backend: BackendHandle = Arc::new(LocalBackend::default());
        let table = table();
        let err = DirectoryScanner::new(&backend, &table)
            .scan(&missing, Settings::default(), OffsetDateTime::now_utc())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Scan(p) if p == &missing));
    }

    #[tokio::test]
    async fn test_scan_file_instead_of_directory() {
        let mock = MockBackend::with_files([("/dl/a.pdf", 1)]);
        let backend: BackendHandle = Arc::new(mock);
        let table = table();
        let err = DirectoryScanner::new(&backend, &table)
            .scan(Path::new("/dl/a.pdf"), Settings::default(), OffsetDateTime::now_utc())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Scan(p) if p == Path::new("/dl/a.pdf")));
    }

    #[tokio::test]
    async fn test_scan_real_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("notes.TXT"), b"hello").unwrap();
        std::fs::write(temp_dir.path().join("~notes.txt"), b"lock").unwrap();
        std::fs::create_dir(temp_dir.path().join("folder.pdf")).unwrap();
        let backend: BackendHandle = Arc::new(LocalBackend::default());
        let table = table();
        let found: Vec<_> = DirectoryScanner::new(&backend, &table)
            .scan(temp_dir.path(), Settings::default(), OffsetDateTime::now_utc())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category.folder, "Text_Files");
        assert_eq!(found[0].last_observed_size, Some(5));
    }
}
