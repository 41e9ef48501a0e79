use crate::Context;
use crate::error::Result;
use crate::report::FileReport;
use async_stream::stream;
use blamite_config::Settings;
use futures::Stream;
use std::path::Path;
use time::OffsetDateTime;

/// Progress events emitted by [`organize_directory`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Organized`](Self::Organized), once per eligible file.
/// 3. [`Complete`](Self::Complete), exactly once, as the last item.
///
/// If the directory cannot be listed the stream ends with an error instead,
/// and [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum OrganizeEvent {
    Started,
    Organized(FileReport),
    Complete,
}

/// Organizes the files already present in `dir`, one at a time.
///
/// Eligibility is decided by the scanner using `settings`; eligible files are
/// moved without waiting for them to settle. Per-file problems end up in the
/// [`FileReport`]; only failing to list `dir` ends the stream with an `Err`.
pub fn organize_directory<'a>(
    ctx: &'a Context,
    dir: &'a Path,
    settings: Settings,
) -> impl Stream<Item = Result<OrganizeEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(OrganizeEvent::Started);
        let now = OffsetDateTime::now_utc();
        for await candidate in ctx.scanner().scan(dir, settings, now) {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            yield Ok(OrganizeEvent::Organized(ctx.organize(candidate).await));
        }
        yield Ok(OrganizeEvent::Complete);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use blamite_config::Config;
    use blamite_storage::BackendHandle;
    use blamite_storage::backend::{LocalBackend, MockBackend};
    use futures::TryStreamExt;
    use std::sync::Arc;

    fn context(backend: BackendHandle, root: &Path) -> Context {
        let config = Config { organizer_root: root.to_path_buf(), ..Config::default() };
        Context::new(backend, &config)
    }

    #[tokio::test]
    async fn test_event_order() {
        let mock = Arc::new(MockBackend::with_files([("/dl/a.pdf", 1), ("/dl/b.docx", 2), ("/dl/c.zip", 3)]));
        let backend: BackendHandle = mock.clone();
        let ctx = context(backend, Path::new("/org"));
        let events: Vec<_> =
            organize_directory(&ctx, Path::new("/dl"), Settings::default()).try_collect().await.unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], OrganizeEvent::Started));
        assert!(matches!(events[3], OrganizeEvent::Complete));
        let OrganizeEvent::Organized(report) = &events[2] else {
            panic!("expected a report");
        };
        assert_eq!(report.category.folder, "Word_Documents");
        assert_eq!(report.outcome.final_path(), Some(Path::new("/org/Word_Documents/b.docx")));
        assert!(mock.has_file("/org/PDFs/a.pdf"));
        assert!(mock.has_file("/dl/c.zip"));
    }

    #[tokio::test]
    async fn test_failed_category_does_not_stop_others() {
        let mock = Arc::new(MockBackend::with_files([("/dl/a.pdf", 1), ("/dl/b.txt", 2)]));
        mock.fail_create_dir("/org/PDFs");
        let backend: BackendHandle = mock.clone();
        let ctx = context(backend, Path::new("/org"));
        let reports: Vec<_> = organize_directory(&ctx, Path::new("/dl"), Settings::default())
            .try_filter_map(|event| async move {
                Ok(match event {
                    OrganizeEvent::Organized(report) => Some(report),
                    _ => None,
                })
            })
            .try_collect()
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].outcome.is_failed());
        assert!(reports[1].outcome.is_moved());
        assert!(mock.has_file("/org/Text_Files/b.txt"));
    }

    #[tokio::test]
    async fn test_unlistable_directory_ends_with_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let ctx = context(Arc::new(LocalBackend::default()), temp_dir.path());
        let mut events = Box::pin(organize_directory(&ctx, &missing, Settings::default()));
        assert!(matches!(events.try_next().await, Ok(Some(OrganizeEvent::Started))));
        let err = events.try_next().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Scan(_)));
        assert!(events.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_regular_file_is_not_a_directory_to_organize() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("Downloads");
        std::fs::write(&file, b"not a folder").unwrap();
        let ctx = context(Arc::new(LocalBackend::default()), temp_dir.path());
        let mut events = Box::pin(organize_directory(&ctx, &file, Settings::default()));
        assert!(matches!(events.try_next().await, Ok(Some(OrganizeEvent::Started))));
        let err = events.try_next().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Scan(p) if p == &file));
        assert!(events.try_next().await.unwrap().is_none());
        assert!(file.is_file());
    }
}
