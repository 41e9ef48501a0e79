//! The organizer as the application runs it.

use crate::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::mover::MoveOutcome;
use crate::organize::{OrganizeEvent, organize_directory};
use crate::report::FileReport;
use crate::watch::{WatchLoop, WatchSummary, read_settings};
use blamite_config::SettingsProvider;
use exn::ResultExt;
use futures::StreamExt;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Tally of a backtracking pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BacktrackSummary {
    pub moved: usize,
    /// Ineligible or transiently unavailable.
    pub skipped: usize,
    pub failed: usize,
}

impl BacktrackSummary {
    fn record(&mut self, outcome: &MoveOutcome) {
        match outcome {
            MoveOutcome::Moved { .. } => self.moved += 1,
            MoveOutcome::SkippedIneligible { .. } | MoveOutcome::SkippedTransient { .. } => self.skipped += 1,
            MoveOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Whether new files were being watched for.
#[derive(Debug)]
pub enum Monitoring {
    /// Watched until asked to stop.
    Stopped(WatchSummary),
    /// The watch could never be set up; only backtracking ran.
    NotMonitoring(Error),
}

#[derive(Debug)]
pub struct ServiceReport {
    pub backtrack: BacktrackSummary,
    pub monitoring: Monitoring,
}

/// Backtracks once, then watches, until stopped.
///
/// Backtracking finishes before the watch starts so that no file is handled
/// both as "already there" and as "just created".
pub struct OrganizerService {
    ctx: Arc<Context>,
    watch_dir: PathBuf,
    settings: Arc<dyn SettingsProvider>,
    reports: Option<mpsc::UnboundedSender<FileReport>>,
    grace: Duration,
}

impl OrganizerService {
    pub fn new(ctx: Arc<Context>, watch_dir: impl Into<PathBuf>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            ctx,
            watch_dir: watch_dir.into(),
            settings,
            reports: None,
            grace: Duration::from_secs(10),
        }
    }

    /// Forward every [`FileReport`], from backtracking and watching alike.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<FileReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Creates the organizer root and every category folder.
    ///
    /// Failing to create the root is an error. A category folder that cannot
    /// be created is only logged: its files will fail to move later on, and
    /// every other category keeps working.
    pub async fn prepare(&self) -> Result<()> {
        let backend = self.ctx.backend();
        let root = self.ctx.organizer_root();
        backend.create_dir_all(root).await.or_raise(|| ErrorKind::DestinationSetup(root.to_path_buf()))?;
        for folder in self.ctx.table().folders() {
            let path = root.join(folder);
            if let Err(e) = backend.create_dir_all(&path).await {
                tracing::warn!(path = %path.display(), error = ?e, "Could not create category folder");
            }
        }
        tracing::debug!(path = %root.display(), "Organizer folders ready");
        Ok(())
    }

    /// Organizes files already in the watched directory, if the settings ask for it.
    pub async fn backtrack(&self) -> BacktrackSummary {
        self.backtrack_until(&CancellationToken::new()).await
    }

    async fn backtrack_until(&self, stop: &CancellationToken) -> BacktrackSummary {
        let mut summary = BacktrackSummary::default();
        let settings = read_settings(self.settings.clone()).await;
        if !settings.backtrack_enabled {
            tracing::info!("Backtracking disabled");
            return summary;
        }
        if settings.backtrack_all_files {
            tracing::info!(path = %self.watch_dir.display(), "Backtracking all files");
        } else {
            tracing::info!(path = %self.watch_dir.display(), days = settings.backtrack_days, "Backtracking");
        }
        let mut events = pin!(organize_directory(&self.ctx, &self.watch_dir, settings));
        while let Some(event) = events.next().await {
            match event {
                Ok(OrganizeEvent::Organized(report)) => {
                    summary.record(&report.outcome);
                    self.forward(report);
                },
                Ok(OrganizeEvent::Started | OrganizeEvent::Complete) => {},
                Err(e) => {
                    tracing::warn!(error = ?e, "Backtracking skipped");
                    break;
                },
            }
            if stop.is_cancelled() {
                tracing::info!("Backtracking interrupted");
                break;
            }
        }
        tracing::info!(moved = summary.moved, skipped = summary.skipped, failed = summary.failed, "Backtracking done");
        summary
    }

    /// Prepares folders, backtracks, then watches until `stop` is cancelled.
    ///
    /// Only failing to create the organizer root is an error. If the watched
    /// directory cannot be subscribed to, backtracking still runs and the
    /// report says [`NotMonitoring`](Monitoring::NotMonitoring).
    pub async fn run(&self, stop: CancellationToken) -> Result<ServiceReport> {
        self.prepare().await?;
        let backtrack = self.backtrack_until(&stop).await;
        if stop.is_cancelled() {
            let monitoring = Monitoring::Stopped(WatchSummary::default());
            return Ok(ServiceReport { backtrack, monitoring });
        }

        let mut watch = WatchLoop::new(self.ctx.clone(), self.settings.clone()).with_grace(self.grace);
        if let Some(reports) = &self.reports {
            watch = watch.with_reports(reports.clone());
        }
        let monitoring = match watch.run(&self.watch_dir, stop).await {
            Ok(summary) => Monitoring::Stopped(summary),
            Err(e) => {
                tracing::error!(path = %self.watch_dir.display(), error = ?e, "Not monitoring for new files");
                Monitoring::NotMonitoring(e)
            },
        };
        Ok(ServiceReport { backtrack, monitoring })
    }

    fn forward(&self, report: FileReport) {
        if let Some(reports) = &self.reports {
            _ = reports.send(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blamite_config::{Config, Settings};
    use blamite_storage::backend::MockBackend;
    use blamite_storage::{BackendHandle, StorageBackend};
    use std::path::Path;

    fn service(mock: &Arc<MockBackend>, settings: Settings) -> OrganizerService {
        let backend: BackendHandle = mock.clone();
        let config = Config { organizer_root: PathBuf::from("/org"), ..Config::default() };
        OrganizerService::new(Arc::new(Context::new(backend, &config)), "/dl", Arc::new(settings))
    }

    #[tokio::test]
    async fn test_prepare_creates_every_folder() {
        let mock = Arc::new(MockBackend::default());
        service(&mock, Settings::default()).prepare().await.unwrap();
        for folder in ["PDFs", "Word_Documents", "Excel_Files", "Audio_Files", "Video_Files", "Images", "Text_Files"] {
            assert!(mock.exists(&Path::new("/org").join(folder)).await.unwrap(), "{folder}");
        }
    }

    #[tokio::test]
    async fn test_prepare_tolerates_one_broken_category() {
        let mock = Arc::new(MockBackend::default());
        mock.fail_create_dir("/org/Images");
        service(&mock, Settings::default()).prepare().await.unwrap();
        assert!(mock.exists(Path::new("/org/PDFs")).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_fails_without_root() {
        let mock = Arc::new(MockBackend::default());
        mock.fail_create_dir("/org");
        let err = service(&mock, Settings::default()).prepare().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::DestinationSetup(_)));
    }

    #[tokio::test]
    async fn test_backtrack_respects_enabled() {
        let mock = Arc::new(MockBackend::with_files([("/dl/a.pdf", 1)]));
        let settings = Settings { backtrack_enabled: false, ..Settings::default() };
        assert_eq!(service(&mock, settings).backtrack().await, BacktrackSummary::default());
        assert!(mock.has_file("/dl/a.pdf"));
    }

    #[tokio::test]
    async fn test_backtrack_forwards_reports() {
        let mock = Arc::new(MockBackend::with_files([("/dl/a.pdf", 1), ("/dl/b.gif", 1), ("/dl/c.bin", 1)]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = service(&mock, Settings::default()).with_reports(tx).backtrack().await;
        assert_eq!(summary, BacktrackSummary { moved: 2, skipped: 0, failed: 0 });
        assert_eq!(rx.recv().await.unwrap().category.folder, "PDFs");
        assert_eq!(rx.recv().await.unwrap().category.folder, "Images");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_backtrack_missing_directory_is_not_fatal() {
        let mock = Arc::new(MockBackend::default());
        assert_eq!(service(&mock, Settings::default()).backtrack().await, BacktrackSummary::default());
    }

    #[tokio::test]
    async fn test_run_on_a_regular_file_reports_not_monitoring() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("Downloads");
        std::fs::write(&file, b"not a folder").unwrap();
        let mock = Arc::new(MockBackend::default());
        mock.insert(file.clone(), 12, time::OffsetDateTime::now_utc());
        let backend: BackendHandle = mock.clone();
        let config = Config { organizer_root: PathBuf::from("/org"), ..Config::default() };
        let ctx = Arc::new(Context::new(backend, &config));
        let service = OrganizerService::new(ctx, &file, Arc::new(Settings::default()));
        let report = service.run(CancellationToken::new()).await.unwrap();
        assert_eq!(report.backtrack, BacktrackSummary::default());
        let Monitoring::NotMonitoring(err) = report.monitoring else {
            panic!("expected not monitoring");
        };
        assert!(matches!(&*err, ErrorKind::Subscribe(p) if p.ends_with("Downloads")));
        assert!(mock.has_file(&file));
    }

    #[tokio::test]
    async fn test_run_without_watchable_directory_reports_not_monitoring() {
        // The mock knows `/dl`, but there is nothing on disk to subscribe to.
        let mock = Arc::new(MockBackend::with_files([("/dl/a.pdf", 1)]));
        let report = service(&mock, Settings::default()).run(CancellationToken::new()).await.unwrap();
        assert_eq!(report.backtrack.moved, 1);
        let Monitoring::NotMonitoring(err) = report.monitoring else {
            panic!("expected not monitoring");
        };
        assert!(matches!(&*err, ErrorKind::Subscribe(_)));
    }
}
