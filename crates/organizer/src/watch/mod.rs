//! Organizing files as they arrive.
//!
//! One loop receives filesystem notifications and spawns a task per new
//! path (see [`lifecycle`]), so a download that takes minutes to settle never
//! holds up any other file. Each task runs its path through debounce, the
//! stability check and the move strictly in order.

mod events;
mod lifecycle;

use crate::Context;
use crate::error::Result;
use crate::report::FileReport;
use blamite_config::{Settings, SettingsProvider};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

pub use self::events::Subscription;

const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Counts of what a watch loop did before it stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Files that reached a terminal state and were reported.
    pub reported: usize,
    pub moved: usize,
    /// Files still being processed when the shutdown grace period ran out.
    pub interrupted: usize,
}

/// Watches a directory and organizes every new file that appears in it.
pub struct WatchLoop {
    ctx: Arc<Context>,
    settings: Arc<dyn SettingsProvider>,
    reports: Option<mpsc::UnboundedSender<FileReport>>,
    grace: Duration,
}

impl WatchLoop {
    pub fn new(ctx: Arc<Context>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { ctx, settings, reports: None, grace: DEFAULT_GRACE }
    }

    /// Forward every [`FileReport`] to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<FileReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// How long to wait for in-flight files once `stop` fires.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Subscribes to `dir` and runs until `stop` is cancelled.
    ///
    /// Fails straight away with [`Subscribe`](crate::error::ErrorKind::Subscribe)
    /// if `dir` cannot be watched. Otherwise no error can end the loop: every
    /// per-file problem becomes a [`FileReport`].
    pub async fn run(&self, dir: &Path, stop: CancellationToken) -> Result<WatchSummary> {
        let subscription = Subscription::new(dir)?;
        Ok(self.run_with(subscription, stop).await)
    }

    /// Runs on an existing subscription until `stop` is cancelled.
    ///
    /// The settings provider is read once per new path, inside that path's
    /// task. On stop, notifications are dropped immediately and files already
    /// in flight get up to the grace period to finish; whatever is left after
    /// that is aborted.
    pub async fn run_with(&self, mut subscription: Subscription, stop: CancellationToken) -> WatchSummary {
        let dir = subscription.dir().to_path_buf();
        tracing::info!(path = %dir.display(), backend = self.ctx.backend().name(), "Watching for new downloads");
        let mut flights = Flights::default();
        let mut summary = WatchSummary::default();
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                Some(joined) = flights.tasks.join_next_with_id(), if !flights.tasks.is_empty() => {
                    self.land(flights.complete(joined), &mut summary);
                },
                paths = subscription.next() => match paths {
                    Some(paths) => {
                        for path in paths {
                            self.launch(&mut flights, path);
                        }
                    },
                    None => {
                        tracing::warn!(path = %dir.display(), "Filesystem notifications stopped");
                        break;
                    },
                },
            }
        }
        drop(subscription);

        tracing::debug!(in_flight = flights.tasks.len(), "Stopping watch; waiting for files in flight");
        let drain = async {
            while let Some(joined) = flights.tasks.join_next_with_id().await {
                self.land(flights.complete(joined), &mut summary);
            }
        };
        if tokio::time::timeout(self.grace, drain).await.is_err() {
            summary.interrupted = flights.tasks.len();
            tracing::warn!(
                interrupted = summary.interrupted,
                grace = ?self.grace,
                "Files still in flight after the grace period; abandoning them",
            );
            flights.tasks.abort_all();
            while flights.tasks.join_next().await.is_some() {}
        }
        tracing::info!(path = %dir.display(), reported = summary.reported, "Stopped watching");
        summary
    }

    fn launch(&self, flights: &mut Flights, path: PathBuf) {
        if flights.contains(&path) {
            tracing::debug!(path = %path.display(), "Already handling this file");
            return;
        }
        let ctx = self.ctx.clone();
        let provider = self.settings.clone();
        let handle = flights.tasks.spawn({
            let path = path.clone();
            async move {
                let settings = read_settings(provider).await;
                lifecycle::process(&ctx, path, settings).await
            }
        });
        flights.paths.insert(handle.id(), path);
    }

    fn land(&self, report: Option<FileReport>, summary: &mut WatchSummary) {
        let Some(report) = report else {
            return;
        };
        summary.reported += 1;
        if report.outcome.is_moved() {
            summary.moved += 1;
        }
        if let Some(reports) = &self.reports {
            // Nobody listening is fine.
            _ = reports.send(report);
        }
    }
}

/// Reads a settings snapshot on the blocking pool; providers may touch the disk.
pub(crate) async fn read_settings(provider: Arc<dyn SettingsProvider>) -> Settings {
    match tokio::task::spawn_blocking(move || provider.settings()).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read settings; using defaults");
            Settings::default()
        },
    }
}

/// Tasks currently working on a path, and which path each one has.
#[derive(Default)]
struct Flights {
    tasks: JoinSet<Option<FileReport>>,
    paths: HashMap<Id, PathBuf>,
}

impl Flights {
    fn contains(&self, path: &Path) -> bool {
        self.paths.values().any(|p| p == path)
    }

    fn complete(&mut self, joined: std::result::Result<(Id, Option<FileReport>), JoinError>) -> Option<FileReport> {
        match joined {
            Ok((id, report)) => {
                self.paths.remove(&id);
                report
            },
            Err(e) => {
                let path = self.paths.remove(&e.id());
                tracing::error!(path = ?path, error = %e, "File task failed");
                None
            },
        }
    }
}

/// Watches `dir` and organizes new files until `stop` is cancelled.
///
/// Shorthand for [`WatchLoop::run`] with the default grace period and no
/// report channel (outcomes are still logged).
pub async fn watch_and_organize(
    ctx: Arc<Context>,
    dir: &Path,
    settings: Arc<dyn SettingsProvider>,
    stop: CancellationToken,
) -> Result<WatchSummary> {
    WatchLoop::new(ctx, settings).run(dir, stop).await
}
