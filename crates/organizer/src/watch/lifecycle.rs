//! What happens to a single path the watcher reported.
//!
//! ```text
//! Debouncing ──> Verifying ──> Moving ──> Finished(report)
//!     │              │
//!     └──────────────┴──> Finished(report or nothing)   (abandoned)
//! ```

use crate::Context;
use crate::candidate::CandidateFile;
use crate::filter;
use crate::mover::{Ineligible, MoveOutcome, Transient};
use crate::report::FileReport;
use crate::stability::Verdict;
use blamite_config::Settings;
use std::path::PathBuf;

enum Lifecycle {
    Debouncing(PathBuf),
    Verifying(CandidateFile),
    Moving(CandidateFile),
    Finished(Option<FileReport>),
}

/// Drives one path to a terminal state.
///
/// Returns `None` for paths that were never eligible (excluded names,
/// unclassified extensions, directories); those are only logged at debug.
pub(crate) async fn process(ctx: &Context, path: PathBuf, settings: Settings) -> Option<FileReport> {
    tracing::debug!(path = %path.display(), ?settings, "New file");
    let mut state = Lifecycle::Debouncing(path);
    loop {
        state = match state {
            Lifecycle::Debouncing(path) => debounce(ctx, path).await,
            Lifecycle::Verifying(mut candidate) => match ctx.detector().await_stable(&mut candidate).await {
                Verdict::Ready => Lifecycle::Moving(candidate),
                Verdict::Vanished => abandon(candidate, Transient::Vanished),
                Verdict::TimedOut => abandon(candidate, Transient::TimedOut),
            },
            Lifecycle::Moving(candidate) => Lifecycle::Finished(Some(ctx.organize(candidate).await)),
            Lifecycle::Finished(report) => return report,
        };
    }
}

async fn debounce(ctx: &Context, path: PathBuf) -> Lifecycle {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if filter::is_excluded(&name) {
        return ignore(path, Ineligible::ExcludedName);
    }
    let Some((extension, category)) = ctx.table().classify_path(&path) else {
        return ignore(path, Ineligible::Unclassified);
    };
    let candidate = CandidateFile::new(path, extension, category.clone());
    let stat = ctx.backend().stat(&candidate.path).await;
    match stat {
        Err(e) if matches!(&*e, blamite_storage::error::ErrorKind::NotAFile(_)) => {
            ignore(candidate.path, Ineligible::NotAFile)
        },
        // The source side of a rename, reported by platforms that cannot tell the two apart.
        Err(e) if e.is_not_found() => {
            tracing::debug!(path = %candidate.path.display(), "Gone before it could be checked");
            Lifecycle::Finished(None)
        },
        _ => Lifecycle::Verifying(candidate),
    }
}

fn ignore(path: PathBuf, reason: Ineligible) -> Lifecycle {
    tracing::debug!(path = %path.display(), %reason, "Ignoring new file");
    Lifecycle::Finished(None)
}

fn abandon(candidate: CandidateFile, reason: Transient) -> Lifecycle {
    Lifecycle::Finished(Some(FileReport::new(candidate, MoveOutcome::SkippedTransient { reason })))
}
