//! Moving a file into its category folder.
//!
//! The primary entry point is [`SafeMover::relocate`], which never returns an
//! error: whatever happens to the file is described by the [`MoveOutcome`].

mod conflict;

use crate::error::{Error, ErrorKind, Result};
use blamite_storage::BackendHandle;
use derive_more::Display;
use exn::ResultExt;
use std::fmt::{Display as FmtDisplay, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

/// Why a file was not considered for organizing at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Ineligible {
    #[display("hidden, temporary or partial download")]
    ExcludedName,
    #[display("unclassified extension")]
    Unclassified,
    #[display("not a regular file")]
    NotAFile,
    #[display("older than the backtracking window")]
    TooOld,
}

/// Why a file that should have been organized was left alone this time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Transient {
    #[display("file vanished")]
    Vanished,
    #[display("timed out waiting for the download to finish")]
    TimedOut,
    #[display("file could not be read")]
    Unreadable,
}

/// The result of one relocation attempt.
#[derive(Debug)]
pub enum MoveOutcome {
    /// The file now lives at `final_path`.
    Moved { final_path: PathBuf },
    SkippedIneligible { reason: Ineligible },
    SkippedTransient { reason: Transient },
    /// Something went wrong that the organizer cannot work around by itself.
    Failed { error: Error },
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn final_path(&self) -> Option<&Path> {
        match self {
            Self::Moved { final_path } => Some(final_path),
            _ => None,
        }
    }
}

impl FmtDisplay for MoveOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Moved { final_path } => write!(f, "moved to {}", final_path.display()),
            Self::SkippedIneligible { reason } => write!(f, "ignored ({reason})"),
            Self::SkippedTransient { reason } => write!(f, "skipped ({reason})"),
            Self::Failed { error } => write!(f, "failed ({})", &**error),
        }
    }
}

/// Moves files into destination folders without ever overwriting.
pub struct SafeMover<'a> {
    backend: &'a BackendHandle,
}

impl<'a> SafeMover<'a> {
    pub fn new(backend: &'a BackendHandle) -> Self {
        Self { backend }
    }

    /// Moves `source` into `destination_dir`, creating the directory if needed.
    ///
    /// Name collisions are resolved by numbering (see [`conflict`]). The
    /// source is checked again right before the move, since whoever created
    /// it may have deleted it in the meantime. After the move both paths are
    /// checked: a move that reported success but left things in a different
    /// state is a [`Verification`](ErrorKind::Verification) failure. Nothing
    /// is rolled back.
    pub async fn relocate(&self, source: &Path, destination_dir: &Path) -> MoveOutcome {
        match self.relocate_inner(source, destination_dir).await {
            Ok(outcome) => outcome,
            Err(error) => MoveOutcome::Failed { error },
        }
    }

    async fn relocate_inner(&self, source: &Path, destination_dir: &Path) -> Result<MoveOutcome> {
        let Some(name) = source.file_name() else {
            return Ok(MoveOutcome::SkippedIneligible { reason: Ineligible::NotAFile });
        };
        self.backend
            .create_dir_all(destination_dir)
            .await
            .or_raise(|| ErrorKind::DestinationSetup(destination_dir.to_path_buf()))?;
        let target = conflict::free_destination(self.backend, destination_dir, name).await?;

        match self.backend.exists(source).await {
            Ok(true) => {},
            Ok(false) => return Ok(MoveOutcome::SkippedTransient { reason: Transient::Vanished }),
            Err(e) => {
                tracing::debug!(path = %source.display(), error = ?e, "Could not check source before moving");
                return Ok(MoveOutcome::SkippedTransient { reason: Transient::Unreadable });
            },
        }

        if let Err(e) = self.backend.rename(source, &target).await {
            // Deleted between the check and the rename.
            if e.is_not_found() && !self.backend.exists(source).await.unwrap_or(true) {
                return Ok(MoveOutcome::SkippedTransient { reason: Transient::Vanished });
            }
            return Err(e).or_raise(|| ErrorKind::Storage);
        }

        let arrived = self.backend.exists(&target).await.unwrap_or(false);
        let left = !self.backend.exists(source).await.unwrap_or(true);
        if !(arrived && left) {
            tracing::warn!(
                source = %source.display(),
                destination = %target.display(),
                arrived,
                left,
                "Move reported success but the files are not where they should be",
            );
            exn::bail!(ErrorKind::Verification { from: source.to_path_buf(), to: target });
        }
        Ok(MoveOutcome::Moved { final_path: target })
    }
}
