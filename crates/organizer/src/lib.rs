//! Download organizer core.
//!
//! Two entry points, both driven by a [`Context`] built once at startup:
//!
//! - [`organize_directory`]: a one-shot pass over files that are already
//!   present ("backtracking").
//! - [`WatchLoop`] / [`watch_and_organize`]: waits for new files to appear,
//!   waits for each to finish downloading, and files it away.
//!
//! [`OrganizerService`] strings the two together the way the application
//! runs them.

mod candidate;
mod classify;
pub mod error;
pub mod filter;
mod mover;
mod organize;
mod report;
pub mod scan;
mod service;
mod stability;
mod watch;

pub use crate::candidate::CandidateFile;
pub use crate::classify::{Category, ClassificationTable};
pub use crate::mover::{Ineligible, MoveOutcome, SafeMover, Transient};
pub use crate::organize::{OrganizeEvent, organize_directory};
pub use crate::report::FileReport;
pub use crate::scan::DirectoryScanner;
pub use crate::service::{BacktrackSummary, Monitoring, OrganizerService, ServiceReport};
pub use crate::stability::{Sample, StabilityDetector, StabilityPolicy, Verdict};
pub use crate::watch::{Subscription, WatchLoop, WatchSummary, watch_and_organize};
use blamite_config::Config;
use blamite_storage::BackendHandle;
use std::path::{Path, PathBuf};

/// Everything the organizer needs to know, fixed for the life of the process.
pub struct Context {
    backend: BackendHandle,
    table: ClassificationTable,
    organizer_root: PathBuf,
    stability: StabilityPolicy,
}

impl Context {
    pub fn new(backend: BackendHandle, config: &Config) -> Self {
        Self {
            backend,
            table: ClassificationTable::new(&config.categories),
            organizer_root: config.organizer_root.clone(),
            stability: StabilityPolicy::from(&config.stability),
        }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn table(&self) -> &ClassificationTable {
        &self.table
    }

    pub fn organizer_root(&self) -> &Path {
        &self.organizer_root
    }

    /// Folder files of `category` are moved into.
    pub fn destination(&self, category: &Category) -> PathBuf {
        self.organizer_root.join(&category.folder)
    }

    pub fn detector(&self) -> StabilityDetector<'_> {
        StabilityDetector::new(&self.backend, self.stability)
    }

    pub fn mover(&self) -> SafeMover<'_> {
        SafeMover::new(&self.backend)
    }

    pub fn scanner(&self) -> DirectoryScanner<'_> {
        DirectoryScanner::new(&self.backend, &self.table)
    }

    /// Moves a candidate into its category folder and reports the outcome.
    pub async fn organize(&self, candidate: CandidateFile) -> FileReport {
        let destination = self.destination(&candidate.category);
        let outcome = self.mover().relocate(&candidate.path, &destination).await;
        FileReport::new(candidate, outcome)
    }
}
