use crate::candidate::CandidateFile;
use crate::classify::Category;
use crate::mover::MoveOutcome;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// What happened to one classified file.
///
/// Exactly one report is produced per file that reaches a terminal state,
/// whether it was moved, skipped or failed. Files that were never eligible
/// (hidden, partial, unclassified) produce no report.
#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub category: Category,
    pub outcome: MoveOutcome,
}

impl FileReport {
    /// Builds the report for `candidate` and logs it.
    pub(crate) fn new(candidate: CandidateFile, outcome: MoveOutcome) -> Self {
        let report = Self { source: candidate.path, category: candidate.category, outcome };
        report.log();
        report
    }

    fn log(&self) {
        let source = self.source.display();
        let category = self.category.folder.as_str();
        match &self.outcome {
            MoveOutcome::Moved { final_path } => {
                tracing::info!(%source, destination = %final_path.display(), category, "Organized file");
            },
            MoveOutcome::SkippedIneligible { reason } => {
                tracing::debug!(%source, category, %reason, "Not organizing");
            },
            MoveOutcome::SkippedTransient { reason } => {
                tracing::warn!(%source, category, %reason, "Gave up on file");
            },
            MoveOutcome::Failed { error } => {
                let retryable = error.is_retryable();
                tracing::warn!(%source, category, retryable, error = ?error, "Could not organize file");
            },
        }
    }
}

impl Display for FileReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = self.source.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        write!(f, "{name} [{}]: {}", self.category.description, self.outcome)
    }
}
