//! One-shot pass over files that are already present.
//!
//! Files found this way predate the organizer and are assumed complete, so
//! they go straight to the mover without a stability check. Only the top
//! level of the directory is considered.

mod stream;

pub use self::stream::DirectoryScanner;
use crate::candidate::CandidateFile;
use crate::classify::ClassificationTable;
use crate::filter;
use crate::mover::Ineligible;
use blamite_config::Settings;
use blamite_storage::FileInfo;
use time::{Duration, OffsetDateTime};

/// Oldest modification time still organized, or `None` when every file is.
///
/// `backtrack_all_files` switches the date filter off entirely rather than
/// widening it.
pub fn cutoff(settings: &Settings, now: OffsetDateTime) -> Option<OffsetDateTime> {
    (!settings.backtrack_all_files).then(|| now - Duration::days(i64::from(settings.backtrack_days)))
}

/// Applies the eligibility filters, in order: name, classification, age.
pub fn admit(
    table: &ClassificationTable,
    info: &FileInfo,
    cutoff: Option<OffsetDateTime>,
) -> Result<CandidateFile, Ineligible> {
    if filter::is_excluded(&info.file_name()) {
        return Err(Ineligible::ExcludedName);
    }
    let Some((extension, category)) = table.classify_path(&info.path) else {
        return Err(Ineligible::Unclassified);
    };
    if cutoff.is_some_and(|cutoff| info.modified < cutoff) {
        return Err(Ineligible::TooOld);
    }
    Ok(CandidateFile::new(info.path.clone(), extension, category.clone()).with_size(info.size))
}
