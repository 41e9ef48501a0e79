use crate::classify::Category;
use std::path::PathBuf;
use time::OffsetDateTime;

/// A file the organizer has noticed and intends to move.
///
/// Created by the scanner or by a filesystem event, and only mutated by the
/// [`StabilityDetector`](crate::StabilityDetector) while it polls. Dropped
/// once the file is moved, found ineligible, vanishes, or times out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// Lowercase extension without the dot.
    pub extension: String,
    pub category: Category,
    /// Size at the last successful sample, if there has been one.
    pub last_observed_size: Option<u64>,
    /// Consecutive samples with an unchanged size and a successful probe.
    pub stable_observation_count: u32,
    pub first_seen_at: OffsetDateTime,
}

impl CandidateFile {
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>, category: Category) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
            category,
            last_observed_size: None,
            stable_observation_count: 0,
            first_seen_at: OffsetDateTime::now_utc(),
        }
    }

    /// Same as [`new`](Self::new), but with a size already known from a listing.
    pub fn with_size(mut self, size: u64) -> Self {
        self.last_observed_size = Some(size);
        self
    }

    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}
