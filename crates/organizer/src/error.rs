//! Organizer Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An organizer error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organizer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an organizer failure.
///
/// ### Per-file Errors
/// These end up inside a [`MoveOutcome::Failed`](crate::MoveOutcome::Failed)
/// and never stop the organizer.
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::DestinationSetup`]
/// - [`ErrorKind::Verification`]
/// - [`ErrorKind::Collision`]
///
/// ### Operational Errors
/// - [`ErrorKind::Scan`]
/// - [`ErrorKind::Subscribe`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A storage backend operation (stat, rename, exists) failed.
    #[display("storage operation failed")]
    Storage,
    /// A category folder could not be created.
    #[display("could not create destination folder: {}", _0.display())]
    DestinationSetup(#[error(not(source))] PathBuf),
    /// A move reported success but the file is not where it should be.
    #[display("move could not be verified: {} -> {}", from.display(), to.display())]
    Verification { from: PathBuf, to: PathBuf },
    /// Every numbered variant of a file name is already taken in the destination.
    #[display("no free file name left for: {}", _0.display())]
    Collision(#[error(not(source))] PathBuf),
    /// The directory being organized could not be listed.
    #[display("could not scan directory: {}", _0.display())]
    Scan(#[error(not(source))] PathBuf),
    /// Change notifications for the watched directory could not be established.
    #[display("could not watch directory: {}", _0.display())]
    Subscribe(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Verification { .. })
    }
}
