//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The layered configuration could not be loaded or deserialized.
    #[display("could not load configuration")]
    Load,
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    /// A configuration value is structurally invalid.
    #[display("invalid configuration value for `{key}`: {value}")]
    Invalid { key: String, value: String },
    /// A settings key is not recognised.
    #[display("unknown setting `{_0}`")]
    UnknownKey(#[error(not(source))] String),
    /// A settings value could not be parsed for its key.
    #[display("invalid value `{value}` for setting `{key}`")]
    Parse { key: String, value: String },
    /// A numeric settings value is outside its allowed range.
    #[display("value `{value}` for setting `{key}` is out of range")]
    OutOfRange { key: String, value: String },
    /// Reading or writing the settings file failed.
    #[display("settings file I/O failed: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}
