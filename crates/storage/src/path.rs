//! Path validation and name utilities.
//!
//! Category folders are created beneath the organizer root, so a folder name
//! coming from configuration must never be able to escape it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates that `name` is a single, plain folder name.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use blamite_storage::validate_folder_name;
/// assert!(validate_folder_name("Excel_Files").is_ok());
/// assert!(validate_folder_name("Word Documents").is_ok());
/// assert!(validate_folder_name("../Desktop").is_err());
/// assert!(validate_folder_name("a/b").is_err());
/// assert!(validate_folder_name("").is_err());
/// ```
pub fn validate_folder_name(name: impl AsRef<Path>) -> Result<PathBuf> {
    let path = name.as_ref();
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(s)), None) => {
            // Null bytes pass through Path::components() on Unix but cause
            // truncation in C-based syscalls, so reject them explicitly.
            if s.as_encoded_bytes().contains(&0) {
                exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
            }
            Ok(PathBuf::from(s))
        },
        _ => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
    }
}

/// Splits a file name into stem and suffix (the suffix keeps its leading dot).
///
/// Only the last extension counts: `archive.tar.gz` splits into
/// `("archive.tar", ".gz")`. Names that start with their only dot, or end
/// with a dot, have no suffix.
///
/// ```
/// use blamite_storage::split_name;
/// assert_eq!(split_name("report.xlsx"), ("report", ".xlsx"));
/// assert_eq!(split_name("README"), ("README", ""));
/// ```
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(i) if i == name.len() - 1 => (name, ""),
        Some(i) => name.split_at(i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PDFs")]
    #[case("Word_Documents")]
    #[case("Audio Files")]
    #[case("trailing/")]
    fn test_valid_folder_names(#[case] name: &str) {
        assert!(validate_folder_name(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../etc")]
    #[case("a/b")]
    #[case("/absolute")]
    #[case("a\0b")]
    fn test_invalid_folder_names(#[case] name: &str) {
        assert!(validate_folder_name(name).is_err());
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        assert_eq!(validate_folder_name("Images/").unwrap(), PathBuf::from("Images"));
    }

    #[rstest]
    #[case("a.pdf", "a", ".pdf")]
    #[case("archive.tar.gz", "archive.tar", ".gz")]
    #[case("no_extension", "no_extension", "")]
    #[case(".hidden", ".hidden", "")]
    #[case("ends.with.", "ends.with.", "")]
    #[case("", "", "")]
    fn test_split_name(#[case] name: &str, #[case] stem: &str, #[case] suffix: &str) {
        assert_eq!(split_name(name), (stem, suffix));
    }
}
