//! Names that are never organized.

/// Suffixes browsers and download managers use for files still being written.
const PARTIAL_SUFFIXES: &[&str] = &[".tmp", ".part", ".crdownload"];

/// Returns `true` for hidden files, editor/office lock files, and partial
/// downloads.
///
/// Suffixes are compared case-insensitively; a download manager that writes
/// `.PART` is still mid-download.
pub fn is_excluded(name: &str) -> bool {
    if name.starts_with('.') || name.starts_with('~') {
        return true;
    }
    let lower = name.to_lowercase();
    PARTIAL_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}
