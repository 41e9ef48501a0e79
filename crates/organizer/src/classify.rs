//! Extension to category lookup.

use blamite_config::CategoryConfig;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Where files of one type end up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    /// Folder name directly inside the organizer root.
    pub folder: String,
    /// Human-readable file type.
    pub description: String,
}

/// Fixed mapping from file extension to [`Category`].
///
/// Lookups ignore case and a single leading dot, so `.PDF`, `pdf` and `Pdf`
/// all classify the same. Built once at startup and shared read-only.
#[derive(Clone, Debug, Default)]
pub struct ClassificationTable {
    rules: HashMap<String, Category>,
}

impl ClassificationTable {
    pub fn new(categories: &BTreeMap<String, CategoryConfig>) -> Self {
        let rules = categories
            .iter()
            .map(|(extension, category)| {
                let category = Category {
                    folder: category.folder.clone(),
                    description: category.description.clone(),
                };
                (normalize(extension), category)
            })
            .collect();
        Self { rules }
    }

    /// Category for an extension (with or without the leading dot).
    pub fn classify(&self, extension: &str) -> Option<&Category> {
        self.rules.get(&normalize(extension))
    }

    /// Category for a path, based on the final extension of its file name.
    ///
    /// Also returns the normalized extension that matched.
    pub fn classify_path(&self, path: &Path) -> Option<(String, &Category)> {
        let name = path.file_name()?.to_string_lossy();
        let (_, suffix) = blamite_storage::split_name(&name);
        let extension = normalize(suffix);
        let category = self.rules.get(&extension)?;
        Some((extension, category))
    }

    /// Every distinct destination folder, sorted.
    pub fn folders(&self) -> BTreeSet<&str> {
        self.rules.values().map(|category| category.folder.as_str()).collect()
    }
}

fn normalize(extension: &str) -> String {
    let extension = extension.trim();
    extension.strip_prefix('.').unwrap_or(extension).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blamite_config::Config;
    use rstest::rstest;

    fn table() -> ClassificationTable {
        ClassificationTable::new(&Config::default().categories)
    }

    #[rstest]
    #[case("pdf", Some("PDFs"))]
    #[case(".pdf", Some("PDFs"))]
    #[case("PDF", Some("PDFs"))]
    #[case(".XlSx", Some("Excel_Files"))]
    #[case("jpeg", Some("Images"))]
    #[case("mov", Some("Video_Files"))]
    #[case("exe", None)]
    #[case("..pdf", None)]
    #[case("", None)]
    fn test_classify(#[case] extension: &str, #[case] expected: Option<&str>) {
        let table = table();
        assert_eq!(table.classify(extension).map(|c| c.folder.as_str()), expected);
    }

    #[rstest]
    #[case("/dl/report.xlsx", Some(("xlsx", "Excel_Files")))]
    #[case("/dl/Holiday.Photo.JPG", Some(("jpg", "Images")))]
    #[case("/dl/archive.tar.gz", None)]
    #[case("/dl/README", None)]
    #[case("/dl/.pdf", None)]
    fn test_classify_path(#[case] path: &str, #[case] expected: Option<(&str, &str)>) {
        let table = table();
        let found = table.classify_path(Path::new(path));
        assert_eq!(found.as_ref().map(|(ext, c)| (ext.as_str(), c.folder.as_str())), expected);
    }

    #[test]
    fn test_description() {
        let table = table();
        assert_eq!(table.classify(".docx").map(|c| c.description.as_str()), Some("Word Document"));
    }

    #[test]
    fn test_folders_are_distinct() {
        let table = table();
        let folders: Vec<_> = table.folders().into_iter().collect();
        assert_eq!(
            folders,
            vec!["Audio_Files", "Excel_Files", "Images", "PDFs", "Text_Files", "Video_Files", "Word_Documents"]
        );
    }
}
