//! Configuration for the organizer.
//!
//! Two separate things live here:
//!
//! - [`Settings`]: the user's preferences, persisted as a hand-editable
//!   `key=value` file by [`SettingsStore`] and handed to the organizer through
//!   the [`SettingsProvider`] seam.
//! - [`Config`]: where things live and how the organizer behaves (watched
//!   folder, organizer root, classification table, timing), layered from
//!   built-in defaults, an optional TOML file, and `BLAMITE_*` environment
//!   variables.

pub mod error;
mod settings;
mod store;

pub use crate::settings::{BACKTRACK_DAYS, Key, Settings};
pub use crate::store::{SettingsProvider, SettingsStore};

use crate::error::{ErrorKind, Result};
use directories::{ProjectDirs, UserDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment variable overrides; nested keys are split on `__`
/// (e.g. `BLAMITE_STABILITY__INTERVAL_MS=500`).
pub const ENV_PREFIX: &str = "BLAMITE_";
/// Name of the folder created inside the desktop directory.
pub const ORGANIZER_FOLDER: &str = "BLAMITE_Organizer";
const SETTINGS_FILE: &str = "blamite_settings.txt";
const CONFIG_FILE: &str = "config.toml";

/// Built-in classification table: `(extension, folder, description)`.
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("pdf", "PDFs", "PDF Document"),
    ("doc", "Word_Documents", "Word Document"),
    ("docx", "Word_Documents", "Word Document"),
    ("xls", "Excel_Files", "Excel File"),
    ("xlsx", "Excel_Files", "Excel File"),
    ("mp3", "Audio_Files", "Audio File"),
    ("mp4", "Video_Files", "Video File"),
    ("mov", "Video_Files", "Video File"),
    ("gif", "Images", "Image File"),
    ("png", "Images", "Image File"),
    ("jpg", "Images", "Image File"),
    ("jpeg", "Images", "Image File"),
    ("txt", "Text_Files", "Text File"),
];

/// Destination of one extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Folder (directly inside the organizer root) files are moved into.
    pub folder: String,
    /// Human-readable file type, used in log and report output.
    pub description: String,
}

/// Timing of the download-completion detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Time between two samples of the same file.
    pub interval_ms: u64,
    /// Consecutive unchanged, readable samples required before a file counts as complete.
    pub threshold: u32,
    /// Samples taken before giving up on a file.
    pub max_rounds: u32,
}
impl Default for StabilityConfig {
    fn default() -> Self {
        Self { interval_ms: 1000, threshold: 3, max_rounds: 60 }
    }
}
impl StabilityConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Application configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The incoming (downloads) folder that is watched.
    pub watch_dir: PathBuf,
    /// Root of the category folder tree.
    pub organizer_root: PathBuf,
    /// Location of the user settings file.
    pub settings_file: PathBuf,
    pub stability: StabilityConfig,
    /// How long shutdown waits for files that are still being processed.
    pub shutdown_grace_ms: u64,
    /// Extension (lowercase, without dot) to destination.
    pub categories: BTreeMap<String, CategoryConfig>,
}
impl Default for Config {
    fn default() -> Self {
        let user = UserDirs::new();
        let home = user.as_ref().map(|u| u.home_dir().to_path_buf()).unwrap_or_default();
        let watch_dir = user
            .as_ref()
            .and_then(|u| u.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| home.join("Downloads"));
        let desktop = user
            .as_ref()
            .and_then(|u| u.desktop_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| home.join("Desktop"));
        Self {
            watch_dir,
            organizer_root: desktop.join(ORGANIZER_FOLDER),
            settings_file: config_dir().join(SETTINGS_FILE),
            stability: StabilityConfig::default(),
            shutdown_grace_ms: 10_000,
            categories: default_categories(),
        }
    }
}

fn default_categories() -> BTreeMap<String, CategoryConfig> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(ext, folder, description)| {
            let category = CategoryConfig { folder: folder.to_string(), description: description.to_string() };
            (ext.to_string(), category)
        })
        .collect()
}

/// Platform configuration directory for the organizer (falls back to the
/// working directory when no home directory can be determined).
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("", "", "blamite").map(|dirs| dirs.config_dir().to_path_buf()).unwrap_or_default()
}

impl Config {
    /// Loads the layered configuration.
    ///
    /// Layers, lowest priority first: built-in defaults, the TOML file
    /// (`explicit`, or `config.toml` in [`config_dir`] when it exists), then
    /// environment variables prefixed with [`ENV_PREFIX`]. An `explicit` file
    /// that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Some(config_dir().join(CONFIG_FILE)).filter(|p| p.exists()),
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Extracts and validates a configuration from an assembled [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validated()
    }

    /// Normalizes extension keys and rejects values the organizer cannot work with.
    fn validated(mut self) -> Result<Self> {
        if self.stability.interval_ms == 0 {
            exn::bail!(invalid("stability.interval_ms", 0));
        }
        if self.stability.threshold == 0 {
            exn::bail!(invalid("stability.threshold", 0));
        }
        if self.stability.max_rounds == 0 {
            exn::bail!(invalid("stability.max_rounds", 0));
        }
        let mut categories = BTreeMap::new();
        for (extension, category) in self.categories {
            let trimmed = extension.trim();
            let normalized = trimmed.strip_prefix('.').unwrap_or(trimmed).to_lowercase();
            if normalized.is_empty() || normalized.contains(['.', '/', '\\']) {
                exn::bail!(invalid("categories", extension));
            }
            blamite_storage::validate_folder_name(&category.folder)
                .or_raise(|| invalid(format!("categories.{normalized}.folder"), &category.folder))?;
            // Built-in keys are lowercase, so `PDF` next to them is ambiguous.
            if categories.insert(normalized, category).is_some() {
                exn::bail!(invalid("categories", extension));
            }
        }
        self.categories = categories;
        Ok(self)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn invalid(key: impl Into<String>, value: impl ToString) -> ErrorKind {
    ErrorKind::Invalid { key: key.into(), value: value.to_string() }
}
