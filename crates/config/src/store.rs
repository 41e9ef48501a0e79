//! Settings persistence and the live settings seam.

use crate::error::{ErrorKind, Result};
use crate::settings::Settings;
use exn::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Supplies the settings snapshot to use for the next unit of work.
///
/// Implementations may return a different snapshot on every call; callers
/// read it once per cycle (per backtrack pass, per filesystem event) and
/// never hold on to it longer.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> Settings;
}

/// A fixed snapshot.
impl SettingsProvider for Settings {
    fn settings(&self) -> Settings {
        *self
    }
}

/// Reads and writes the settings file.
///
/// As a [`SettingsProvider`] the file is re-read on every call, so edits made
/// while the organizer is running apply to the next file it handles. When
/// the file cannot be read, the last snapshot that could be is used instead.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    last_good: Mutex<Option<Settings>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings file.
    ///
    /// A missing file yields the defaults, which are also written out so
    /// there is a file to edit. Rejected values are logged and replaced by
    /// their defaults.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            let settings = Settings::default();
            if let Err(e) = self.save(&settings) {
                tracing::warn!(path = %self.path.display(), error = ?e, "Could not write default settings file");
            }
            return Ok(settings);
        }
        let text = fs::read_to_string(&self.path).or_raise(|| ErrorKind::Io(self.path.clone()))?;
        let (settings, rejected) = Settings::parse(&text);
        for reason in rejected {
            tracing::warn!(path = %self.path.display(), %reason, "Ignoring invalid setting; using its default");
        }
        Ok(settings)
    }

    /// Writes `settings`, creating parent directories as needed.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        }
        fs::write(&self.path, settings.render()).or_raise(|| ErrorKind::Io(self.path.clone()))?;
        self.remember(*settings);
        Ok(())
    }

    /// Restores (and persists) the default settings.
    pub fn reset(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }

    fn remember(&self, settings: Settings) {
        *self.last_good.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(settings);
    }

    fn last_good(&self) -> Option<Settings> {
        *self.last_good.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsProvider for SettingsStore {
    fn settings(&self) -> Settings {
        match self.load() {
            Ok(settings) => {
                self.remember(settings);
                settings
            },
            Err(e) => {
                let fallback = self.last_good().unwrap_or_default();
                tracing::warn!(
                    path = %self.path.display(),
                    error = ?e,
                    "Could not read settings; using last known values",
                );
                fallback
            },
        }
    }
}
