//! User settings and their `key=value` text representation.
//!
//! The settings file is meant to be edited by hand, so reading it is lenient:
//! every key is parsed on its own, and a key that is missing, malformed, or
//! out of range falls back to its own default without affecting the others.
//! [`Settings::set`] is the strict counterpart used when a value is supplied
//! interactively.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Allowed values for [`Settings::backtrack_days`].
pub const BACKTRACK_DAYS: RangeInclusive<u16> = 1..=365;

/// Preferences that govern the backtracking pass.
///
/// `backtrack_all_files` overrides `backtrack_days`: when set, no date filter
/// is applied at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Organize files that were already present at startup.
    pub backtrack_enabled: bool,
    /// How far back (by modification time) backtracking looks.
    pub backtrack_days: u16,
    /// Ignore the date filter and organize everything.
    pub backtrack_all_files: bool,
    /// Whether the user asked to be started with the OS.
    pub run_on_startup: bool,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            backtrack_enabled: true,
            backtrack_days: 30,
            backtrack_all_files: false,
            run_on_startup: false,
        }
    }
}

/// The keys understood in a settings file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    BacktrackEnabled,
    BacktrackDays,
    BacktrackAllFiles,
    RunOnStartup,
}
impl Key {
    pub const ALL: [Key; 4] =
        [Self::BacktrackEnabled, Self::BacktrackDays, Self::BacktrackAllFiles, Self::RunOnStartup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BacktrackEnabled => "backtrack_enabled",
            Self::BacktrackDays => "backtrack_days",
            Self::BacktrackAllFiles => "backtrack_all_files",
            Self::RunOnStartup => "run_on_startup",
        }
    }
}
impl FromStr for Key {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ErrorKind::UnknownKey(s.to_string()).into())
    }
}
impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl Settings {
    /// Parses a settings document.
    ///
    /// Blank lines and lines starting with `#` are skipped, as are lines
    /// without `=` and unknown keys. Returns the settings together with the
    /// errors for values that were rejected (and replaced by their default).
    ///
    /// ```
    /// use blamite_config::Settings;
    /// let (settings, rejected) = Settings::parse("backtrack_days=7\nbacktrack_all_files=maybe\n");
    /// assert_eq!(settings.backtrack_days, 7);
    /// assert!(!settings.backtrack_all_files);
    /// assert_eq!(rejected.len(), 1);
    /// ```
    pub fn parse(text: &str) -> (Self, Vec<ErrorKind>) {
        let mut settings = Self::default();
        let mut rejected = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let Ok(key) = key.parse::<Key>() else {
                continue;
            };
            if let Err(e) = settings.assign(key, value) {
                rejected.push((*e).clone());
            }
        }
        (settings, rejected)
    }

    /// Renders the commented document that [`parse`](Self::parse) reads back.
    pub fn render(&self) -> String {
        format!(
            "# BLAMITE Organizer Settings\n\
             # Edit these values to customize your experience\n\
             \n\
             # Enable/disable backtracking on startup (true/false)\n\
             backtrack_enabled={}\n\
             \n\
             # Number of days to look back for files (when backtrack_all_files=false)\n\
             backtrack_days={}\n\
             \n\
             # Organize ALL files regardless of date (true/false)\n\
             # WARNING: Setting this to true will organize ALL files in the watched folder!\n\
             backtrack_all_files={}\n\
             \n\
             # Start the organizer when you log in (true/false)\n\
             run_on_startup={}\n",
            self.backtrack_enabled, self.backtrack_days, self.backtrack_all_files, self.run_on_startup,
        )
    }

    /// Strictly updates a single setting by name.
    ///
    /// Choosing a number of days switches the all-files mode off, since the
    /// number would otherwise have no effect.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.parse::<Key>()?;
        self.assign(key, value)?;
        if key == Key::BacktrackDays {
            self.backtrack_all_files = false;
        }
        Ok(())
    }

    /// The current value of a setting, formatted as it would be persisted.
    pub fn get(&self, key: Key) -> String {
        match key {
            Key::BacktrackEnabled => self.backtrack_enabled.to_string(),
            Key::BacktrackDays => self.backtrack_days.to_string(),
            Key::BacktrackAllFiles => self.backtrack_all_files.to_string(),
            Key::RunOnStartup => self.run_on_startup.to_string(),
        }
    }

    fn assign(&mut self, key: Key, value: &str) -> Result<()> {
        let value = value.trim().to_lowercase();
        match key {
            Key::BacktrackEnabled => self.backtrack_enabled = parse_bool(key, &value)?,
            Key::BacktrackDays => self.backtrack_days = parse_days(key, &value)?,
            Key::BacktrackAllFiles => self.backtrack_all_files = parse_bool(key, &value)?,
            Key::RunOnStartup => self.run_on_startup = parse_bool(key, &value)?,
        }
        Ok(())
    }
}

fn parse_bool(key: Key, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => exn::bail!(ErrorKind::Parse { key: key.to_string(), value: value.to_string() }),
    }
}

fn parse_days(key: Key, value: &str) -> Result<u16> {
    // Digits only: "+7" and " 7" are as suspicious as "seven".
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        exn::bail!(ErrorKind::Parse { key: key.to_string(), value: value.to_string() });
    }
    match value.parse::<u16>() {
        Ok(days) if BACKTRACK_DAYS.contains(&days) => Ok(days),
        _ => exn::bail!(ErrorKind::OutOfRange { key: key.to_string(), value: value.to_string() }),
    }
}
