use blamite_config::{BACKTRACK_DAYS, Settings};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "blamite", version, about = "Files finished downloads into category folders")]
pub struct Cli {
    /// Configuration file (defaults to `config.toml` in the platform config directory).
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Organize existing files, then watch for new ones until interrupted (default).
    Run,
    /// Organize the files already in a folder once and exit.
    Organize(OrganizeArgs),
    /// Show or change the stored settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug, PartialEq, Eq)]
pub struct OrganizeArgs {
    /// Folder to organize (defaults to the watched downloads folder).
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
    /// Ignore modification dates and organize every eligible file.
    #[arg(long, conflicts_with = "days")]
    pub all: bool,
    /// Only organize files modified within this many days.
    #[arg(
        long,
        value_parser = clap::value_parser!(u16).range(*BACKTRACK_DAYS.start() as i64..=*BACKTRACK_DAYS.end() as i64),
    )]
    pub days: Option<u16>,
}

impl OrganizeArgs {
    /// Stored settings with the command line overrides applied.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if self.all {
            settings.backtrack_all_files = true;
        }
        if let Some(days) = self.days {
            settings.backtrack_days = days;
            settings.backtrack_all_files = false;
        }
        settings
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SettingsCommand {
    /// Print every setting.
    Show,
    /// Print where the settings file lives.
    Path,
    /// Restore the defaults.
    Reset,
    /// Change one setting.
    Set { key: String, value: String },
}
