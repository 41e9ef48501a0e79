//! Log output for the command line.
//!
//! Filter directives are taken from `BLAMITE_LOG`, then `RUST_LOG`, and only
//! then from the `-v`/`-q` flags. Logs go to stderr so that stdout carries
//! nothing but reports.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const ENV_VAR: &str = "BLAMITE_LOG";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    fn directives(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn,blamite=info,blamite_organizer=info,blamite_config=info,blamite_storage=info",
            Self::Verbose => "info,blamite=debug,blamite_organizer=debug,blamite_config=debug,blamite_storage=debug",
        }
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init(verbosity: Verbosity, no_color: bool) {
    let ansi = !no_color && std::io::stderr().is_terminal();
    let layer = fmt::layer().with_writer(std::io::stderr).with_ansi(ansi).with_target(verbosity == Verbosity::Verbose);
    tracing_subscriber::registry().with(filter(verbosity)).with(layer).init();
}

fn filter(verbosity: Verbosity) -> EnvFilter {
    // An unparseable variable falls through to the next source.
    if let Ok(directives) = std::env::var(ENV_VAR)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(verbosity.directives())
}
