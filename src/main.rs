mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command, OrganizeArgs, SettingsCommand};
use crate::error::{ErrorKind, Result};
use blamite_config::{Config, Key, Settings, SettingsProvider, SettingsStore};
use blamite_organizer::{Context, Monitoring, OrganizeEvent, OrganizerService, organize_directory};
use blamite_storage::BackendHandle;
use blamite_storage::backend::LocalBackend;
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::Verbosity::from_flags(cli.verbose, cli.quiet), cli.no_color);
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "Exiting");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let store = Arc::new(SettingsStore::new(&config.settings_file));
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config, store).await,
        Command::Organize(args) => organize(&config, &store, &args).await,
        Command::Settings(command) => settings(&store, command),
    }
}

fn backend() -> BackendHandle {
    Arc::new(LocalBackend::default())
}

async fn run(config: &Config, store: Arc<SettingsStore>) -> Result<ExitCode> {
    // Creates the file with defaults on first start.
    store.load().or_raise(|| ErrorKind::Settings)?;
    let ctx = Arc::new(Context::new(backend(), config));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = OrganizerService::new(ctx, &config.watch_dir, store)
        .with_reports(tx)
        .with_grace(config.shutdown_grace());
    tracing::info!(
        watch_dir = %config.watch_dir.display(),
        organizer_root = %config.organizer_root.display(),
        "Starting organizer",
    );

    let stop = CancellationToken::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutting down");
            stop.cancel();
        }
    });
    let printer = tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            println!("{report}");
        }
    });

    let report = service.run(stop).await.or_raise(|| ErrorKind::Startup)?;
    // Closes the report channel.
    drop(service);
    _ = printer.await;

    let backtrack = report.backtrack;
    println!("Backtracking: {} moved, {} skipped, {} failed", backtrack.moved, backtrack.skipped, backtrack.failed);
    match report.monitoring {
        Monitoring::Stopped(summary) => {
            println!(
                "Watching: {} moved, {} reported, {} interrupted",
                summary.moved, summary.reported, summary.interrupted,
            );
            Ok(ExitCode::SUCCESS)
        },
        Monitoring::NotMonitoring(e) => {
            eprintln!("error: not monitoring for new files: {e}");
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            },
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn organize(config: &Config, store: &SettingsStore, args: &OrganizeArgs) -> Result<ExitCode> {
    let settings = args.apply(store.settings());
    let dir = args.dir.as_deref().unwrap_or(&config.watch_dir);
    let ctx = Context::new(backend(), config);
    let (mut moved, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    let mut events = pin!(organize_directory(&ctx, dir, settings));
    while let Some(event) = events.next().await {
        let OrganizeEvent::Organized(report) = event.or_raise(|| ErrorKind::Organize)? else {
            continue;
        };
        println!("{report}");
        match &report.outcome {
            outcome if outcome.is_moved() => moved += 1,
            outcome if outcome.is_failed() => failed += 1,
            _ => skipped += 1,
        }
    }
    println!("{}: {moved} moved, {skipped} skipped, {failed} failed", dir.display());
    Ok(if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn settings(store: &SettingsStore, command: SettingsCommand) -> Result<ExitCode> {
    match command {
        SettingsCommand::Show => print_settings(&store.load().or_raise(|| ErrorKind::Settings)?),
        SettingsCommand::Path => println!("{}", store.path().display()),
        SettingsCommand::Reset => print_settings(&store.reset().or_raise(|| ErrorKind::Settings)?),
        SettingsCommand::Set { key, value } => {
            let mut settings = store.load().or_raise(|| ErrorKind::Settings)?;
            settings.set(&key, &value).or_raise(|| ErrorKind::Settings)?;
            store.save(&settings).or_raise(|| ErrorKind::Settings)?;
            print_settings(&settings);
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn print_settings(settings: &Settings) {
    for key in Key::ALL {
        println!("{key}={}", settings.get(key));
    }
}
