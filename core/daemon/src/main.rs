//! Sidekick daemon entrypoint.
//!
//! Wires the sysinfo-backed process table and polling event source into the
//! session tracker, starts the resume monitor, and then parks the main
//! thread. All real work happens on watch callback threads.

use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sidekick_core::config::{default_config_path, Config};
use sidekick_core::{
    CompanionController, PollingProcessEvents, ResumeMonitor, SessionTracker, SystemProcessTable,
};

const RESUME_TICK_SECS: u64 = 5;

#[derive(Parser)]
#[command(name = "sidekick-daemon", about = "Watches a launcher application and runs its companion process")]
struct Cli {
    /// Path to the configuration file (default: ~/.sidekick/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => match default_config_path() {
            Ok(path) => path,
            Err(err) => {
                error!(error = %err, "Failed to resolve config path");
                std::process::exit(1);
            }
        },
    };

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, path = %config_path.display(), "Failed to load config");
            std::process::exit(1);
        }
    };

    let table = Arc::new(SystemProcessTable::new());
    let events = Arc::new(PollingProcessEvents::new(
        Arc::clone(&table),
        config.poll_interval(),
    ));
    let companion = CompanionController::new(
        Arc::clone(&table),
        config.companion_path.clone(),
        config.companion_process.clone(),
    );
    let tracker = SessionTracker::new(
        table,
        events,
        companion,
        config.launcher_process.clone(),
    );

    tracker.start_scanning();

    let resume_tracker = Arc::clone(&tracker);
    let _resume_monitor = ResumeMonitor::start(
        Duration::from_secs(RESUME_TICK_SECS),
        config.resume_gap(),
        move || resume_tracker.on_resume(),
    );

    info!(
        launcher = %config.launcher_process,
        companion = %config.companion_process,
        "Sidekick daemon started"
    );

    block_main_thread();
    tracker.shutdown();
}

fn init_logging() {
    let debug_enabled = std::env::var("SIDEKICK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Parks the main thread for the lifetime of the process. The channel is
/// never written to; keeping the sender alive means recv blocks forever.
fn block_main_thread() {
    let (sender, receiver) = mpsc::channel::<()>();
    let _keep_alive = sender;
    let _ = receiver.recv();
}
