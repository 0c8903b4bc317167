//! Command line interface.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use vtuner_core::{Driver, ExitStatus, Supervisor, logging, signals};
use vtuner_services::TunerComponents;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "vtuner")]
#[command(version, about = "Virtual network tuner emulator", long_about = None)]
pub struct Cli {
    /// Configuration file, re-read on every restart
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,
}

/// Lines printed before anything else happens.
#[must_use]
pub fn banners() -> [String; 2] {
    [
        format!("Loading vtuner {}", env!("CARGO_PKG_VERSION")),
        format!("Loading vtuner-services {}", vtuner_services::VERSION),
    ]
}

/// Runs the tuner until it exits for good.
///
/// Installs logging and the signal listener, then drives supervision cycles.
pub async fn run(cli: Cli) -> ExitStatus {
    for line in banners() {
        println!("{line}");
    }

    let log_control = match logging::init("info") {
        Ok(control) => Some(control),
        Err(e) => {
            eprintln!("logging unavailable: {e}");
            None
        }
    };

    let interrupt = CancellationToken::new();
    let listener = signals::spawn_listener(interrupt.clone());

    tracing::info!(config = %cli.config.display(), "starting supervisor");
    let supervisor = Supervisor::new(
        TunerComponents::new(log_control),
        cli.config,
        interrupt.clone(),
    );
    let status = Driver::new(supervisor, interrupt).run().await;

    listener.abort();
    tracing::info!(code = status.code(), "vtuner exiting");
    status
}
