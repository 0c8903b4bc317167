//! vtuner binary.
//!
//! ```bash
//! vtuner --config vtuner.toml
//! ```
//!
//! Exit codes: 1 after a fatal error or an interrupt outside the supervision
//! wait, 2 for configuration errors and an interrupt while serving.

use std::process::ExitCode;

use clap::Parser;
use vtuner::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    ExitCode::from(cli::run(args).await)
}
