use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use contactsync_engine::{config, run_once};

/// Mirror systeme.io contacts into a local SQLite table.
///
/// Each invocation performs one synchronization pass. Configuration comes
/// from `contactsync.toml` (or `--config`), overridden by CONTACTSYNC_*
/// environment variables.
#[derive(Debug, Parser)]
#[command(name = "contactsync", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "could not load configuration");
            println!("synchronization failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (message, ok) = run_once(&config).status();
    println!("{message}");
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
