//! nightjar binary: CLI parsing, log filter setup, command dispatch.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

use cli::{run_command, Cli};

fn log_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(log_filter(cli.debug))
        .init();

    if let Err(err) = run_command(cli).await {
        eprintln!("nightjar: {:#}", err);
        std::process::exit(1);
    }

    Ok(())
}
