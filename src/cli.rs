use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::unbounded;
use tracing::info;

use nightjar::config::Config;
use nightjar::engine::{event_channels, Dispatcher};
use nightjar::logger::{spawn_writer, EventWriter};
use nightjar::replay::spawn_producer;
use nightjar::rules::{self, ActiveRules};
use nightjar::sessions::{spawn_sweeper, SessionRegistry};

#[derive(Parser)]
#[command(name = "nightjar")]
#[command(author, version, about = "passive network sensor with rule-based event tagging")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the qualification pipeline over an NDJSON event stream
    Run {
        /// Directory of YAML rule files
        #[arg(short, long)]
        rules: PathBuf,

        /// Decoded event stream to replay (default: stdin)
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Qualified event output file (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a rule directory and report what it contains
    Rules {
        /// Directory of YAML rule files
        rules: PathBuf,
    },
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            rules,
            events,
            output,
        } => cmd_run(config, rules, events, output).await,
        Commands::Rules { rules } => cmd_rules(rules),
    }
}

async fn cmd_run(
    config: Config,
    rules_dir: PathBuf,
    events: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let rules = Arc::new(ActiveRules::new(rules::load_dir(&rules_dir)?));
    let sessions = Arc::new(SessionRegistry::new());

    let log_file = output.unwrap_or_else(|| config.general.log_file.clone());
    let writer = EventWriter::open(&log_file, config.events.clone())?;

    let input: Box<dyn std::io::Read + Send> = match &events {
        Some(path) => Box::new(
            std::fs::File::open(path)
                .with_context(|| format!("failed to open event stream: {}", path.display()))?,
        ),
        None => Box::new(std::io::stdin()),
    };

    // Dropping this sender disconnects every shutdown receiver at once.
    let (shutdown_tx, shutdown_rx) = unbounded::<()>();
    let mut shutdown_tx = Some(shutdown_tx);

    let sweeper = spawn_sweeper(
        Arc::clone(&sessions),
        config.sessions.flush_interval(),
        config.sessions.idle_timeout(),
        shutdown_rx.clone(),
    );

    let (inbound_tx, inbound_rx) = event_channels(config.general.channel_capacity);
    let (outbound_tx, outbound_rx) = event_channels(config.general.channel_capacity);

    let dispatcher = Dispatcher::new(inbound_rx, outbound_tx, rules, shutdown_rx).spawn();
    let writer_thread = spawn_writer(outbound_rx, writer);

    // Deliberately not joined: it may sit in a blocking read (stdin)
    // with nothing to wake it. On interrupt the dispatcher drops the
    // inbound receivers, so its next send fails and it exits; on
    // natural completion it has already finished by the time the
    // dispatcher stops.
    let _producer = spawn_producer(input, sessions, inbound_tx);

    info!(log_file = %log_file.display(), "pipeline running");

    // Natural completion: the producer exhausts its input and drops the
    // inbound senders, the dispatcher drains and stops, the writer
    // drains the sinks and flushes.
    let mut done = tokio::task::spawn_blocking(move || {
        dispatcher.wait();
        let _ = writer_thread.join();
    });

    tokio::select! {
        _ = &mut done => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for interrupt")?;
            info!("interrupt received, shutting down");
            drop(shutdown_tx.take());
            let _ = done.await;
        }
    }

    drop(shutdown_tx.take());
    tokio::task::spawn_blocking(move || {
        let _ = sweeper.join();
    })
    .await
    .context("session sweeper panicked")?;

    Ok(())
}

fn cmd_rules(rules_dir: PathBuf) -> Result<()> {
    let rules = rules::load_dir(&rules_dir)?;
    let mut names: Vec<_> = rules.iter().collect();
    names.sort_by(|a, b| a.0.cmp(b.0));

    println!("{} rule(s) loaded from {}", rules.len(), rules_dir.display());
    for (name, rule) in names {
        let mode = if rule.options.match_all { "all" } else { "any" };
        println!("  {:<40} layer={} match={}", name, rule.layer, mode);
    }
    Ok(())
}
