use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fim_core::classifier::Classifier;
use fim_core::event_log::EventLog;
use fim_core::state_store::StateStore;
use fim_service::bootstrap::ensure_layout;
use fim_service::config::{ConfigArgs, RunArgs};
use fim_service::monitor::Monitor;
use fim_service::watcher::FileWatcher;
use std::io::{self, Write};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "File integrity monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the watched directory and empty state/log files
    Init {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Monitor the watched directory until interrupted
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print recent events, newest first
    Events {
        #[command(flatten)]
        config: ConfigArgs,
        /// Maximum number of events to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only events at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Print the tracked digest table
    State {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { config } => init_command(config),
        Commands::Run { config, run } => run_command(config, run).await,
        Commands::Events {
            config,
            limit,
            since,
        } => events_command(config, limit, since),
        Commands::State { config } => state_command(config),
    }
}

fn init_command(config: ConfigArgs) -> Result<()> {
    let settings = config.settings()?;
    ensure_layout(&settings)?;
    println!("Watched dir: {}", settings.watched_dir.display());
    println!("State file:  {}", settings.state_file.display());
    println!("Log file:    {}", settings.log_file.display());
    Ok(())
}

async fn run_command(config: ConfigArgs, run: RunArgs) -> Result<()> {
    let mut settings = config.settings()?;
    run.apply(&mut settings);
    ensure_layout(&settings)?;
    let settings = settings.resolve()?;

    let classifier = Classifier::from_settings(&settings);
    let (mut watcher, rx) = FileWatcher::new()?;
    watcher.watch(&settings.watched_dir, settings.recursive)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("cannot listen for ctrl-c: {e}");
            return;
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let echo = settings.echo_events.then(io::stdout);
    let mut monitor = Monitor::new(classifier, echo);
    info!(
        path = %settings.watched_dir.display(),
        algorithm = ?settings.algorithm,
        "Monitoring... Press Ctrl+C to stop."
    );
    let result = monitor.run(rx, shutdown_rx).await;
    drop(watcher);
    let stats = result.context("durable state could not be written; stopping")?;
    info!(recorded = stats.recorded, "service stopped");
    Ok(())
}

fn events_command(
    config: ConfigArgs,
    limit: usize,
    since: Option<DateTime<Utc>>,
) -> Result<()> {
    let settings = config.settings()?;
    let log = EventLog::open(&settings.log_file);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in log.read_recent(since, Some(limit)) {
        writeln!(out, "{}", serde_json::to_string(&entry)?)?;
    }
    Ok(())
}

fn state_command(config: ConfigArgs) -> Result<()> {
    let settings = config.settings()?;
    let store = StateStore::open(&settings.state_file);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (path, digest) in store.iter() {
        let digest = digest.map(|d| d.as_str()).unwrap_or("-");
        writeln!(out, "{digest}  {path}")?;
    }
    Ok(())
}
