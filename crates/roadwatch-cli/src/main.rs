#![forbid(unsafe_code)]

mod cmd;
mod feed;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "roadwatch: road closure feed reconciler",
    long_about = None
)]
struct Cli {
    /// Config file (default: $ROADWATCH_CONFIG, then ./roadwatch.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format for reports.
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Text)]
    format: OutputMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Reconcile",
        about = "Run one reconciliation pass",
        long_about = "Sweep expired closures, fetch the feed, close stale records, then open, update, or heartbeat current closures. Notifications are written to stdout as JSON lines.",
        after_help = "EXAMPLES:\n    # Poll the configured feed once\n    roadwatch run\n\n    # Replay a saved snapshot against a scratch database\n    roadwatch run --feed-file snapshot.json --db /tmp/rw.sqlite3\n\n    # Reproducible heartbeat jitter\n    roadwatch run --seed 42 --format json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        next_help_heading = "Reconcile",
        about = "Run the daily retention sweep only",
        after_help = "EXAMPLES:\n    # Purge closed records older than the retention window\n    roadwatch sweep"
    )]
    Sweep(cmd::sweep::SweepArgs),

    #[command(
        next_help_heading = "Read",
        about = "List stored closures",
        after_help = "EXAMPLES:\n    # Active closures\n    roadwatch status\n\n    # Everything still in the store\n    roadwatch status --all --format json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Read",
        about = "Inspect the region registry"
    )]
    Regions {
        #[command(subcommand)]
        command: cmd::regions::RegionsCommand,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ROADWATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "roadwatch=debug,info"
        } else {
            "roadwatch=info,warn"
        })
    });

    let format = env::var("ROADWATCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cwd = env::current_dir()?;
    let env_config = env::var(roadwatch_core::config::CONFIG_ENV).ok();
    let config_path = roadwatch_core::config::resolve_config_path(
        cli.config.as_deref(),
        env_config.as_deref(),
        &cwd,
    );
    let output = cli.format;

    match cli.command {
        Commands::Run(ref args) => cmd::run::run_pass(args, &config_path, output),
        Commands::Sweep(ref args) => cmd::sweep::run_sweep(args, &config_path, output),
        Commands::Status(ref args) => cmd::status::run_status(args, &config_path, output),
        Commands::Regions { ref command } => {
            cmd::regions::run_regions(command, &config_path, output)
        }
    }
}
