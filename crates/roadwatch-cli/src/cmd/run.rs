//! `roadwatch run`: one full reconciliation pass.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;
use roadwatch_core::clock::SystemClock;
use roadwatch_core::feed::{FeedSource, FileFeed};
use roadwatch_core::notify::{FanoutNotifier, JsonLinesNotifier, LogNotifier};
use roadwatch_core::{ReconcileContext, run_pass as reconcile};
use tracing::info;

use crate::feed::HttpFeed;
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// State store path (overrides `[store] path`).
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Feed URL (overrides `[feed] url`).
    #[arg(long, value_name = "URL", conflicts_with = "feed_file")]
    pub feed_url: Option<String>,

    /// Read the feed snapshot from a JSON file instead of HTTP.
    #[arg(long, value_name = "PATH")]
    pub feed_file: Option<PathBuf>,

    /// Seed the heartbeat jitter for a reproducible pass.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_pass(args: &RunArgs, config_path: &Path, output: OutputMode) -> anyhow::Result<()> {
    let loaded = super::load(config_path, output)?;
    let regions = loaded.regions(output)?;
    let store = loaded.open_store(args.db.as_deref(), output)?;

    let feed: Box<dyn FeedSource> = match (&args.feed_file, &args.feed_url) {
        (Some(path), _) => Box::new(FileFeed::new(path)),
        (None, url) => {
            let url = url.clone().unwrap_or_else(|| loaded.config.feed.url.clone());
            Box::new(HttpFeed::new(
                url,
                Duration::from_secs(loaded.config.feed.timeout_secs),
            ))
        }
    };

    let mut rng = args
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let notifier = FanoutNotifier::new()
        .with(LogNotifier)
        .with(JsonLinesNotifier::new(io::stdout()));

    let mut ctx = ReconcileContext {
        store: &store,
        feed: feed.as_ref(),
        notifier: &notifier,
        clock: &SystemClock,
        rng: &mut rng,
        regions: &regions,
        config: &loaded.config.reconcile,
    };

    match reconcile(&mut ctx) {
        Ok(report) => {
            info!(%report, "pass complete");
            if output.is_json() {
                render(output, &serde_json::json!({ "report": report }), |_, _| Ok(()))
            } else {
                render(output, &report, |report, w| {
                    writeln!(w, "pass complete: {report}")
                })
            }
        }
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), &err))?;
            Err(err.into())
        }
    }
}
