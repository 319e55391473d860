//! `roadwatch status`: list stored closures.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;
use roadwatch_core::EventRecord;
use roadwatch_core::store::{ScanFilter, scan_all};

use crate::output::{OutputMode, render};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Include closed records still inside the retention window.
    #[arg(long)]
    pub all: bool,

    /// State store path (overrides `[store] path`).
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

pub fn run_status(args: &StatusArgs, config_path: &Path, output: OutputMode) -> anyhow::Result<()> {
    let loaded = super::load(config_path, output)?;
    let store = loaded.open_store(args.db.as_deref(), output)?;

    let filter = if args.all {
        ScanFilter::default()
    } else {
        ScanFilter::active()
    };
    let records = scan_all(&store, &filter, loaded.config.reconcile.scan_page_size)?;

    render(output, &records, |records, w| {
        if records.is_empty() {
            return writeln!(w, "no closures");
        }
        for record in records {
            write_row(w, record)?;
        }
        Ok(())
    })
}

fn write_row(w: &mut dyn Write, record: &EventRecord) -> std::io::Result<()> {
    let state = if record.is_active { "open" } else { "closed" };
    let touched = record
        .last_touched
        .and_then(|at| DateTime::<Utc>::from_timestamp(at, 0))
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
    writeln!(
        w,
        "{:<10} {:<7} {:<16} {} ({}) touched {touched}",
        record.event_id,
        state,
        record.detected_polygon.as_deref().unwrap_or("-"),
        record.roadway_name,
        record.direction_of_travel,
    )
}
