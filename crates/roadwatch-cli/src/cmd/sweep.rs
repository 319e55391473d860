//! `roadwatch sweep`: the once-per-day retention gate on its own.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use roadwatch_core::clock::SystemClock;
use roadwatch_core::error::ErrorCode;
use roadwatch_core::sweep::{RetentionSweeper, SweepOutcome};

use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug, Default)]
pub struct SweepArgs {
    /// State store path (overrides `[store] path`).
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

pub fn run_sweep(args: &SweepArgs, config_path: &Path, output: OutputMode) -> anyhow::Result<()> {
    let loaded = super::load(config_path, output)?;
    let store = loaded.open_store(args.db.as_deref(), output)?;
    let sweeper = RetentionSweeper::from_config(&loaded.config.reconcile);

    let outcome = match sweeper.run_if_due(&store, &SystemClock) {
        Ok(outcome) => outcome,
        Err(err) => {
            let code = if err.is_systemic() {
                ErrorCode::StoreUnavailable
            } else {
                ErrorCode::StoreWriteFailed
            };
            render_error(output, &CliError::from_code(code, &err))?;
            return Err(err.into());
        }
    };

    render(output, &outcome, |outcome, w| match outcome {
        SweepOutcome::NotDue { last_execution_day } => {
            writeln!(w, "sweep skipped: already ran on {last_execution_day}")
        }
        SweepOutcome::Swept {
            day,
            deleted,
            failed,
        } => writeln!(w, "sweep {day}: deleted={deleted} failed={failed}"),
    })
}
