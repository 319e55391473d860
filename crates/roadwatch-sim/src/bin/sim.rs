#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use roadwatch_sim::campaign::{CampaignConfig, run_campaign, run_seed};

/// `roadwatch-sim` runs the default campaign; `roadwatch-sim <SEED>` replays
/// one seed and prints its violations.
fn main() -> Result<()> {
    let config = CampaignConfig::default();

    if let Some(raw) = std::env::args().nth(1) {
        let seed: u64 = raw
            .parse()
            .with_context(|| format!("seed must be an integer, got '{raw}'"))?;
        let result = run_seed(&config, seed)?;
        println!(
            "seed {seed}: passes={} opened={} updated={} completed={} sweeps={} deleted={} store_failures={}",
            result.passes_run,
            result.notifications.opened,
            result.notifications.updated,
            result.notifications.completed,
            result.sweeps_run,
            result.records_deleted,
            result.store_failures
        );
        for violation in &result.oracle.violations {
            println!("  {violation}");
        }
        if !result.oracle.passed {
            bail!("seed {seed} violated {} invariants", result.oracle.violations.len());
        }
        return Ok(());
    }

    let report = run_campaign(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(seed) = report.first_failure {
        bail!("campaign failed; replay with `roadwatch-sim {seed}`");
    }
    Ok(())
}
