//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with shared parameters, collecting pass/fail results
//! and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scenario::ChurnConfig;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration: which seeds, and the per-seed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub passes: u64,
    pub minutes_per_pass: i64,
    pub churn: ChurnConfig,
    pub write_fault_percent: u8,
    pub replay_each_pass: bool,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..50,
            passes: sim.passes,
            minutes_per_pass: sim.minutes_per_pass,
            churn: sim.churn,
            write_fault_percent: sim.write_fault_percent,
            replay_each_pass: sim.replay_each_pass,
        }
    }
}

impl CampaignConfig {
    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            passes: self.passes,
            minutes_per_pass: self.minutes_per_pass,
            churn: self.churn,
            write_fault_percent: self.write_fault_percent,
            replay_each_pass: self.replay_each_pass,
            ..SimulationConfig::default()
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.passes == 0 {
            bail!("passes must be > 0");
        }
        if self.minutes_per_pass <= 0 {
            bail!("minutes_per_pass must be > 0");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds whose run exercised the sweeper and injected store faults.
    pub seeds_with_faults_and_sweeps: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulated pass aborts.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        seeds_with_faults_and_sweeps: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let result = run_seed(config, seed)?;

        if result.sweeps_run > 0 && result.store_failures > 0 {
            report.seeds_with_faults_and_sweeps += 1;
        }

        if result.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = result.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: result
                    .oracle
                    .violations
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
    }

    info!(
        seeds_run = report.seeds_run,
        seeds_passed = report.seeds_passed,
        "campaign finished"
    );
    Ok(report)
}

/// Replay one seed with the campaign's parameters.
///
/// # Errors
///
/// Returns an error if a simulated pass aborts.
pub fn run_seed(config: &CampaignConfig, seed: u64) -> Result<SimulationResult> {
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CampaignConfig {
        CampaignConfig {
            seed_range: 0..8,
            passes: 80,
            ..CampaignConfig::default()
        }
    }

    #[test]
    fn small_campaign_passes_every_seed() {
        let report = run_campaign(&small()).expect("campaign");
        assert_eq!(report.seeds_run, 8);
        assert!(report.all_passed(), "{:?}", report.failures);
        assert_eq!(report.first_failure, None);
    }

    #[test]
    fn empty_seed_range_is_rejected() {
        let config = CampaignConfig {
            seed_range: 3..3,
            ..CampaignConfig::default()
        };
        assert!(run_campaign(&config).is_err());
    }

    #[test]
    fn seed_replay_matches_campaign_parameters() {
        let config = small();
        let result = run_seed(&config, 5).expect("replay");
        assert_eq!(result.seed, 5);
        assert_eq!(result.passes_run, 80);
    }
}
