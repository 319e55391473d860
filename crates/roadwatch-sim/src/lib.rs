//! roadwatch-sim library.
//!
//! Drives the real reconciliation engine against a scripted feed, an
//! in-memory store, and a simulated clock, checking lifecycle invariants
//! after every pass. Everything is derived from one seed, so any failure
//! replays exactly.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod oracle;
pub mod rng;
pub mod scenario;

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use roadwatch_core::clock::{Clock, FixedClock};
use roadwatch_core::config::ReconcileConfig;
use roadwatch_core::feed::MemoryFeed;
use roadwatch_core::notify::RecordingNotifier;
use roadwatch_core::store::MemoryStore;
use roadwatch_core::sweep::SweepOutcome;
use roadwatch_core::{NotificationKind, PassReport, ReconcileContext, RegionRegistry, run_pass};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::oracle::{LifecycleOracle, OracleResult, PassObservation};
use crate::rng::DeterministicRng;
use crate::scenario::{ChurnConfig, ScriptedFeed};

/// Parameters for one simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub passes: u64,
    /// Simulated epoch seconds of the first pass.
    pub start_epoch: i64,
    pub minutes_per_pass: i64,
    pub churn: ChurnConfig,
    /// Chance that writes for a given feed ID fail during a pass.
    pub write_fault_percent: u8,
    /// Re-run every pass over the same feed and expect silence.
    pub replay_each_pass: bool,
    pub reconcile: ReconcileConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            passes: 240,
            // 2024-03-10T00:00:00Z
            start_epoch: 1_710_028_800,
            minutes_per_pass: 45,
            churn: ChurnConfig::default(),
            write_fault_percent: 3,
            replay_each_pass: true,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error if the run would be empty or time would not advance.
    pub fn validate(&self) -> Result<()> {
        if self.passes == 0 {
            bail!("passes must be > 0");
        }
        if self.minutes_per_pass <= 0 {
            bail!("minutes_per_pass must be > 0");
        }
        Ok(())
    }
}

/// Notification totals across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationTotals {
    pub opened: usize,
    pub updated: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub seed: u64,
    pub passes_run: u64,
    pub events_spawned: u64,
    pub notifications: NotificationTotals,
    pub sweeps_run: usize,
    pub records_deleted: usize,
    pub store_failures: usize,
    pub oracle: OracleResult,
    pub reports: Vec<PassReport>,
}

pub struct Simulator {
    config: SimulationConfig,
    regions: RegionRegistry,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let regions = RegionRegistry::alberta().context("load bundled region registry")?;
        Ok(Self { config, regions })
    }

    /// Run every pass and return the oracle verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if a pass aborts, which the in-memory store and
    /// feed never cause on their own.
    pub fn run(&self) -> Result<SimulationResult> {
        let config = &self.config;
        let store = MemoryStore::new();
        let feed = MemoryFeed::default();
        let notifier = RecordingNotifier::new();
        let clock = FixedClock::at_epoch(config.start_epoch);
        let mut world_rng = DeterministicRng::fork(config.seed, 0);
        let mut engine_rng = DeterministicRng::fork(config.seed, 1);
        let mut fault_rng = DeterministicRng::fork(config.seed, 2);
        let mut scenario = ScriptedFeed::new(config.churn);
        let mut oracle = LifecycleOracle::new();
        let mut totals = NotificationTotals::default();
        let mut reports = Vec::with_capacity(usize::try_from(config.passes).unwrap_or(0));

        for pass in 0..config.passes {
            clock.advance(chrono::Duration::minutes(config.minutes_per_pass));
            let snapshot = scenario.step(&mut world_rng, clock.now_epoch());
            feed.set_events(snapshot.clone());

            store.clear_failures();
            let faulted: BTreeSet<String> = store
                .all()
                .into_iter()
                .map(|record| record.event_id)
                .chain(snapshot.iter().map(|event| event.id.clone()))
                .filter(|_| fault_rng.hit_rate_percent(config.write_fault_percent))
                .collect();
            for id in &faulted {
                store.fail_writes_for(id);
            }

            let mut ctx = ReconcileContext {
                store: &store,
                feed: &feed,
                notifier: &notifier,
                clock: &clock,
                rng: &mut engine_rng,
                regions: &self.regions,
                config: &config.reconcile,
            };
            let report = run_pass(&mut ctx).with_context(|| format!("pass {pass} aborted"))?;
            let notifications = notifier.take();
            for notification in &notifications {
                match notification.kind {
                    NotificationKind::Opened => totals.opened += 1,
                    NotificationKind::Updated => totals.updated += 1,
                    NotificationKind::Completed => totals.completed += 1,
                }
            }

            let records = store.all();
            oracle.observe(&PassObservation {
                pass,
                feed: &snapshot,
                notifications: &notifications,
                records: &records,
                faulted: &faulted,
                regions: &self.regions,
            });

            if config.replay_each_pass {
                let mut ctx = ReconcileContext {
                    store: &store,
                    feed: &feed,
                    notifier: &notifier,
                    clock: &clock,
                    rng: &mut engine_rng,
                    regions: &self.regions,
                    config: &config.reconcile,
                };
                run_pass(&mut ctx).with_context(|| format!("replay of pass {pass} aborted"))?;
                oracle.observe_replay(pass, &notifier.take());
            }

            debug!(pass, %report, "simulated pass");
            reports.push(report);
        }

        let sweeps_run = reports
            .iter()
            .filter(|report| matches!(report.sweep, Some(SweepOutcome::Swept { .. })))
            .count();
        let records_deleted = reports
            .iter()
            .filter_map(|report| report.sweep.as_ref())
            .map(SweepOutcome::deleted)
            .sum();
        let store_failures = reports.iter().map(|report| report.failed).sum();

        Ok(SimulationResult {
            seed: config.seed,
            passes_run: config.passes,
            events_spawned: scenario.spawned(),
            notifications: totals,
            sweeps_run,
            records_deleted,
            store_failures,
            oracle: oracle.into_result(),
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            passes: 60,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn default_run_upholds_invariants() {
        let sim = Simulator::new(SimulationConfig::default()).expect("config");
        let result = sim.run().expect("run");
        assert!(result.oracle.passed, "{:?}", result.oracle.violations);
        assert!(result.notifications.opened > 0);
        assert!(result.notifications.completed > 0);
        assert!(result.sweeps_run >= 6, "240 passes of 45 minutes span 7.5 days");
    }

    #[test]
    fn same_seed_replays_identically() {
        let a = Simulator::new(short(17)).expect("config").run().expect("run");
        let b = Simulator::new(short(17)).expect("config").run().expect("run");
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(
            Simulator::new(SimulationConfig {
                passes: 0,
                ..SimulationConfig::default()
            })
            .is_err()
        );
    }

    #[test]
    fn fault_free_run_has_no_store_failures() {
        let sim = Simulator::new(SimulationConfig {
            write_fault_percent: 0,
            ..short(4)
        })
        .expect("config");
        let result = sim.run().expect("run");
        assert_eq!(result.store_failures, 0);
        assert!(result.oracle.passed, "{:?}", result.oracle.violations);
    }
}
