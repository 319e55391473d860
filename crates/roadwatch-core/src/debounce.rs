//! Heartbeat debounce for unchanged active records.
//!
//! Rewriting `lastTouched` on every pass for every open closure would turn
//! each poll into a full-table write. Instead a record is touched only when
//! the time since its last heartbeat, nudged by a uniform random jitter,
//! exceeds the threshold. The jitter spreads refreshes across passes so a
//! batch of closures opened together does not cross the threshold in
//! lockstep.

use rand::{Rng, RngCore};

use crate::config::ReconcileConfig;

/// Outcome of one heartbeat decision, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatDecision {
    pub elapsed_minutes: f64,
    pub jitter_minutes: f64,
    pub refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceController {
    threshold_minutes: f64,
    jitter_minutes: f64,
}

impl Default for DebounceController {
    fn default() -> Self {
        Self::new(5.0, 2.0)
    }
}

impl DebounceController {
    /// Negative inputs are treated as zero.
    #[must_use]
    pub fn new(threshold_minutes: f64, jitter_minutes: f64) -> Self {
        Self {
            threshold_minutes: threshold_minutes.max(0.0),
            jitter_minutes: jitter_minutes.max(0.0),
        }
    }

    #[must_use]
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(
            config.debounce_threshold_minutes,
            config.debounce_jitter_minutes,
        )
    }

    #[must_use]
    pub const fn threshold_minutes(&self) -> f64 {
        self.threshold_minutes
    }

    /// Draw one jitter value uniformly from `[-jitter, +jitter]`.
    pub fn sample_jitter(&self, rng: &mut dyn RngCore) -> f64 {
        if self.jitter_minutes <= 0.0 {
            return 0.0;
        }
        rng.gen_range(-self.jitter_minutes..=self.jitter_minutes)
    }

    /// Pure decision rule: refresh when `|elapsed + jitter| > threshold`.
    #[must_use]
    pub fn decide(&self, elapsed_minutes: f64, jitter_minutes: f64) -> bool {
        (elapsed_minutes + jitter_minutes).abs() > self.threshold_minutes
    }

    /// Decide whether a record last touched at `last_touched` (epoch
    /// seconds) needs a heartbeat at `now`.
    pub fn evaluate(&self, last_touched: i64, now: i64, rng: &mut dyn RngCore) -> HeartbeatDecision {
        let elapsed_minutes = elapsed_minutes(last_touched, now);
        let jitter_minutes = self.sample_jitter(rng);
        HeartbeatDecision {
            elapsed_minutes,
            jitter_minutes,
            refresh: self.decide(elapsed_minutes, jitter_minutes),
        }
    }

    /// Convenience wrapper over [`evaluate`](Self::evaluate).
    pub fn should_refresh(&self, last_touched: i64, now: i64, rng: &mut dyn RngCore) -> bool {
        self.evaluate(last_touched, now, rng).refresh
    }
}

/// Minutes between two epoch-second timestamps; negative if `then` is ahead.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_minutes(then: i64, now: i64) -> f64 {
    now.saturating_sub(then) as f64 / 60.0
}
