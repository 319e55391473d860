//! Injectable wall clock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" for a reconciliation pass.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as epoch seconds.
    fn now_epoch(&self) -> i64 {
        self.now().timestamp()
    }

    /// Current UTC calendar day.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock with one-second resolution, for tests and simulation.
#[derive(Debug)]
pub struct FixedClock {
    epoch_secs: AtomicI64,
}

impl FixedClock {
    #[must_use]
    pub const fn at_epoch(epoch_secs: i64) -> Self {
        Self {
            epoch_secs: AtomicI64::new(epoch_secs),
        }
    }

    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::at_epoch(instant.timestamp())
    }

    pub fn set_epoch(&self, epoch_secs: i64) {
        self.epoch_secs.store(epoch_secs, Ordering::Relaxed);
    }

    pub fn advance(&self, by: Duration) {
        self.epoch_secs.fetch_add(by.num_seconds(), Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.epoch_secs.load(Ordering::Relaxed), 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_and_reports_day() {
        // 2023-11-14T22:13:20Z
        let clock = FixedClock::at_epoch(1_700_000_000);
        assert_eq!(clock.today().to_string(), "2023-11-14");

        clock.advance(Duration::hours(2));
        assert_eq!(clock.now_epoch(), 1_700_007_200);
        assert_eq!(clock.today().to_string(), "2023-11-15");

        clock.set_epoch(0);
        assert_eq!(clock.today().to_string(), "1970-01-01");
    }
}
