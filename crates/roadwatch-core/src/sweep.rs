//! Retention sweeper: purge closed records once they age out.
//!
//! Runs at most once per UTC calendar day. The gate compares ISO dates as
//! strings, so `"2024-03-01" < "2024-03-02"` is the whole rule.

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::ReconcileConfig;
use crate::store::{EventStore, ScanFilter, StoreError};

const SECONDS_PER_DAY: i64 = 86_400;

/// What the sweeper did this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Already ran today.
    NotDue { last_execution_day: String },
    /// Ran; `failed` counts per-record delete failures left for tomorrow.
    Swept {
        day: String,
        deleted: usize,
        failed: usize,
    },
}

impl SweepOutcome {
    #[must_use]
    pub const fn deleted(&self) -> usize {
        match self {
            Self::NotDue { .. } => 0,
            Self::Swept { deleted, .. } => *deleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweeper {
    retention_days: u32,
    page_size: usize,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}

impl RetentionSweeper {
    #[must_use]
    pub fn new(retention_days: u32, page_size: usize) -> Self {
        Self {
            retention_days,
            page_size: page_size.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(config.retention_days, config.scan_page_size)
    }

    /// Epoch cutoff: closed records last updated strictly before this go.
    #[must_use]
    pub fn cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(i64::from(self.retention_days) * SECONDS_PER_DAY)
    }

    /// Sweep if the run marker is absent or older than today.
    ///
    /// # Errors
    ///
    /// Returns the store error if the marker cannot be read or written, or
    /// if the store becomes unavailable mid-sweep.
    pub fn run_if_due(
        &self,
        store: &dyn EventStore,
        clock: &dyn Clock,
    ) -> Result<SweepOutcome, StoreError> {
        let today = clock.today().format("%Y-%m-%d").to_string();
        let last = store.last_execution_day()?;
        if let Some(last) = last.filter(|day| day.as_str() >= today.as_str()) {
            info!(last_execution_day = %last, "retention sweep already ran today");
            return Ok(SweepOutcome::NotDue {
                last_execution_day: last,
            });
        }
        self.sweep(store, clock.now_epoch(), &today)
    }

    /// Unconditionally delete expired closed records, then stamp `today`.
    ///
    /// # Errors
    ///
    /// Returns systemic store errors and marker write failures.
    pub fn sweep(
        &self,
        store: &dyn EventStore,
        now: i64,
        today: &str,
    ) -> Result<SweepOutcome, StoreError> {
        let filter = ScanFilter::closed_before(self.cutoff(now));
        let mut deleted = 0;
        let mut failed = 0;
        let mut cursor: Option<String> = None;

        loop {
            let page = store.scan(&filter, cursor.as_deref(), self.page_size)?;
            for record in &page.records {
                match store.delete(&record.event_id) {
                    Ok(()) => deleted += 1,
                    Err(err) if err.is_systemic() => return Err(err),
                    Err(err) => {
                        warn!(event_id = %record.event_id, error = %err, "retention delete failed");
                        failed += 1;
                    }
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        store.set_last_execution_day(today)?;
        info!(
            day = today,
            deleted,
            failed,
            retention_days = self.retention_days,
            "retention sweep finished"
        );
        Ok(SweepOutcome::Swept {
            day: today.to_string(),
            deleted,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{EventRecord, FeedEvent};
    use crate::store::MemoryStore;

    // 2024-03-10T12:00:00Z
    const NOW: i64 = 1_710_072_000;
    const DAY: i64 = SECONDS_PER_DAY;

    fn closed(id: &str, last_updated: Option<i64>) -> EventRecord {
        let event = FeedEvent {
            id: id.into(),
            is_full_closure: true,
            latitude: 53.5,
            longitude: -113.5,
            roadway_name: "Anthony Henday Dr".into(),
            direction_of_travel: "Eastbound".into(),
            description: String::new(),
            event_type: "closures".into(),
            comment: None,
            start_date: 0,
            planned_end_date: None,
            last_updated,
        };
        let mut record = EventRecord::opened(&event, 0, "Edmonton".into());
        record.is_active = false;
        record
    }

    #[test]
    fn six_day_old_closure_is_deleted_four_day_old_is_kept() {
        let store = MemoryStore::new();
        store.put(&closed("old", Some(NOW - 6 * DAY))).expect("put");
        store.put(&closed("recent", Some(NOW - 4 * DAY))).expect("put");
        let clock = FixedClock::at_epoch(NOW);

        let outcome = RetentionSweeper::default()
            .run_if_due(&store, &clock)
            .expect("sweep");

        assert_eq!(outcome.deleted(), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("recent").is_some());
        assert_eq!(
            store.last_execution_day().expect("marker").as_deref(),
            Some("2024-03-10")
        );
    }

    #[test]
    fn active_and_unversioned_records_are_never_deleted() {
        let store = MemoryStore::new();
        let mut active = closed("active", Some(NOW - 30 * DAY));
        active.is_active = true;
        store.put(&active).expect("put");
        store.put(&closed("unversioned", None)).expect("put");

        let outcome = RetentionSweeper::default()
            .run_if_due(&store, &FixedClock::at_epoch(NOW))
            .expect("sweep");

        assert_eq!(outcome.deleted(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn runs_at_most_once_per_day() {
        let store = MemoryStore::new();
        let clock = FixedClock::at_epoch(NOW);
        let sweeper = RetentionSweeper::default();

        assert!(matches!(
            sweeper.run_if_due(&store, &clock).expect("first"),
            SweepOutcome::Swept { .. }
        ));

        store.put(&closed("late", Some(NOW - 7 * DAY))).expect("put");
        assert_eq!(
            sweeper.run_if_due(&store, &clock).expect("second"),
            SweepOutcome::NotDue {
                last_execution_day: "2024-03-10".into()
            }
        );
        assert!(store.get("late").is_some());

        clock.advance(chrono::Duration::days(1));
        assert_eq!(sweeper.run_if_due(&store, &clock).expect("next day").deleted(), 1);
    }

    #[test]
    fn future_marker_suppresses_the_sweep() {
        let store = MemoryStore::new();
        store.set_last_execution_day("2024-03-11").expect("marker");
        store.put(&closed("old", Some(NOW - 9 * DAY))).expect("put");

        let outcome = RetentionSweeper::default()
            .run_if_due(&store, &FixedClock::at_epoch(NOW))
            .expect("sweep");
        assert!(matches!(outcome, SweepOutcome::NotDue { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn pages_through_every_match() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store
                .put(&closed(&format!("c{i}"), Some(NOW - 10 * DAY)))
                .expect("put");
        }
        let outcome = RetentionSweeper::new(5, 2)
            .run_if_due(&store, &FixedClock::at_epoch(NOW))
            .expect("sweep");
        assert_eq!(outcome.deleted(), 7);
        assert!(store.is_empty());
    }

    #[test]
    fn per_record_failure_is_counted_and_marker_still_set() {
        let store = MemoryStore::new();
        store.put(&closed("a", Some(NOW - 10 * DAY))).expect("put");
        store.put(&closed("b", Some(NOW - 10 * DAY))).expect("put");
        store.fail_writes_for("a");

        let outcome = RetentionSweeper::default()
            .run_if_due(&store, &FixedClock::at_epoch(NOW))
            .expect("sweep");
        assert_eq!(
            outcome,
            SweepOutcome::Swept {
                day: "2024-03-10".into(),
                deleted: 1,
                failed: 1
            }
        );
        assert!(store.get("a").is_some());
        assert!(store.last_execution_day().expect("marker").is_some());
    }

    #[test]
    fn unavailable_store_aborts_without_marker() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = RetentionSweeper::default()
            .run_if_due(&store, &FixedClock::at_epoch(NOW))
            .expect_err("offline");
        assert!(err.is_systemic());

        store.set_unavailable(false);
        assert_eq!(store.last_execution_day().expect("marker"), None);
    }
}
