//! State store port and its adapters.
//!
//! The engine talks to persistence only through [`EventStore`]. There are no
//! transactions: every call stands alone, and each closure is reconciled
//! independently.
//!
//! Failures come in two flavours. A [`StoreError::Unavailable`] means the
//! store as a whole cannot be reached and the pass must stop; anything else
//! concerns one record and the pass moves on to the next event.

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use crate::model::EventRecord;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Reserved key of the retention sweeper's run marker.
pub const RUN_MARKER_KEY: &str = "LastCleanup";

/// Errors reported by a state store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Connection-level failure; nothing further can be written this pass.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// A single read or write failed.
    #[error("store operation on '{event_id}' failed: {reason}")]
    Record { event_id: String, reason: String },

    /// A partial update targeted a record that does not exist.
    #[error("no stored record for '{0}'")]
    NotFound(String),
}

impl StoreError {
    /// True when the failure affects the whole store, not one record.
    #[must_use]
    pub const fn is_systemic(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub(crate) fn record(event_id: &str, reason: impl ToString) -> Self {
        Self::Record {
            event_id: event_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Single-attribute partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    IsActive(bool),
    LastTouched(i64),
}

/// Scan filter; unset fields do not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFilter {
    /// Match only records with this activity flag.
    pub is_active: Option<bool>,
    /// Match only records whose `LastUpdated` is present and strictly older.
    pub last_updated_before: Option<i64>,
}

impl ScanFilter {
    #[must_use]
    pub const fn active() -> Self {
        Self {
            is_active: Some(true),
            last_updated_before: None,
        }
    }

    #[must_use]
    pub const fn closed_before(cutoff: i64) -> Self {
        Self {
            is_active: Some(false),
            last_updated_before: Some(cutoff),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &EventRecord) -> bool {
        if self.is_active.is_some_and(|active| active != record.is_active) {
            return false;
        }
        match self.last_updated_before {
            Some(cutoff) => record.last_updated.is_some_and(|updated| updated < cutoff),
            None => true,
        }
    }
}

/// One page of scan results plus the continuation cursor, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub records: Vec<EventRecord>,
    /// Pass back to [`EventStore::scan`] to fetch the next page.
    pub next_cursor: Option<String>,
}

/// Persistence operations the reconciler needs.
pub trait EventStore {
    /// The record for `event_id` if it exists and is active.
    ///
    /// Implementations must read their own latest writes.
    fn get_active(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError>;

    /// Upsert with full replacement.
    fn put(&self, record: &EventRecord) -> Result<(), StoreError>;

    /// Partial update of one attribute on an existing record.
    fn update_field(&self, event_id: &str, update: FieldUpdate) -> Result<(), StoreError>;

    /// One page of records matching `filter`, ordered by `event_id`,
    /// starting after `cursor`.
    fn scan(
        &self,
        filter: &ScanFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, StoreError>;

    /// Permanently remove a record. Deleting a missing record is not an error.
    fn delete(&self, event_id: &str) -> Result<(), StoreError>;

    /// ISO date of the last retention sweep, if one has run.
    fn last_execution_day(&self) -> Result<Option<String>, StoreError>;

    /// Upsert the run marker.
    fn set_last_execution_day(&self, day: &str) -> Result<(), StoreError>;
}

/// Follow continuation cursors until the scan is exhausted.
///
/// # Errors
///
/// Returns the first store error met while paging.
pub fn scan_all(
    store: &dyn EventStore,
    filter: &ScanFilter,
    page_size: usize,
) -> Result<Vec<EventRecord>, StoreError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store.scan(filter, cursor.as_deref(), page_size.max(1))?;
        records.extend(page.records);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeedEvent;

    fn record(id: &str, active: bool, last_updated: Option<i64>) -> EventRecord {
        let event = FeedEvent {
            id: id.into(),
            is_full_closure: true,
            latitude: 53.5,
            longitude: -113.5,
            roadway_name: String::new(),
            direction_of_travel: String::new(),
            description: String::new(),
            event_type: String::new(),
            comment: None,
            start_date: 0,
            planned_end_date: None,
            last_updated,
        };
        let mut record = EventRecord::opened(&event, 0, "Other".into());
        record.is_active = active;
        record
    }

    #[test]
    fn filter_matches_activity_and_age() {
        let filter = ScanFilter::closed_before(100);
        assert!(filter.matches(&record("a", false, Some(99))));
        assert!(!filter.matches(&record("b", false, Some(100))));
        assert!(!filter.matches(&record("c", true, Some(1))));
        assert!(!filter.matches(&record("d", false, None)));

        assert!(ScanFilter::active().matches(&record("e", true, None)));
        assert!(ScanFilter::default().matches(&record("f", false, None)));
    }

    #[test]
    fn only_unavailable_is_systemic() {
        assert!(StoreError::Unavailable("down".into()).is_systemic());
        assert!(!StoreError::record("x", "constraint").is_systemic());
        assert!(!StoreError::NotFound("x".into()).is_systemic());
    }

    #[test]
    fn scan_all_follows_cursors() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store
                .put(&record(&format!("id-{i}"), i % 2 == 0, None))
                .expect("put");
        }

        let active = scan_all(&store, &ScanFilter::active(), 2).expect("scan");
        let ids: Vec<&str> = active.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, ["id-0", "id-2", "id-4", "id-6"]);

        let everything = scan_all(&store, &ScanFilter::default(), 3).expect("scan");
        assert_eq!(everything.len(), 7);
    }
}
