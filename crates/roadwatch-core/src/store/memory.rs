//! In-process [`EventStore`] backed by a `BTreeMap`, with fault injection.
//!
//! Used by tests and the simulator. Single-threaded by construction
//! (`RefCell`), matching the engine's sequential pass.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use super::{EventStore, FieldUpdate, RUN_MARKER_KEY, ScanFilter, ScanPage, StoreError};
use crate::model::EventRecord;

/// Counters for observing write amplification in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub puts: usize,
    pub field_updates: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<String, EventRecord>>,
    markers: RefCell<BTreeMap<String, String>>,
    failing_ids: RefCell<BTreeSet<String>>,
    unavailable: Cell<bool>,
    stats: Cell<WriteStats>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write touching `event_id` fail with a record error.
    pub fn fail_writes_for(&self, event_id: &str) {
        self.failing_ids.borrow_mut().insert(event_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_ids.borrow_mut().clear();
        self.unavailable.set(false);
    }

    /// Make every operation fail as if the connection were lost.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Direct read regardless of activity, for assertions.
    #[must_use]
    pub fn get(&self, event_id: &str) -> Option<EventRecord> {
        self.records.borrow().get(event_id).cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<EventRecord> {
        self.records.borrow().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    #[must_use]
    pub fn write_stats(&self) -> WriteStats {
        self.stats.get()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn check_writable(&self, event_id: &str) -> Result<(), StoreError> {
        self.check_available()?;
        if self.failing_ids.borrow().contains(event_id) {
            return Err(StoreError::record(event_id, "injected write failure"));
        }
        Ok(())
    }

    fn bump(&self, f: impl FnOnce(&mut WriteStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl EventStore for MemoryStore {
    fn get_active(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .borrow()
            .get(event_id)
            .filter(|record| record.is_active)
            .cloned())
    }

    fn put(&self, record: &EventRecord) -> Result<(), StoreError> {
        self.check_writable(&record.event_id)?;
        self.records
            .borrow_mut()
            .insert(record.event_id.clone(), record.clone());
        self.bump(|s| s.puts += 1);
        Ok(())
    }

    fn update_field(&self, event_id: &str, update: FieldUpdate) -> Result<(), StoreError> {
        self.check_writable(event_id)?;
        let mut records = self.records.borrow_mut();
        let record = records
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound(event_id.to_string()))?;
        match update {
            FieldUpdate::IsActive(active) => record.is_active = active,
            FieldUpdate::LastTouched(at) => record.last_touched = Some(at),
        }
        self.bump(|s| s.field_updates += 1);
        Ok(())
    }

    fn scan(
        &self,
        filter: &ScanFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        self.check_available()?;
        let records = self.records.borrow();
        let mut matching = records
            .values()
            .filter(|record| cursor.is_none_or(|after| record.event_id.as_str() > after))
            .filter(|record| filter.matches(record));

        let page: Vec<EventRecord> = matching.by_ref().take(limit.max(1)).cloned().collect();
        let next_cursor = if matching.next().is_some() {
            page.last().map(|record| record.event_id.clone())
        } else {
            None
        };
        Ok(ScanPage {
            records: page,
            next_cursor,
        })
    }

    fn delete(&self, event_id: &str) -> Result<(), StoreError> {
        self.check_writable(event_id)?;
        self.records.borrow_mut().remove(event_id);
        self.bump(|s| s.deletes += 1);
        Ok(())
    }

    fn last_execution_day(&self) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.markers.borrow().get(RUN_MARKER_KEY).cloned())
    }

    fn set_last_execution_day(&self, day: &str) -> Result<(), StoreError> {
        self.check_writable(RUN_MARKER_KEY)?;
        self.markers
            .borrow_mut()
            .insert(RUN_MARKER_KEY.to_string(), day.to_string());
        Ok(())
    }
}
