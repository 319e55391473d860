use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use roadwatch_core::{EventRecord, FeedEvent, Notification, NotificationKind, RegionRegistry};
use serde::Serialize;

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for one or more invariant checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn record(&mut self, violation: InvariantViolation) {
        self.passed = false;
        self.violations.push(violation);
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "invariant", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// The store holds more than one record for an ID.
    DuplicateRecord { pass: u64, event_id: String },

    /// An active record has no full closure behind it in the latest feed.
    ActiveWithoutClosure { pass: u64, event_id: String },

    /// A full closure in the latest feed has no active record.
    ClosureWithoutRecord { pass: u64, event_id: String },

    /// `Opened` for an ID that is already open.
    DoubleOpen { pass: u64, event_id: String },

    /// `Completed` or `Updated` for an ID that is not open.
    NotOpen {
        pass: u64,
        event_id: String,
        kind: NotificationKind,
    },

    /// The region tag of an open closure changed.
    RegionChanged {
        pass: u64,
        event_id: String,
        before: String,
        after: String,
    },

    /// `Opened` carried a region the classifier would not assign.
    Misclassified {
        pass: u64,
        event_id: String,
        expected: String,
        actual: String,
    },

    /// Re-running a pass over the same feed emitted notifications.
    NotIdempotent { pass: u64, notifications: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRecord { pass, event_id } => {
                write!(f, "pass {pass}: duplicate records for {event_id}")
            }
            Self::ActiveWithoutClosure { pass, event_id } => {
                write!(f, "pass {pass}: {event_id} active but not a full closure upstream")
            }
            Self::ClosureWithoutRecord { pass, event_id } => {
                write!(f, "pass {pass}: {event_id} closed upstream but no active record")
            }
            Self::DoubleOpen { pass, event_id } => {
                write!(f, "pass {pass}: {event_id} opened twice")
            }
            Self::NotOpen {
                pass,
                event_id,
                kind,
            } => write!(f, "pass {pass}: {kind} for {event_id} which is not open"),
            Self::RegionChanged {
                pass,
                event_id,
                before,
                after,
            } => write!(f, "pass {pass}: {event_id} region changed {before} -> {after}"),
            Self::Misclassified {
                pass,
                event_id,
                expected,
                actual,
            } => write!(
                f,
                "pass {pass}: {event_id} tagged {actual}, classifier says {expected}"
            ),
            Self::NotIdempotent {
                pass,
                notifications,
            } => write!(
                f,
                "pass {pass}: replay over unchanged feed emitted {notifications} notifications"
            ),
        }
    }
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Tracks the lifecycle seen through notifications and checks it against
/// the store and the feed after every pass.
#[derive(Debug, Default)]
pub struct LifecycleOracle {
    /// Open IDs and the region they were opened with.
    open: BTreeMap<String, Option<String>>,
    result: OracleResult,
}

impl Default for OracleResult {
    fn default() -> Self {
        Self::pass()
    }
}

/// Everything the oracle needs to judge one pass.
pub struct PassObservation<'a> {
    pub pass: u64,
    pub feed: &'a [FeedEvent],
    pub notifications: &'a [Notification],
    pub records: &'a [EventRecord],
    /// IDs whose writes were made to fail this pass.
    pub faulted: &'a BTreeSet<String>,
    pub regions: &'a RegionRegistry,
}

impl LifecycleOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn result(&self) -> &OracleResult {
        &self.result
    }

    #[must_use]
    pub fn into_result(self) -> OracleResult {
        self.result
    }

    /// Feed one pass's notifications through the lifecycle model, then check
    /// store/feed agreement.
    pub fn observe(&mut self, obs: &PassObservation<'_>) {
        let feed_by_id = first_by_id(obs.feed);
        for notification in obs.notifications {
            self.apply(obs.pass, notification, &feed_by_id, obs.regions);
        }
        self.check_store(obs, &feed_by_id);
    }

    /// A replay over the same feed must be silent.
    pub fn observe_replay(&mut self, pass: u64, notifications: &[Notification]) {
        if !notifications.is_empty() {
            self.result.record(InvariantViolation::NotIdempotent {
                pass,
                notifications: notifications.len(),
            });
        }
    }

    fn apply(
        &mut self,
        pass: u64,
        notification: &Notification,
        feed_by_id: &HashMap<&str, &FeedEvent>,
        regions: &RegionRegistry,
    ) {
        let event_id = notification.event.event_id.clone();
        match notification.kind {
            NotificationKind::Opened => {
                if self.open.contains_key(&event_id) {
                    self.result.record(InvariantViolation::DoubleOpen {
                        pass,
                        event_id: event_id.clone(),
                    });
                }
                if let Some(event) = feed_by_id.get(event_id.as_str()) {
                    let expected = regions.classify(event.latitude, event.longitude);
                    let actual = notification.region.clone().unwrap_or_default();
                    if expected != actual {
                        self.result.record(InvariantViolation::Misclassified {
                            pass,
                            event_id: event_id.clone(),
                            expected,
                            actual,
                        });
                    }
                }
                self.open.insert(event_id, notification.region.clone());
            }
            NotificationKind::Updated | NotificationKind::Completed => {
                let Some(opened_with) = self.open.get(&event_id) else {
                    self.result.record(InvariantViolation::NotOpen {
                        pass,
                        event_id,
                        kind: notification.kind,
                    });
                    return;
                };
                if *opened_with != notification.region {
                    self.result.record(InvariantViolation::RegionChanged {
                        pass,
                        event_id: event_id.clone(),
                        before: opened_with.clone().unwrap_or_default(),
                        after: notification.region.clone().unwrap_or_default(),
                    });
                }
                if notification.kind == NotificationKind::Completed {
                    self.open.remove(&event_id);
                }
            }
        }
    }

    fn check_store(&mut self, obs: &PassObservation<'_>, feed_by_id: &HashMap<&str, &FeedEvent>) {
        let mut seen = BTreeSet::new();
        for record in obs.records {
            if !seen.insert(record.event_id.as_str()) {
                self.result.record(InvariantViolation::DuplicateRecord {
                    pass: obs.pass,
                    event_id: record.event_id.clone(),
                });
            }
            if !record.is_active || obs.faulted.contains(&record.event_id) {
                continue;
            }
            let backed = feed_by_id
                .get(record.event_id.as_str())
                .is_some_and(|event| event.is_full_closure);
            if !backed {
                self.result.record(InvariantViolation::ActiveWithoutClosure {
                    pass: obs.pass,
                    event_id: record.event_id.clone(),
                });
            }
        }

        let active: BTreeSet<&str> = obs
            .records
            .iter()
            .filter(|record| record.is_active)
            .map(|record| record.event_id.as_str())
            .collect();
        for event in feed_by_id.values() {
            if event.is_full_closure
                && !obs.faulted.contains(&event.id)
                && !active.contains(event.id.as_str())
            {
                self.result.record(InvariantViolation::ClosureWithoutRecord {
                    pass: obs.pass,
                    event_id: event.id.clone(),
                });
            }
        }
    }
}

fn first_by_id(feed: &[FeedEvent]) -> HashMap<&str, &FeedEvent> {
    let mut by_id = HashMap::with_capacity(feed.len());
    for event in feed {
        by_id.entry(event.id.as_str()).or_insert(event);
    }
    by_id
}
