//! Reconciliation engine: one pass of sweeper, close-out, then open/update.
//!
//! A pass is strictly sequential:
//!
//! 1. the retention sweeper, gated to once per day;
//! 2. a feed fetch, whose failure aborts the pass before Step A or Step B
//!    writes anything;
//! 3. **Step A**: every active record whose ID is missing from the feed, or
//!    whose feed item is no longer a full closure, is closed and announced;
//! 4. **Step B**: every full closure in the feed is opened, updated, or given
//!    a debounced heartbeat.
//!
//! Store failures for a single event skip that event. A systemic failure
//! ([`StoreError::is_systemic`]) aborts what is left of the pass.

use std::collections::HashMap;
use std::fmt;

use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ReconcileConfig;
use crate::debounce::DebounceController;
use crate::error::ErrorCode;
use crate::feed::{FeedError, FeedSource};
use crate::model::{EventRecord, FeedEvent, Notification, NotificationKind};
use crate::notify::Notifier;
use crate::region::RegionRegistry;
use crate::store::{EventStore, FieldUpdate, ScanFilter, StoreError, scan_all};
use crate::sweep::{RetentionSweeper, SweepOutcome};

// ---------------------------------------------------------------------------
// Context, report, errors
// ---------------------------------------------------------------------------

/// Everything one pass reads from or writes to.
pub struct ReconcileContext<'a> {
    pub store: &'a dyn EventStore,
    pub feed: &'a dyn FeedSource,
    pub notifier: &'a dyn Notifier,
    pub clock: &'a dyn Clock,
    pub rng: &'a mut dyn RngCore,
    pub regions: &'a RegionRegistry,
    pub config: &'a ReconcileConfig,
}

/// Summary of a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// `None` when the sweep itself failed on a non-systemic error.
    pub sweep: Option<SweepOutcome>,
    pub feed_events: usize,
    pub opened: usize,
    pub updated: usize,
    pub completed: usize,
    /// Unchanged records whose heartbeat was refreshed.
    pub touched: usize,
    /// Unchanged records left alone by the debounce.
    pub unchanged: usize,
    /// Events skipped after a per-record store failure.
    pub failed: usize,
    pub notify_failed: usize,
}

impl PassReport {
    #[must_use]
    pub const fn notifications(&self) -> usize {
        self.opened + self.updated + self.completed
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "feed={} opened={} updated={} completed={} touched={} unchanged={} failed={} notify_failed={}",
            self.feed_events,
            self.opened,
            self.updated,
            self.completed,
            self.touched,
            self.unchanged,
            self.failed,
            self.notify_failed
        )?;
        match &self.sweep {
            Some(SweepOutcome::Swept { deleted, .. }) => write!(f, " swept={deleted}"),
            Some(SweepOutcome::NotDue { .. }) => f.write_str(" swept=skipped"),
            None => f.write_str(" swept=failed"),
        }
    }
}

/// Why a pass was aborted.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("pass aborted: {0}")]
    Feed(#[from] FeedError),

    #[error("pass aborted: {0}")]
    Store(#[from] StoreError),
}

impl ReconcileError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Feed(FeedError::Decode(_)) => ErrorCode::FeedDecodeFailed,
            Self::Feed(_) => ErrorCode::FeedUnreachable,
            Self::Store(StoreError::Unavailable(_)) => ErrorCode::StoreUnavailable,
            Self::Store(_) => ErrorCode::StoreWriteFailed,
        }
    }
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// Run one full reconciliation pass.
///
/// # Errors
///
/// Returns [`ReconcileError::Feed`] if the feed cannot be fetched and
/// [`ReconcileError::Store`] if the store becomes unavailable or the active
/// set cannot be listed.
pub fn run_pass(ctx: &mut ReconcileContext<'_>) -> Result<PassReport, ReconcileError> {
    let mut report = PassReport::default();
    let now = ctx.clock.now_epoch();
    info!(now, "reconciliation pass started");

    report.sweep = match RetentionSweeper::from_config(ctx.config).run_if_due(ctx.store, ctx.clock)
    {
        Ok(outcome) => Some(outcome),
        Err(err) if err.is_systemic() => return Err(err.into()),
        Err(err) => {
            warn!(error = %err, "retention sweep failed; continuing with reconciliation");
            None
        }
    };

    let events = ctx.feed.fetch_events()?;
    report.feed_events = events.len();

    close_stale(ctx, &events, &mut report)?;
    reconcile_feed(ctx, &events, now, &mut report)?;

    info!(
        opened = report.opened,
        updated = report.updated,
        completed = report.completed,
        touched = report.touched,
        failed = report.failed,
        notify_failed = report.notify_failed,
        "reconciliation pass finished"
    );
    Ok(report)
}

/// Step A.
fn close_stale(
    ctx: &ReconcileContext<'_>,
    events: &[FeedEvent],
    report: &mut PassReport,
) -> Result<(), ReconcileError> {
    let mut by_id: HashMap<&str, &FeedEvent> = HashMap::with_capacity(events.len());
    for event in events {
        by_id.entry(event.id.as_str()).or_insert(event);
    }

    let active = scan_all(ctx.store, &ScanFilter::active(), ctx.config.scan_page_size)?;
    for mut record in active {
        let still_closed = by_id
            .get(record.event_id.as_str())
            .is_some_and(|event| event.is_full_closure);
        if still_closed {
            continue;
        }

        if let Err(err) = ctx
            .store
            .update_field(&record.event_id, FieldUpdate::IsActive(false))
        {
            absorb(err, &record.event_id, report)?;
            continue;
        }
        record.is_active = false;
        report.completed += 1;
        info!(
            event_id = %record.event_id,
            region = record.detected_polygon.as_deref().unwrap_or("-"),
            "closure completed"
        );
        let region = record.detected_polygon.clone();
        announce(ctx, NotificationKind::Completed, record, region, report);
    }
    Ok(())
}

/// Step B.
fn reconcile_feed(
    ctx: &mut ReconcileContext<'_>,
    events: &[FeedEvent],
    now: i64,
    report: &mut PassReport,
) -> Result<(), ReconcileError> {
    let debounce = DebounceController::from_config(ctx.config);
    for event in events.iter().filter(|event| event.is_full_closure) {
        if let Err(err) = reconcile_event(ctx, &debounce, event, now, report) {
            absorb(err, &event.id, report)?;
        }
    }
    Ok(())
}

fn reconcile_event(
    ctx: &mut ReconcileContext<'_>,
    debounce: &DebounceController,
    event: &FeedEvent,
    now: i64,
    report: &mut PassReport,
) -> Result<(), StoreError> {
    let Some(stored) = ctx.store.get_active(&event.id)? else {
        let region = ctx.regions.classify(event.latitude, event.longitude);
        let record = EventRecord::opened(event, now, region.clone());
        ctx.store.put(&record)?;
        report.opened += 1;
        info!(event_id = %event.id, region = %region, road = %event.roadway_name, "closure opened");
        announce(ctx, NotificationKind::Opened, record, Some(region), report);
        return Ok(());
    };

    if stored.content_changed(event) {
        let mut record = stored.updated_from(event, now);
        if record.detected_polygon.is_none() {
            record.detected_polygon = Some(ctx.regions.classify(record.latitude, record.longitude));
        }
        ctx.store.put(&record)?;
        report.updated += 1;
        info!(
            event_id = %event.id,
            region = record.detected_polygon.as_deref().unwrap_or("-"),
            last_updated = ?event.last_updated,
            "closure updated"
        );
        let region = record.detected_polygon.clone();
        announce(ctx, NotificationKind::Updated, record, region, report);
        return Ok(());
    }

    let last_touched = stored.last_touched.unwrap_or_else(|| {
        warn!(event_id = %event.id, "active record has no lastTouched; assuming it was just touched");
        now
    });
    let decision = debounce.evaluate(last_touched, now, &mut *ctx.rng);
    if decision.refresh {
        ctx.store
            .update_field(&event.id, FieldUpdate::LastTouched(now))?;
        report.touched += 1;
        debug!(
            event_id = %event.id,
            elapsed_minutes = decision.elapsed_minutes,
            jitter_minutes = decision.jitter_minutes,
            "heartbeat refreshed"
        );
    } else {
        report.unchanged += 1;
    }
    Ok(())
}

/// Per-event store failures are logged and counted; systemic ones abort.
fn absorb(err: StoreError, event_id: &str, report: &mut PassReport) -> Result<(), ReconcileError> {
    if err.is_systemic() {
        warn!(event_id, error = %err, "state store unavailable; aborting pass");
        return Err(err.into());
    }
    warn!(event_id, error = %err, "store write failed; skipping event this pass");
    report.failed += 1;
    Ok(())
}

/// The write has already landed, so a delivery failure is only counted.
fn announce(
    ctx: &ReconcileContext<'_>,
    kind: NotificationKind,
    record: EventRecord,
    region: Option<String>,
    report: &mut PassReport,
) {
    let notification = Notification::new(kind, record, region);
    if let Err(err) = ctx.notifier.notify(&notification) {
        warn!(
            kind = %kind,
            event_id = %notification.event.event_id,
            error = %err,
            "notification delivery failed"
        );
        report.notify_failed += 1;
    }
}
