//! Notification port and the sinks shipped with the crate.
//!
//! Human-readable formatting and delivery (chat webhooks and the like) live
//! behind [`Notifier`]; the engine only hands over typed notifications.

use std::cell::RefCell;
use std::io::Write;

use tracing::info;

use crate::model::{Notification, NotificationKind};

/// Errors raised by a notification sink.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("notification encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Sink for lifecycle notifications.
pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes each notification as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let event = &notification.event;
        info!(
            kind = %notification.kind,
            event_id = %event.event_id,
            region = notification.region.as_deref().unwrap_or("-"),
            road = %event.roadway_name,
            direction = %event.direction_of_travel,
            "closure {}",
            notification.kind
        );
        Ok(())
    }
}

/// Writes one JSON object per line to the wrapped writer.
#[derive(Debug)]
pub struct JsonLinesNotifier<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> JsonLinesNotifier<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> Notifier for JsonLinesNotifier<W> {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut out = self.out.borrow_mut();
        serde_json::to_writer(&mut *out, notification)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Delivers to every inner sink; reports the first failure after trying all.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl Notifier + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.notify(notification) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Keeps every notification in memory, optionally refusing chosen IDs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: RefCell<Vec<Notification>>,
    reject_ids: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every notification for `event_id`.
    pub fn reject(&self, event_id: &str) {
        self.reject_ids.borrow_mut().push(event_id.to_string());
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.borrow().clone()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.borrow_mut())
    }

    #[must_use]
    pub fn count(&self, kind: NotificationKind, event_id: &str) -> usize {
        self.seen
            .borrow()
            .iter()
            .filter(|n| n.kind == kind && n.event.event_id == event_id)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self
            .reject_ids
            .borrow()
            .iter()
            .any(|id| *id == notification.event.event_id)
        {
            return Err(NotifyError::Rejected(notification.event.event_id.clone()));
        }
        self.seen.borrow_mut().push(notification.clone());
        Ok(())
    }
}
