//! Feed port: the current list of upstream events, or a failure.
//!
//! Any [`FeedError`] aborts a pass before the engine mutates the store.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::model::FeedEvent;

/// Errors raised while fetching or decoding the feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Transport failure (DNS, connect, timeout, ...).
    #[error("feed unreachable: {0}")]
    Unreachable(String),

    /// The upstream answered with a non-success status.
    #[error("feed returned HTTP {status}")]
    Status { status: u16 },

    /// The payload was not a JSON array of events.
    #[error("feed payload could not be decoded: {0}")]
    Decode(String),
}

/// Source of the current upstream snapshot.
pub trait FeedSource {
    fn fetch_events(&self) -> Result<Vec<FeedEvent>, FeedError>;
}

/// Decode a raw feed body.
///
/// # Errors
///
/// Returns [`FeedError::Decode`] if the body is not a JSON array of events.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEvent>, FeedError> {
    serde_json::from_str(body).map_err(|err| FeedError::Decode(err.to_string()))
}

/// Reads a saved snapshot from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedSource for FileFeed {
    fn fetch_events(&self) -> Result<Vec<FeedEvent>, FeedError> {
        let body = std::fs::read_to_string(&self.path).map_err(|err| {
            FeedError::Unreachable(format!("read {}: {err}", self.path.display()))
        })?;
        parse_feed(&body)
    }
}

/// Settable in-process feed for tests and simulation.
#[derive(Debug)]
pub struct MemoryFeed {
    next: RefCell<Result<Vec<FeedEvent>, FeedError>>,
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryFeed {
    #[must_use]
    pub fn new(events: Vec<FeedEvent>) -> Self {
        Self {
            next: RefCell::new(Ok(events)),
        }
    }

    pub fn set_events(&self, events: Vec<FeedEvent>) {
        *self.next.borrow_mut() = Ok(events);
    }

    pub fn set_failure(&self, err: FeedError) {
        *self.next.borrow_mut() = Err(err);
    }
}

impl FeedSource for MemoryFeed {
    fn fetch_events(&self) -> Result<Vec<FeedEvent>, FeedError> {
        self.next.borrow().clone()
    }
}
