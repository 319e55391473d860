//! roadwatch-core library.
//!
//! Reconciles periodic snapshots of an upstream road-closure feed against
//! persisted state so each real-world closure yields exactly one
//! opened / updated / completed notification stream.
//!
//! # Conventions
//!
//! - **Errors**: one `thiserror` enum per port; `anyhow::Result` at the
//!   configuration boundary.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Time and randomness**: always injected ([`clock::Clock`], `rand::RngCore`),
//!   never read from ambient globals inside the engine.

pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod feed;
pub mod geojson;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod region;
pub mod store;
pub mod sweep;

pub use model::{EventRecord, FeedEvent, Notification, NotificationKind};
pub use reconcile::{PassReport, ReconcileContext, ReconcileError, run_pass};
pub use region::{OTHER_REGION, RegionRegistry};
