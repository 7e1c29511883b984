//! Number acquisition and backorder reconciliation.
//!
//! [`AcquisitionEngine`] serves one request end to end: provider-fallback
//! search, immediate ordering, or backorder placement with the last
//! provider. [`Reconciler`] is the background half: it polls open
//! backorders, applies lifecycle transitions, and publishes delivered
//! numbers to inventory at most once.

pub mod acquire;
pub mod callback;
pub mod config;
pub mod error;
pub mod reconciler;

pub use acquire::{AcquireOutcome, AcquisitionEngine};
pub use callback::{LoggingCallback, RecordingCallback, StatusCallback};
pub use config::{EngineConfig, FulfillmentPolicy, ReconcilerConfig};
pub use error::{EngineError, Result};
pub use reconciler::{CycleStats, Reconciler};
