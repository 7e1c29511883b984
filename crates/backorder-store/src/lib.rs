//! Durable state for the acquisition engine: backorders, immediate orders,
//! publish records, and lease-based coordination locks.
//!
//! Two implementations of each trait are provided: PostgreSQL for
//! deployments and an in-memory variant with the same observable semantics
//! for tests and local runs.

pub mod error;
pub mod lock;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{LockError, Result, StoreError};
pub use lock::{LockHandle, LockManager, backorder_lock_key, request_lock_key};
pub use memory::{InMemoryBackorderStore, InMemoryLockManager};
pub use postgres::{PostgresBackorderStore, PostgresLockManager};
pub use store::{BackorderStore, BackorderUpdate, PublishSubject};
