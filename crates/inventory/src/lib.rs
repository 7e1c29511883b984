//! Inventory publication.
//!
//! Once numbers are provisioned at a carrier they must be made known to the
//! platform inventory exactly once. This crate carries the publisher trait,
//! the HTTP implementation with bounded retry, and the per-number record
//! shape the inventory endpoint expects. At-most-once bookkeeping (the
//! publish record) is the caller's job; this crate only delivers batches.

pub mod error;
pub mod http;
pub mod memory;
pub mod publisher;
pub mod record;

pub use error::PublishError;
pub use http::{HttpInventoryPublisher, InventoryConfig};
pub use memory::{InMemoryPublisher, PublishedBatch};
pub use publisher::{InventoryPublisher, PublishAck};
pub use record::{InventoryIdentity, NumberRecord, is_canadian};
