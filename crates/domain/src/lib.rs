//! Domain model for the number acquisition system.
//!
//! This crate provides the entities the rest of the workspace moves around:
//! - `NumberRequest`, the immutable inbound request
//! - `Backorder` and the `BackorderStatus` lifecycle state machine
//! - `OrderRecord` for immediately fulfilled orders
//! - `StatusUpdate`, the outbound callback payload

pub mod backorder;
pub mod callback;
pub mod error;
pub mod order;
pub mod request;
pub mod status;

pub use backorder::Backorder;
pub use callback::StatusUpdate;
pub use error::DomainError;
pub use order::OrderRecord;
pub use request::NumberRequest;
pub use status::BackorderStatus;
