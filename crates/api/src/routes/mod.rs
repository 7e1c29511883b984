//! HTTP route handlers.

pub mod backorders;
pub mod health;
pub mod metrics;
pub mod requests;
