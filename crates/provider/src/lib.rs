//! Carrier provider clients.
//!
//! Every carrier integration implements [`ProviderClient`]: search for
//! purchasable numbers, place immediate orders, place backorders, and poll
//! backorder status. Transport failures never escape raw; they are folded
//! into the [`ProviderError`] taxonomy so callers can tell transient
//! carrier trouble from permanent refusals.

pub mod client;
pub mod error;
pub mod inteliquent;
pub mod mock;
pub mod plivo;

pub use client::{BackorderPoll, OrderConfirmation, ProviderClient, SearchResult};
pub use error::ProviderError;
pub use inteliquent::{InteliquentClient, InteliquentConfig};
pub use mock::MockProvider;
pub use plivo::{PlivoClient, PlivoConfig};
