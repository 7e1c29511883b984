//! Publisher trait and acknowledgement type.

use async_trait::async_trait;

use crate::error::PublishError;
use crate::record::NumberRecord;

/// Acknowledgement from the inventory endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    /// HTTP status line of the accepting response, kept for the publish
    /// record.
    pub status: String,
}

/// Delivers number batches to the platform inventory.
///
/// Delivery here is at-least-once; callers consult their publish record
/// before calling and write it only after an ack, which makes the overall
/// flow at-most-once per subject.
#[async_trait]
pub trait InventoryPublisher: Send + Sync {
    /// Publishes one batch under the given requester identity.
    async fn publish(
        &self,
        records: &[NumberRecord],
        user_email: &str,
    ) -> Result<PublishAck, PublishError>;
}
