//! Recording in-memory publisher for tests.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::PublishError;
use crate::publisher::{InventoryPublisher, PublishAck};
use crate::record::NumberRecord;

/// One accepted batch as the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedBatch {
    pub records: Vec<NumberRecord>,
    pub user_email: String,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    batches: Vec<PublishedBatch>,
    fail_on_publish: bool,
    reject_on_publish: bool,
}

/// In-memory publisher that records accepted batches.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new recording publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures publishes to fail with a transient error.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Configures publishes to be rejected permanently.
    pub fn set_reject_on_publish(&self, reject: bool) {
        self.state.write().unwrap().reject_on_publish = reject;
    }

    /// Returns the batches accepted so far.
    pub fn batches(&self) -> Vec<PublishedBatch> {
        self.state.read().unwrap().batches.clone()
    }

    /// Number of accepted publish calls.
    pub fn publish_count(&self) -> usize {
        self.state.read().unwrap().batches.len()
    }

    /// All published numbers in E.164, in publish order.
    pub fn published_numbers(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .batches
            .iter()
            .flat_map(|batch| batch.records.iter().map(|r| r.number.clone()))
            .collect()
    }
}

#[async_trait]
impl InventoryPublisher for InMemoryPublisher {
    async fn publish(
        &self,
        records: &[NumberRecord],
        user_email: &str,
    ) -> Result<PublishAck, PublishError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_publish {
            return Err(PublishError::Unavailable {
                reason: "scripted publish failure".to_string(),
            });
        }
        if state.reject_on_publish {
            return Err(PublishError::Rejected {
                status: 422,
                body: "scripted publish rejection".to_string(),
            });
        }

        state.batches.push(PublishedBatch {
            records: records.to_vec(),
            user_email: user_email.to_string(),
        });
        Ok(PublishAck {
            status: "200 OK".to_string(),
        })
    }
}
