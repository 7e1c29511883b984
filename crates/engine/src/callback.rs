//! Outbound status notifications for requests.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::RequestId;
use domain::StatusUpdate;

/// Receives user-visible outcomes for a request.
///
/// Delivery is fire-and-forget: implementations swallow and log their own
/// transport problems, and reconciliation never fails because a note could
/// not be posted.
#[async_trait]
pub trait StatusCallback: Send + Sync {
    async fn notify(&self, request_id: RequestId, update: StatusUpdate);
}

/// Callback that only logs. The default wiring until a ticketing system is
/// attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCallback;

#[async_trait]
impl StatusCallback for LoggingCallback {
    async fn notify(&self, request_id: RequestId, update: StatusUpdate) {
        tracing::info!(%request_id, status = update.label(), "request status update");
    }
}

/// Recording callback for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingCallback {
    updates: Arc<RwLock<Vec<(RequestId, StatusUpdate)>>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far, in order.
    pub fn updates(&self) -> Vec<(RequestId, StatusUpdate)> {
        self.updates.read().unwrap().clone()
    }

    /// Number of notifications received.
    pub fn update_count(&self) -> usize {
        self.updates.read().unwrap().len()
    }

    /// Labels of the notifications received, in order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.updates
            .read()
            .unwrap()
            .iter()
            .map(|(_, update)| update.label())
            .collect()
    }
}

#[async_trait]
impl StatusCallback for RecordingCallback {
    async fn notify(&self, request_id: RequestId, update: StatusUpdate) {
        self.updates.write().unwrap().push((request_id, update));
    }
}
