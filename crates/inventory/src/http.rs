//! HTTP publisher with bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::PublishError;
use crate::publisher::{InventoryPublisher, PublishAck};
use crate::record::NumberRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and retry settings for the inventory endpoint.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Additional attempts after the first on transient failure.
    pub max_retries: u32,
    /// Initial backoff between attempts; doubles per retry.
    pub backoff: Duration,
}

/// Publishes batches over HTTP with Basic auth.
#[derive(Clone)]
pub struct HttpInventoryPublisher {
    config: InventoryConfig,
    client: reqwest::Client,
}

impl HttpInventoryPublisher {
    pub fn new(config: InventoryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, payload: &serde_json::Value) -> Result<PublishAck, PublishError> {
        let resp = self
            .client
            .post(&self.config.url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(PublishAck {
                status: status.to_string(),
            });
        }

        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Err(PublishError::Unavailable {
            reason: format!("HTTP {status}: {body}"),
        })
    }
}

#[async_trait]
impl InventoryPublisher for HttpInventoryPublisher {
    async fn publish(
        &self,
        records: &[NumberRecord],
        user_email: &str,
    ) -> Result<PublishAck, PublishError> {
        let payload = json!({
            "query": "add numbers to inventory",
            "raw_args": {
                "numbers": records,
                "user_email": user_email,
                "skip_number_testing": true,
                "skip_phone_number_profile_restrictions": true,
                "reason_skip_number_testing": "bulk import from carrier order",
            },
        });

        let mut delay = self.config.backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(&payload).await {
                Ok(ack) => return Ok(ack),
                Err(err) if err.is_transient() && attempt <= self.config.max_retries => {
                    tracing::warn!(attempt, error = %err, "inventory publish failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
