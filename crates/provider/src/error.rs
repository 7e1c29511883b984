//! Provider error taxonomy and HTTP response classification.

use thiserror::Error;

/// Failures surfaced by carrier provider calls.
///
/// `Unavailable` and `RateLimited` are transient and worth retrying on a
/// later cycle; the rejection variants are carrier refusals and must not be
/// retried automatically.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The carrier could not be reached or answered uselessly (timeout,
    /// connection failure, 5xx, undecodable body).
    #[error("provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The carrier throttled us (HTTP 429).
    #[error("provider {provider} rate limited")]
    RateLimited { provider: String },

    /// The carrier refused an immediate order.
    #[error("order rejected by {provider}: {reason}")]
    OrderRejected { provider: String, reason: String },

    /// The carrier refused a backorder request or does not take them.
    #[error("backorder rejected by {provider}: {reason}")]
    BackorderRejected { provider: String, reason: String },
}

impl ProviderError {
    /// Returns true for failures the next scheduler cycle may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable { .. } | ProviderError::RateLimited { .. }
        )
    }

    /// Folds a transport-level failure (send, timeout, body decode) into
    /// the unavailable class.
    pub(crate) fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        ProviderError::Unavailable {
            provider: provider.to_string(),
            reason: err.to_string(),
        }
    }
}

/// What a carrier-side 4xx means for the call being made.
///
/// Search has no permanent-rejection class, so its 4xx responses stay in
/// the unavailable bucket.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RejectKind {
    Search,
    Order,
    Backorder,
}

/// Maps a non-success HTTP status onto the error taxonomy, consuming the
/// response body for the rejection reason. Success responses pass through
/// untouched.
pub(crate) async fn classify_response(
    provider: &str,
    kind: RejectKind,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            provider: provider.to_string(),
        });
    }
    if status.is_server_error() {
        return Err(ProviderError::Unavailable {
            provider: provider.to_string(),
            reason: format!("HTTP {status}"),
        });
    }

    let body = resp.text().await.unwrap_or_default();
    let reason = format!("HTTP {status}: {body}");
    let provider = provider.to_string();
    Err(match kind {
        RejectKind::Search => ProviderError::Unavailable { provider, reason },
        RejectKind::Order => ProviderError::OrderRejected { provider, reason },
        RejectKind::Backorder => ProviderError::BackorderRejected { provider, reason },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classes() {
        let unavailable = ProviderError::Unavailable {
            provider: "plivo".to_string(),
            reason: "timeout".to_string(),
        };
        let limited = ProviderError::RateLimited {
            provider: "plivo".to_string(),
        };
        let rejected = ProviderError::OrderRejected {
            provider: "plivo".to_string(),
            reason: "HTTP 400: bad pattern".to_string(),
        };
        assert!(unavailable.is_transient());
        assert!(limited.is_transient());
        assert!(!rejected.is_transient());
    }
}
