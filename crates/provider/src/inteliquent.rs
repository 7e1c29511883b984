//! Inteliquent carrier client, the fallback number source and the only one
//! that takes backorders.
//!
//! Authentication is Basic over the private/secret key pair; the private
//! key additionally rides in every request body, which is how this carrier
//! wants it.

use std::time::Duration;

use async_trait::async_trait;
use common::{AreaCode, BackorderId, Country, OrderId, PhoneNumber};
use serde::Deserialize;
use serde_json::json;

use crate::client::{BackorderPoll, OrderConfirmation, ProviderClient, SearchResult};
use crate::error::{ProviderError, RejectKind, classify_response};

const NAME: &str = "inteliquent";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body-level status meaning the inventory search matched nothing. An empty
/// result, not an error.
const NO_INVENTORY_STATUS: &str = "430";

/// Connection settings for the Inteliquent services API.
#[derive(Debug, Clone)]
pub struct InteliquentConfig {
    pub private_key: String,
    pub secret_key: String,
    /// Trunk group new numbers are activated on.
    pub trunk_group: String,
    pub base_url: String,
}

/// Client for Inteliquent inventory search, orders, and backorders.
pub struct InteliquentClient {
    config: InteliquentConfig,
    client: reqwest::Client,
}

impl InteliquentClient {
    pub fn new(config: InteliquentConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        self.client
            .post(self.url(path))
            .basic_auth(&self.config.private_key, Some(&self.config.secret_key))
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, e))
    }
}

/// Pads an area code with `x` wildcards to the carrier's ten-digit mask.
fn tn_mask(area_code: &AreaCode) -> String {
    let digits = area_code.as_str();
    format!("{}{}", digits, "x".repeat(10 - digits.len()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryResponse {
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    tn_result: Vec<TnResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TnResult {
    telephone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    #[serde(default)]
    order_id: Option<i64>,
    #[serde(default)]
    tn_order_id: Option<i64>,
}

impl OrderResponse {
    /// The carrier puts its reference under either key depending on the
    /// endpoint.
    fn id(&self) -> Option<i64> {
        self.order_id.or(self.tn_order_id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusResponse {
    #[serde(default)]
    order_detail_response: OrderDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderDetail {
    #[serde(default)]
    order_status: String,
    #[serde(default)]
    tn_list: TnList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TnList {
    #[serde(default)]
    tn_item: Vec<TnItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TnItem {
    #[serde(default)]
    tn: String,
    #[serde(default)]
    tn_status: String,
}

fn parse_candidates(results: Vec<TnResult>) -> Vec<PhoneNumber> {
    let mut candidates = Vec::with_capacity(results.len());
    for result in results {
        match PhoneNumber::parse(&result.telephone_number) {
            Ok(number) => candidates.push(number),
            Err(err) => {
                tracing::warn!(tn = %result.telephone_number, error = %err, "skipping unparseable search candidate");
            }
        }
    }
    candidates
}

fn poll_outcome(response: OrderStatusResponse) -> BackorderPoll {
    let detail = response.order_detail_response;
    match detail.order_status.as_str() {
        "Closed" => {
            let mut numbers = Vec::new();
            for item in detail.tn_list.tn_item {
                if item.tn_status != "Complete" {
                    continue;
                }
                match PhoneNumber::parse(&item.tn) {
                    Ok(number) => numbers.push(number),
                    Err(err) => {
                        tracing::warn!(tn = %item.tn, error = %err, "skipping unparseable delivered number");
                    }
                }
            }
            if numbers.is_empty() {
                // Closed but nothing marked Complete yet; keep polling.
                tracing::warn!("order closed with no completed numbers, treating as pending");
                return BackorderPoll::Pending;
            }
            BackorderPoll::Completed { numbers }
        }
        "Cancelled" | "Rejected" => BackorderPoll::Failed {
            reason: detail.order_status,
        },
        _ => BackorderPoll::Pending,
    }
}

#[async_trait]
impl ProviderClient for InteliquentClient {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn search(
        &self,
        _country: Country,
        area_code: &AreaCode,
        quantity: i32,
    ) -> Result<SearchResult, ProviderError> {
        let payload = json!({
            "privateKey": self.config.private_key,
            "tnMask": tn_mask(area_code),
            "quantity": quantity,
            "reserve": "Y",
            "pageSort": {
                "property": "state",
                "direction": "asc",
                "page": 1,
                "size": quantity,
            },
        });

        let resp = self.post("/tnInventory", &payload).await?;
        let resp = classify_response(NAME, RejectKind::Search, resp).await?;
        let body: InventoryResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        if body.status_code.as_deref() == Some(NO_INVENTORY_STATUS) {
            return Ok(SearchResult::default());
        }

        let mut candidates = parse_candidates(body.tn_result);
        candidates.truncate(quantity.max(0) as usize);
        Ok(SearchResult { candidates })
    }

    async fn order(&self, numbers: &[PhoneNumber]) -> Result<OrderConfirmation, ProviderError> {
        let items: Vec<serde_json::Value> = numbers
            .iter()
            .map(|n| {
                json!({
                    "tn": n.national(),
                    "trunkGroup": self.config.trunk_group,
                })
            })
            .collect();
        let payload = json!({
            "privateKey": self.config.private_key,
            "tnOrder": { "tnList": { "tnItem": items } },
        });

        let resp = self.post("/tnOrder", &payload).await?;
        let resp = classify_response(NAME, RejectKind::Order, resp).await?;
        let confirmed: OrderResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        let order_id = confirmed
            .id()
            .map(|id| OrderId::new(id.to_string()))
            .unwrap_or_else(OrderId::generate);
        Ok(OrderConfirmation {
            order_id,
            numbers: numbers.to_vec(),
        })
    }

    async fn place_backorder(
        &self,
        _country: Country,
        area_code: &AreaCode,
        quantity: i32,
        reference: &str,
    ) -> Result<BackorderId, ProviderError> {
        let payload = json!({
            "privateKey": self.config.private_key,
            "npa": area_code.as_str(),
            "trunkGroup": self.config.trunk_group,
            "activate": "Y",
            "quantity": quantity,
            "customerOrderReference": reference,
        });

        let resp = self.post("/tnRequest", &payload).await?;
        let resp = classify_response(NAME, RejectKind::Backorder, resp).await?;
        let placed: OrderResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, e))?;

        let id = placed.id().ok_or_else(|| ProviderError::Unavailable {
            provider: NAME.to_string(),
            reason: "backorder response carried no order id".to_string(),
        })?;
        Ok(BackorderId::new(id.to_string()))
    }

    async fn check_status(
        &self,
        backorder_id: &BackorderId,
    ) -> Result<BackorderPoll, ProviderError> {
        let resp = self
            .client
            .get(self.url(&format!("/orders/{backorder_id}")))
            .basic_auth(&self.config.private_key, Some(&self.config.secret_key))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, e))?;
        let resp = classify_response(NAME, RejectKind::Backorder, resp).await?;
        let body: OrderStatusResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, e))?;
        Ok(poll_outcome(body))
    }
}
