//! Plivo carrier client, the primary number source.
//!
//! Search pages through the account's purchasable numbers; orders are one
//! POST per number. Plivo takes no backorders, so those operations always
//! reject.

use std::time::Duration;

use async_trait::async_trait;
use common::{AreaCode, BackorderId, Country, OrderId, PhoneNumber};
use serde::Deserialize;

use crate::client::{BackorderPoll, OrderConfirmation, ProviderClient, SearchResult};
use crate::error::{ProviderError, RejectKind, classify_response};

const NAME: &str = "plivo";
const PAGE_SIZE: usize = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the Plivo REST API.
#[derive(Debug, Clone)]
pub struct PlivoConfig {
    pub auth_id: String,
    pub auth_token: String,
    pub base_url: String,
}

/// Client for Plivo number search and purchase.
pub struct PlivoClient {
    config: PlivoConfig,
    client: reqwest::Client,
}

impl PlivoClient {
    pub fn new(config: PlivoConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/v1/Account/{}/{}",
            self.config.base_url, self.config.auth_id, path
        )
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    number: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseResponse {
    #[serde(default)]
    api_id: Option<String>,
}

fn collect_candidates(objects: Vec<SearchObject>, into: &mut Vec<PhoneNumber>) {
    for object in objects {
        match PhoneNumber::parse(&object.number) {
            Ok(number) => into.push(number),
            Err(err) => {
                tracing::warn!(number = %object.number, error = %err, "skipping unparseable search candidate");
            }
        }
    }
}

#[async_trait]
impl ProviderClient for PlivoClient {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn search(
        &self,
        country: Country,
        area_code: &AreaCode,
        quantity: i32,
    ) -> Result<SearchResult, ProviderError> {
        let wanted = quantity.max(0) as usize;
        let mut candidates: Vec<PhoneNumber> = Vec::new();
        let mut offset = 0usize;

        while candidates.len() < wanted {
            let limit = PAGE_SIZE.min(wanted - candidates.len());
            let resp = self
                .client
                .get(self.account_url("PhoneNumber/"))
                .basic_auth(&self.config.auth_id, Some(&self.config.auth_token))
                .query(&[
                    ("country_iso", country.as_iso()),
                    ("type", "local"),
                    ("pattern", area_code.as_str()),
                ])
                .query(&[("limit", limit), ("offset", offset)])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| ProviderError::from_transport(NAME, e))?;
            let resp = classify_response(NAME, RejectKind::Search, resp).await?;
            let page: SearchPage = resp
                .json()
                .await
                .map_err(|e| ProviderError::from_transport(NAME, e))?;

            let batch = page.objects.len();
            collect_candidates(page.objects, &mut candidates);
            if batch < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        candidates.truncate(wanted);
        Ok(SearchResult { candidates })
    }

    async fn order(&self, numbers: &[PhoneNumber]) -> Result<OrderConfirmation, ProviderError> {
        let mut order_ref: Option<String> = None;
        for number in numbers {
            // Plivo addresses numbers as 1XXXXXXXXXX, without the plus.
            let url = self.account_url(&format!("PhoneNumber/1{}/", number.national()));
            let resp = self
                .client
                .post(url)
                .basic_auth(&self.config.auth_id, Some(&self.config.auth_token))
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| ProviderError::from_transport(NAME, e))?;
            let resp = classify_response(NAME, RejectKind::Order, resp).await?;
            let purchase: PurchaseResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::from_transport(NAME, e))?;
            if order_ref.is_none() {
                order_ref = purchase.api_id;
            }
        }

        // Purchases are per number, so the first API id stands in for the
        // whole logical order.
        let order_id = order_ref.map(OrderId::new).unwrap_or_else(OrderId::generate);
        Ok(OrderConfirmation {
            order_id,
            numbers: numbers.to_vec(),
        })
    }

    async fn place_backorder(
        &self,
        _country: Country,
        _area_code: &AreaCode,
        _quantity: i32,
        _reference: &str,
    ) -> Result<BackorderId, ProviderError> {
        Err(ProviderError::BackorderRejected {
            provider: NAME.to_string(),
            reason: "backorders not supported".to_string(),
        })
    }

    async fn check_status(
        &self,
        _backorder_id: &BackorderId,
    ) -> Result<BackorderPoll, ProviderError> {
        Err(ProviderError::BackorderRejected {
            provider: NAME.to_string(),
            reason: "backorders not supported".to_string(),
        })
    }
}
