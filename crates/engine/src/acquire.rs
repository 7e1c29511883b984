//! Provider-fallback acquisition of telephone numbers.

use std::sync::Arc;

use backorder_store::{BackorderStore, LockManager, PublishSubject, request_lock_key};
use common::PhoneNumber;
use domain::{Backorder, NumberRequest, OrderRecord};
use inventory::{InventoryPublisher, NumberRecord};
use provider::{ProviderClient, SearchResult};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Durable outcome of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Numbers were purchased immediately.
    Fulfilled {
        order: OrderRecord,
        /// Whether a publication record exists for the order yet.
        published: bool,
    },
    /// No provider could fill the request now; the last one promised
    /// future delivery.
    BackorderPlaced { backorder: Backorder },
}

/// Drives one request through search, fallback, ordering, and backorder
/// placement.
///
/// Providers are consulted in priority order. The first one whose search
/// satisfies the fulfillment policy gets the order; when none does, the
/// last provider places a backorder for the full quantity. Requests are
/// serialized by a `request/{id}` lease and their outcomes are recorded,
/// so at-least-once delivery of the same request never double-orders.
pub struct AcquisitionEngine<S, L, P>
where
    S: BackorderStore,
    L: LockManager,
    P: InventoryPublisher,
{
    store: S,
    locks: L,
    publisher: P,
    providers: Vec<Arc<dyn ProviderClient>>,
    config: EngineConfig,
}

impl<S, L, P> AcquisitionEngine<S, L, P>
where
    S: BackorderStore,
    L: LockManager,
    P: InventoryPublisher,
{
    /// Creates an engine over the given providers, in priority order.
    pub fn new(
        store: S,
        locks: L,
        publisher: P,
        providers: Vec<Arc<dyn ProviderClient>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            locks,
            publisher,
            providers,
            config,
        }
    }

    /// Acquires numbers for a request.
    ///
    /// Returns the recorded outcome when the request was already served.
    /// Fails with [`EngineError::RequestInFlight`] while another worker
    /// holds the request lease.
    #[tracing::instrument(
        skip(self, request),
        fields(
            request_id = %request.request_id,
            area_code = %request.area_code,
            quantity = request.quantity,
        )
    )]
    pub async fn acquire(&self, request: &NumberRequest) -> Result<AcquireOutcome> {
        metrics::counter!("acquisitions_total").increment(1);
        let start = std::time::Instant::now();

        // 1. Fast path: a redelivered request already has a durable outcome.
        if let Some(outcome) = self.recorded_outcome(request).await? {
            tracing::info!("redelivered request, returning recorded outcome");
            return Ok(outcome);
        }

        // 2. One worker per request at a time.
        let key = request_lock_key(request.request_id);
        let lock = match self.locks.acquire(&key, self.config.request_lease).await {
            Ok(handle) => handle,
            Err(err) if err.is_contention() => {
                return Err(EngineError::RequestInFlight(request.request_id));
            }
            Err(err) => return Err(err.into()),
        };

        // 3. Decide under the lease.
        let result = self.acquire_locked(request).await;

        if let Err(err) = self.locks.release(lock).await {
            tracing::warn!(error = %err, "failed to release request lease");
        }

        metrics::histogram!("acquisition_duration_seconds").record(start.elapsed().as_secs_f64());
        result
    }

    async fn acquire_locked(&self, request: &NumberRequest) -> Result<AcquireOutcome> {
        // A worker that finished between the fast path and the lease grant
        // has already recorded the outcome.
        if let Some(outcome) = self.recorded_outcome(request).await? {
            return Ok(outcome);
        }

        if self.providers.is_empty() {
            return Err(EngineError::NoProviderAvailable(
                "no providers configured".to_string(),
            ));
        }

        let mut transport_failures = Vec::new();

        for (index, provider) in self.providers.iter().enumerate() {
            let is_last = index + 1 == self.providers.len();

            let result = match provider
                .search(request.country, &request.area_code, request.quantity)
                .await
            {
                Ok(result) => result,
                Err(err) if err.is_transient() => {
                    tracing::warn!(provider = provider.name(), error = %err, "search failed");
                    transport_failures.push(format!("{}: {err}", provider.name()));
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if self.config.fulfillment.satisfied_by(&result, request.quantity) {
                return self.fulfill(request, provider.as_ref(), result).await;
            }

            tracing::info!(
                provider = provider.name(),
                available = result.available_count(),
                "provider cannot fill request"
            );

            // Backorders go to the last provider; it must be reachable.
            if is_last {
                return self.place_backorder(request, provider.as_ref()).await;
            }
        }

        metrics::counter!("acquisitions_no_provider").increment(1);
        Err(EngineError::NoProviderAvailable(
            transport_failures.join("; "),
        ))
    }

    /// Orders the first `quantity` candidates, preserving provider order,
    /// then publishes them best effort.
    async fn fulfill(
        &self,
        request: &NumberRequest,
        provider: &dyn ProviderClient,
        result: SearchResult,
    ) -> Result<AcquireOutcome> {
        let picked: Vec<PhoneNumber> = result
            .candidates
            .into_iter()
            .take(request.quantity.max(0) as usize)
            .collect();

        // A failed order call may still have purchased on the carrier side,
        // so it surfaces instead of falling through to another provider.
        let confirmation = provider.order(&picked).await?;

        let order = OrderRecord::new(
            confirmation.order_id,
            request.request_id,
            provider.name(),
            confirmation.numbers,
        );
        self.store.insert_order(&order).await?;

        metrics::counter!("acquisitions_fulfilled").increment(1);
        tracing::info!(
            provider = provider.name(),
            order_id = %order.order_id,
            count = order.numbers.len(),
            "request fulfilled"
        );

        let published = self.publish_order(&order, &request.requested_by).await;
        Ok(AcquireOutcome::Fulfilled { order, published })
    }

    /// Publishes an immediately fulfilled order, best effort.
    ///
    /// A failure leaves the order without a publication record and the
    /// acquisition still succeeds. Returns true once a record exists.
    async fn publish_order(&self, order: &OrderRecord, user_email: &str) -> bool {
        let subject = PublishSubject::Order(order.order_id.clone());

        match self.store.has_publish_record(&subject).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %err, "publish record lookup failed");
                return false;
            }
        }

        let records = NumberRecord::for_numbers(&order.numbers, &self.config.identity);
        match self.publisher.publish(&records, user_email).await {
            Ok(ack) => match self.store.record_publish(&subject, &ack.status).await {
                Ok(_) => {
                    metrics::counter!("inventory_publishes_total").increment(1);
                    true
                }
                Err(err) => {
                    tracing::error!(
                        order_id = %order.order_id,
                        error = %err,
                        "publication succeeded but its record could not be written"
                    );
                    false
                }
            },
            Err(err) => {
                metrics::counter!("inventory_publish_failures_total").increment(1);
                tracing::warn!(order_id = %order.order_id, error = %err, "order publication failed");
                false
            }
        }
    }

    /// Places a backorder for the full quantity with the given provider.
    async fn place_backorder(
        &self,
        request: &NumberRequest,
        provider: &dyn ProviderClient,
    ) -> Result<AcquireOutcome> {
        let reference = format!("request_{}", request.request_id);
        let backorder_id = match provider
            .place_backorder(
                request.country,
                &request.area_code,
                request.quantity,
                &reference,
            )
            .await
        {
            Ok(id) => id,
            Err(err) if err.is_transient() => {
                metrics::counter!("acquisitions_no_provider").increment(1);
                return Err(EngineError::NoProviderAvailable(format!(
                    "{}: {err}",
                    provider.name()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let backorder = Backorder::new(
            backorder_id,
            request.request_id,
            provider.name(),
            request.area_code.clone(),
            request.country,
            request.quantity,
        )?;
        self.store.insert_backorder(&backorder).await?;

        metrics::counter!("acquisitions_backordered").increment(1);
        tracing::info!(
            provider = provider.name(),
            backorder_id = %backorder.backorder_id,
            "backorder placed"
        );
        Ok(AcquireOutcome::BackorderPlaced { backorder })
    }

    /// Looks up the durable outcome recorded for a request, if any.
    async fn recorded_outcome(&self, request: &NumberRequest) -> Result<Option<AcquireOutcome>> {
        if let Some(order) = self.store.find_order_for_request(request.request_id).await? {
            let subject = PublishSubject::Order(order.order_id.clone());
            let published = self.store.has_publish_record(&subject).await?;
            return Ok(Some(AcquireOutcome::Fulfilled { order, published }));
        }

        if let Some(backorder) = self
            .store
            .find_backorder_for_request(request.request_id)
            .await?
        {
            return Ok(Some(AcquireOutcome::BackorderPlaced { backorder }));
        }

        Ok(None)
    }
}
