//! Background reconciliation of open backorders.

use std::sync::Arc;

use backorder_store::{
    BackorderStore, BackorderUpdate, LockHandle, LockManager, PublishSubject, StoreError,
    backorder_lock_key,
};
use chrono::Utc;
use common::BackorderId;
use domain::{Backorder, BackorderStatus, StatusUpdate};
use futures_util::StreamExt;
use inventory::{InventoryPublisher, NumberRecord};
use provider::{BackorderPoll, ProviderClient};
use tokio::sync::watch;

use crate::callback::StatusCallback;
use crate::config::ReconcilerConfig;
use crate::error::{EngineError, Result};

/// Counts of what one reconciliation cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Open backorders picked up by the scan.
    pub scanned: usize,
    /// Skipped because another worker held the lease.
    pub skipped: usize,
    /// Polled with no carrier-side change.
    pub still_pending: usize,
    /// Observed completing this cycle.
    pub completed: usize,
    /// Publications recorded this cycle.
    pub published: usize,
    /// Failed or cancelled by the carrier.
    pub failed: usize,
    /// Abandoned without a carrier poll.
    pub abandoned: usize,
    /// Left untouched by an unexpected error.
    pub errors: usize,
}

impl CycleStats {
    fn merge(&mut self, other: CycleStats) {
        self.scanned += other.scanned;
        self.skipped += other.skipped;
        self.still_pending += other.still_pending;
        self.completed += other.completed;
        self.published += other.published;
        self.failed += other.failed;
        self.abandoned += other.abandoned;
        self.errors += other.errors;
    }
}

/// Polls open backorders against their carriers, applies lifecycle
/// transitions, and publishes delivered numbers at most once.
///
/// Safe to run on several machines at once: each backorder is processed
/// under a `backorder/{id}` lease, every transition is guarded by the
/// status it expects to replace, and publication is keyed by an
/// insert-if-absent record.
pub struct Reconciler<S, L, P, C>
where
    S: BackorderStore,
    L: LockManager,
    P: InventoryPublisher,
    C: StatusCallback,
{
    store: S,
    locks: L,
    publisher: P,
    providers: Vec<Arc<dyn ProviderClient>>,
    callback: C,
    config: ReconcilerConfig,
}

impl<S, L, P, C> Reconciler<S, L, P, C>
where
    S: BackorderStore,
    L: LockManager,
    P: InventoryPublisher,
    C: StatusCallback,
{
    /// Creates a reconciler over the given providers.
    ///
    /// Backorders reference their provider by name; a row whose provider is
    /// missing here is counted as an error each cycle until configuration
    /// is fixed or the row ages out.
    pub fn new(
        store: S,
        locks: L,
        publisher: P,
        providers: Vec<Arc<dyn ProviderClient>>,
        callback: C,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            locks,
            publisher,
            providers,
            callback,
            config,
        }
    }

    /// Runs a cycle immediately, then one per `check_interval`, until the
    /// shutdown flag flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.check_interval.as_secs(),
            "reconciler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("reconciler stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Scans open backorders and reconciles them concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleStats {
        metrics::counter!("reconcile_cycles_total").increment(1);
        let start = std::time::Instant::now();

        let backorders = match self.store.list_open_backorders(self.config.scan_limit).await {
            Ok(backorders) => backorders,
            Err(err) => {
                tracing::error!(error = %err, "backorder scan failed");
                return CycleStats {
                    errors: 1,
                    ..CycleStats::default()
                };
            }
        };

        let mut stats = CycleStats {
            scanned: backorders.len(),
            ..CycleStats::default()
        };
        metrics::gauge!("open_backorders").set(stats.scanned as f64);

        let outcomes: Vec<CycleStats> = futures_util::stream::iter(backorders)
            .map(|backorder| self.reconcile_one(backorder))
            .buffer_unordered(self.config.max_concurrent_checks.max(1))
            .collect()
            .await;
        for outcome in outcomes {
            stats.merge(outcome);
        }

        metrics::histogram!("reconcile_cycle_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            scanned = stats.scanned,
            completed = stats.completed,
            published = stats.published,
            still_pending = stats.still_pending,
            failed = stats.failed,
            abandoned = stats.abandoned,
            skipped = stats.skipped,
            errors = stats.errors,
            "reconciliation cycle finished"
        );
        stats
    }

    /// Takes the backorder's lease and reconciles it; lease contention is a
    /// skip, not an error.
    #[tracing::instrument(
        skip(self, backorder),
        fields(
            backorder_id = %backorder.backorder_id,
            provider = %backorder.provider,
        )
    )]
    async fn reconcile_one(&self, backorder: Backorder) -> CycleStats {
        let mut stats = CycleStats::default();
        let key = backorder_lock_key(&backorder.backorder_id);

        let mut lock = match self.locks.acquire(&key, self.config.lock_lease).await {
            Ok(handle) => handle,
            Err(err) if err.is_contention() => {
                metrics::counter!("lock_contention_total").increment(1);
                tracing::debug!("lease held elsewhere, skipping");
                stats.skipped += 1;
                return stats;
            }
            Err(err) => {
                tracing::error!(error = %err, "lease acquisition failed");
                stats.errors += 1;
                return stats;
            }
        };

        match self.check_backorder(&backorder.backorder_id, &mut lock).await {
            Ok(outcome) => stats.merge(outcome),
            Err(err) => {
                metrics::counter!("reconcile_errors_total").increment(1);
                tracing::warn!(error = %err, "backorder reconciliation failed");
                stats.errors += 1;
            }
        }

        if let Err(err) = self.locks.release(lock).await {
            tracing::warn!(error = %err, "lease release failed");
        }

        stats
    }

    /// Reconciles one backorder while its lease is held.
    async fn check_backorder(
        &self,
        backorder_id: &BackorderId,
        lock: &mut LockHandle,
    ) -> Result<CycleStats> {
        let mut stats = CycleStats::default();

        // Re-read under the lease; the scan snapshot may be stale.
        let backorder = self
            .store
            .get_backorder(backorder_id)
            .await?
            .ok_or_else(|| EngineError::Store(StoreError::BackorderNotFound(backorder_id.clone())))?;

        match backorder.status {
            // Completion is already recorded; only publication is owed.
            BackorderStatus::CompletedUnpublished => {
                self.publish_completed(backorder, &mut stats).await?;
                return Ok(stats);
            }
            BackorderStatus::Pending | BackorderStatus::Checking => {}
            // A terminal row slid into the scan window; nothing to do.
            BackorderStatus::Completed | BackorderStatus::Failed | BackorderStatus::Abandoned => {
                return Ok(stats);
            }
        }

        // Abandonment is decided before the carrier is contacted.
        let now = Utc::now();
        if backorder.should_abandon(now, self.config.max_check_attempts, self.config.abandon_after)
        {
            let abandoned = self
                .store
                .transition(backorder_id, backorder.status, BackorderUpdate::abandon(now))
                .await?;
            metrics::counter!("backorders_abandoned_total").increment(1);
            tracing::warn!(
                attempts = abandoned.attempt_count,
                age_days = abandoned.age(now).num_days(),
                "backorder abandoned"
            );
            self.callback
                .notify(
                    abandoned.request_id,
                    StatusUpdate::Failed {
                        reason: format!(
                            "backorder abandoned after {} checks over {} days",
                            abandoned.attempt_count,
                            abandoned.age(now).num_days()
                        ),
                    },
                )
                .await;
            stats.abandoned += 1;
            return Ok(stats);
        }

        let provider = self
            .provider_named(&backorder.provider)
            .ok_or_else(|| EngineError::UnknownProvider(backorder.provider.clone()))?;

        // Claim the row for this cycle. A row left in `checking` by a
        // lapsed worker is claimed the same way.
        self.store
            .transition(backorder_id, backorder.status, BackorderUpdate::begin_check())
            .await?;

        metrics::counter!("backorder_checks_total").increment(1);
        let poll = match provider.check_status(backorder_id).await {
            Ok(poll) => poll,
            Err(err) if err.is_transient() => {
                // The poll consumed an attempt even though the carrier
                // never answered.
                self.store
                    .transition(
                        backorder_id,
                        BackorderStatus::Checking,
                        BackorderUpdate::outcome_pending(Utc::now()),
                    )
                    .await?;
                tracing::warn!(error = %err, "status poll failed");
                stats.still_pending += 1;
                return Ok(stats);
            }
            Err(err) => {
                // The carrier refuses to answer for this order at all.
                let failed = self
                    .store
                    .transition(
                        backorder_id,
                        BackorderStatus::Checking,
                        BackorderUpdate::outcome_failed(Utc::now()),
                    )
                    .await?;
                metrics::counter!("backorders_failed_total").increment(1);
                tracing::warn!(error = %err, "backorder failed");
                self.callback
                    .notify(
                        failed.request_id,
                        StatusUpdate::Failed {
                            reason: err.to_string(),
                        },
                    )
                    .await;
                stats.failed += 1;
                return Ok(stats);
            }
        };

        match poll {
            BackorderPoll::Pending => {
                let pending = self
                    .store
                    .transition(
                        backorder_id,
                        BackorderStatus::Checking,
                        BackorderUpdate::outcome_pending(Utc::now()),
                    )
                    .await?;
                tracing::debug!(attempts = pending.attempt_count, "backorder still pending");
                self.callback
                    .notify(
                        pending.request_id,
                        StatusUpdate::BackorderPending {
                            backorder_id: pending.backorder_id.clone(),
                        },
                    )
                    .await;
                stats.still_pending += 1;
            }
            BackorderPoll::Failed { reason } => {
                let failed = self
                    .store
                    .transition(
                        backorder_id,
                        BackorderStatus::Checking,
                        BackorderUpdate::outcome_failed(Utc::now()),
                    )
                    .await?;
                metrics::counter!("backorders_failed_total").increment(1);
                tracing::warn!(reason = %reason, "carrier failed the backorder");
                self.callback
                    .notify(failed.request_id, StatusUpdate::Failed { reason })
                    .await;
                stats.failed += 1;
            }
            BackorderPoll::Completed { numbers } => {
                let completed = self
                    .store
                    .transition(
                        backorder_id,
                        BackorderStatus::Checking,
                        BackorderUpdate::outcome_completed(numbers, Utc::now()),
                    )
                    .await?;
                metrics::counter!("backorders_completed_total").increment(1);
                tracing::info!(
                    count = completed.numbers_completed.len(),
                    attempts = completed.attempt_count,
                    "backorder completed"
                );
                stats.completed += 1;

                // The poll may have eaten into the lease; renew before the
                // publish leg. Losing it here leaves the row
                // completed_unpublished for the next cycle.
                if let Err(err) = self.locks.renew(lock, self.config.lock_lease).await {
                    tracing::warn!(error = %err, "lease lost before publication");
                    return Ok(stats);
                }

                self.publish_completed(completed, &mut stats).await?;
            }
        }

        Ok(stats)
    }

    /// Publishes a completed backorder's numbers and marks the row terminal.
    ///
    /// A transient publication failure leaves the row
    /// `completed_unpublished`, so the next cycle retries publication
    /// without another carrier poll. A permanent rejection completes the
    /// row with no publication record; the missing record is the alerting
    /// signal for manual repair.
    async fn publish_completed(&self, backorder: Backorder, stats: &mut CycleStats) -> Result<()> {
        let subject = PublishSubject::Backorder(backorder.backorder_id.clone());

        if !self.store.has_publish_record(&subject).await? {
            let records =
                NumberRecord::for_numbers(&backorder.numbers_completed, &self.config.identity);
            match self
                .publisher
                .publish(&records, &self.config.publish_user_email)
                .await
            {
                Ok(ack) => {
                    self.store.record_publish(&subject, &ack.status).await?;
                    metrics::counter!("inventory_publishes_total").increment(1);
                    stats.published += 1;
                }
                Err(err) if err.is_transient() => {
                    metrics::counter!("inventory_publish_failures_total").increment(1);
                    tracing::warn!(
                        backorder_id = %backorder.backorder_id,
                        error = %err,
                        "publication failed, retrying next cycle"
                    );
                    return Ok(());
                }
                Err(err) => {
                    metrics::counter!("inventory_publish_rejections_total").increment(1);
                    tracing::error!(
                        backorder_id = %backorder.backorder_id,
                        error = %err,
                        "publication rejected, completing without a record"
                    );
                }
            }
        }

        let completed = self
            .store
            .transition(
                &backorder.backorder_id,
                BackorderStatus::CompletedUnpublished,
                BackorderUpdate::published(),
            )
            .await?;
        tracing::info!(
            backorder_id = %completed.backorder_id,
            count = completed.numbers_completed.len(),
            "backorder numbers delivered"
        );
        self.callback
            .notify(
                completed.request_id,
                StatusUpdate::BackorderCompleted {
                    numbers: completed.numbers_completed.clone(),
                },
            )
            .await;
        Ok(())
    }

    fn provider_named(&self, name: &str) -> Option<&Arc<dyn ProviderClient>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backorder_store::{InMemoryBackorderStore, InMemoryLockManager};
    use common::{AreaCode, Country, PhoneNumber, RequestId};
    use inventory::{InMemoryPublisher, InventoryIdentity};
    use provider::MockProvider;

    use crate::callback::RecordingCallback;

    fn identity() -> InventoryIdentity {
        InventoryIdentity {
            carrier_id: "95201903171584".to_string(),
            account_id: 12345,
            sub_account_id: 67890,
            app_id: "app_123456".to_string(),
        }
    }

    fn numbers(count: usize) -> Vec<PhoneNumber> {
        (0..count)
            .map(|i| PhoneNumber::parse(&format!("+1934555{:04}", 100 + i)).unwrap())
            .collect()
    }

    fn backorder(id: &str) -> Backorder {
        Backorder::new(
            BackorderId::new(id),
            RequestId::new(),
            "inteliquent",
            AreaCode::parse("934").unwrap(),
            Country::Us,
            5,
        )
        .unwrap()
    }

    fn setup_with_config(
        config: ReconcilerConfig,
    ) -> (
        Reconciler<InMemoryBackorderStore, InMemoryLockManager, InMemoryPublisher, RecordingCallback>,
        InMemoryBackorderStore,
        InMemoryLockManager,
        InMemoryPublisher,
        MockProvider,
        RecordingCallback,
    ) {
        let store = InMemoryBackorderStore::new();
        let locks = InMemoryLockManager::new();
        let publisher = InMemoryPublisher::new();
        let provider = MockProvider::new("inteliquent");
        let callback = RecordingCallback::new();

        let reconciler = Reconciler::new(
            store.clone(),
            locks.clone(),
            publisher.clone(),
            vec![Arc::new(provider.clone())],
            callback.clone(),
            config,
        );

        (reconciler, store, locks, publisher, provider, callback)
    }

    fn setup() -> (
        Reconciler<InMemoryBackorderStore, InMemoryLockManager, InMemoryPublisher, RecordingCallback>,
        InMemoryBackorderStore,
        InMemoryLockManager,
        InMemoryPublisher,
        MockProvider,
        RecordingCallback,
    ) {
        setup_with_config(ReconcilerConfig::new(identity()))
    }

    #[tokio::test]
    async fn test_completes_and_publishes_pending_backorder() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();
        provider.set_poll_result(
            row.backorder_id.clone(),
            BackorderPoll::Completed { numbers: numbers(5) },
        );

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.errors, 0);

        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Completed);
        assert_eq!(updated.attempt_count, 1);
        assert_eq!(updated.numbers_completed, numbers(5));
        assert!(updated.last_checked_at.is_some());

        assert!(
            store
                .has_publish_record(&PublishSubject::Backorder(row.backorder_id))
                .await
                .unwrap()
        );
        assert_eq!(publisher.publish_count(), 1);
        assert_eq!(publisher.batches()[0].user_email, "admin@example.com");
        assert_eq!(publisher.published_numbers().len(), 5);
        assert_eq!(callback.labels(), vec!["backorder_completed"]);
        assert_eq!(callback.updates()[0].0, row.request_id);
    }

    #[tokio::test]
    async fn test_terminal_row_is_not_rescanned() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();
        provider.set_poll_result(
            row.backorder_id.clone(),
            BackorderPoll::Completed { numbers: numbers(5) },
        );

        reconciler.run_cycle().await;
        let second = reconciler.run_cycle().await;

        assert_eq!(second.scanned, 0);
        assert_eq!(provider.check_call_count(), 1);
        assert_eq!(publisher.publish_count(), 1);
        assert_eq!(callback.update_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_poll_consumes_attempt() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.still_pending, 1);
        assert_eq!(provider.check_call_count(), 1);

        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Pending);
        assert_eq!(updated.attempt_count, 1);
        assert!(updated.last_checked_at.is_some());
        assert!(updated.numbers_completed.is_empty());

        assert_eq!(publisher.publish_count(), 0);
        assert_eq!(callback.labels(), vec!["backorder_pending"]);
    }

    #[tokio::test]
    async fn test_carrier_failure_is_terminal() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();
        provider.set_poll_result(
            row.backorder_id.clone(),
            BackorderPoll::Failed {
                reason: "cancelled by carrier".to_string(),
            },
        );

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.failed, 1);
        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Failed);
        assert_eq!(updated.attempt_count, 1);

        assert_eq!(publisher.publish_count(), 0);
        assert_eq!(callback.labels(), vec!["failed"]);
        let (_, update) = &callback.updates()[0];
        assert!(matches!(
            update,
            StatusUpdate::Failed { reason } if reason == "cancelled by carrier"
        ));
    }

    #[tokio::test]
    async fn test_transient_poll_failure_leaves_row_pending() {
        let (reconciler, store, _, _, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();
        provider.set_fail_on_check(true);

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.still_pending, 1);
        assert_eq!(stats.errors, 0);

        // The attempt is spent even though the carrier never answered, and
        // no notification goes out for a poll that said nothing.
        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Pending);
        assert_eq!(updated.attempt_count, 1);
        assert_eq!(callback.update_count(), 0);
    }

    #[tokio::test]
    async fn test_abandons_old_backorder_without_polling() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let mut row = backorder("789555001");
        row.created_at = Utc::now() - chrono::Duration::days(200);
        store.insert_backorder(&row).await.unwrap();

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.abandoned, 1);
        assert_eq!(provider.check_call_count(), 0);

        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Abandoned);
        assert_eq!(updated.attempt_count, 0);

        assert_eq!(publisher.publish_count(), 0);
        assert_eq!(callback.labels(), vec!["failed"]);
        let (_, update) = &callback.updates()[0];
        assert!(matches!(
            update,
            StatusUpdate::Failed { reason } if reason.contains("abandoned")
        ));
    }

    #[tokio::test]
    async fn test_abandons_at_attempt_ceiling() {
        let mut config = ReconcilerConfig::new(identity());
        config.max_check_attempts = 3;
        let (reconciler, store, _, _, provider, _) = setup_with_config(config);

        let mut row = backorder("789555001");
        row.attempt_count = 3;
        store.insert_backorder(&row).await.unwrap();

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.abandoned, 1);
        assert_eq!(provider.check_call_count(), 0);
        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_held_lease_skips_row() {
        let (reconciler, store, locks, _, provider, _) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();

        let held = locks
            .acquire(
                &backorder_lock_key(&row.backorder_id),
                chrono::Duration::seconds(60),
            )
            .await
            .unwrap();

        let stats = reconciler.run_cycle().await;
        assert_eq!(stats.skipped, 1);
        assert_eq!(provider.check_call_count(), 0);

        let untouched = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, BackorderStatus::Pending);
        assert_eq!(untouched.attempt_count, 0);

        locks.release(held).await.unwrap();
        let stats = reconciler.run_cycle().await;
        assert_eq!(stats.still_pending, 1);
    }

    #[tokio::test]
    async fn test_publish_outage_defers_publication() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();
        provider.set_poll_result(
            row.backorder_id.clone(),
            BackorderPoll::Completed { numbers: numbers(5) },
        );
        publisher.set_fail_on_publish(true);

        let first = reconciler.run_cycle().await;
        assert_eq!(first.completed, 1);
        assert_eq!(first.published, 0);

        // Completion is durable but unpublished; no completion notice yet.
        let parked = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(parked.status, BackorderStatus::CompletedUnpublished);
        assert_eq!(parked.numbers_completed, numbers(5));
        assert!(
            !store
                .has_publish_record(&PublishSubject::Backorder(row.backorder_id.clone()))
                .await
                .unwrap()
        );
        assert_eq!(callback.update_count(), 0);

        // The next cycle retries publication without another carrier poll.
        publisher.set_fail_on_publish(false);
        let second = reconciler.run_cycle().await;
        assert_eq!(second.scanned, 1);
        assert_eq!(second.published, 1);
        assert_eq!(second.completed, 0);
        assert_eq!(provider.check_call_count(), 1);

        let published = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(published.status, BackorderStatus::Completed);
        assert_eq!(publisher.publish_count(), 1);
        assert_eq!(callback.labels(), vec!["backorder_completed"]);
    }

    #[tokio::test]
    async fn test_publish_rejection_completes_without_record() {
        let (reconciler, store, _, publisher, provider, callback) = setup();
        let row = backorder("789555001");
        store.insert_backorder(&row).await.unwrap();
        provider.set_poll_result(
            row.backorder_id.clone(),
            BackorderPoll::Completed { numbers: numbers(5) },
        );
        publisher.set_reject_on_publish(true);

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.published, 0);

        // The row is terminal; the absent publish record flags the batch
        // for manual repair.
        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Completed);
        assert!(
            !store
                .has_publish_record(&PublishSubject::Backorder(row.backorder_id))
                .await
                .unwrap()
        );
        assert_eq!(publisher.publish_count(), 0);
        assert_eq!(callback.labels(), vec!["backorder_completed"]);
    }

    #[tokio::test]
    async fn test_existing_publish_record_is_not_republished() {
        let (reconciler, store, _, publisher, provider, callback) = setup();

        // A worker that crashed between recording the publication and the
        // final transition leaves exactly this state behind.
        let mut row = backorder("789555001");
        row.status = BackorderStatus::CompletedUnpublished;
        row.numbers_completed = numbers(5);
        row.attempt_count = 4;
        store.insert_backorder(&row).await.unwrap();
        store
            .record_publish(
                &PublishSubject::Backorder(row.backorder_id.clone()),
                "200 OK",
            )
            .await
            .unwrap();

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.published, 0);
        assert_eq!(provider.check_call_count(), 0);
        assert_eq!(publisher.publish_count(), 0);

        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Completed);
        assert_eq!(callback.labels(), vec!["backorder_completed"]);
    }

    #[tokio::test]
    async fn test_lapsed_checking_row_is_reclaimed() {
        let (reconciler, store, _, _, provider, _) = setup();

        // A worker whose lease lapsed mid-poll leaves the row in `checking`.
        let mut row = backorder("789555001");
        row.status = BackorderStatus::Checking;
        row.attempt_count = 2;
        store.insert_backorder(&row).await.unwrap();

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.still_pending, 1);
        assert_eq!(provider.check_call_count(), 1);
        let updated = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(updated.status, BackorderStatus::Pending);
        assert_eq!(updated.attempt_count, 3);
    }

    #[tokio::test]
    async fn test_unknown_provider_counts_error() {
        let (reconciler, store, _, _, provider, callback) = setup();
        let mut row = backorder("789555001");
        row.provider = "ghost".to_string();
        store.insert_backorder(&row).await.unwrap();

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.errors, 1);
        assert_eq!(provider.check_call_count(), 0);

        // The row is untouched and will be retried once the provider is
        // configured again.
        let untouched = store.get_backorder(&row.backorder_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, BackorderStatus::Pending);
        assert_eq!(untouched.attempt_count, 0);
        assert_eq!(callback.update_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_merges_outcomes_across_backorders() {
        let (reconciler, store, _, publisher, provider, callback) = setup();

        let completing = backorder("789555001");
        let pending = backorder("789555002");
        let failing = backorder("789555003");
        store.insert_backorder(&completing).await.unwrap();
        store.insert_backorder(&pending).await.unwrap();
        store.insert_backorder(&failing).await.unwrap();
        provider.set_poll_result(
            completing.backorder_id.clone(),
            BackorderPoll::Completed { numbers: numbers(5) },
        );
        provider.set_poll_result(
            failing.backorder_id.clone(),
            BackorderPoll::Failed {
                reason: "cancelled".to_string(),
            },
        );

        let stats = reconciler.run_cycle().await;

        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.still_pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.errors, 0);

        assert_eq!(provider.check_call_count(), 3);
        assert_eq!(publisher.publish_count(), 1);
        assert_eq!(callback.update_count(), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (reconciler, _, _, _, _, _) = setup();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { reconciler.run(shutdown_rx).await });
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("reconciler did not stop on shutdown")
            .unwrap();
    }
}
