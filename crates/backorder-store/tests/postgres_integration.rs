//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and are
//! serialized because each one truncates the tables.

use std::sync::Arc;

use backorder_store::{
    BackorderStore, BackorderUpdate, LockError, LockManager, PostgresBackorderStore,
    PostgresLockManager, PublishSubject, StoreError, backorder_lock_key,
};
use chrono::{Duration, Utc};
use common::{AreaCode, BackorderId, Country, OrderId, PhoneNumber, RequestId};
use domain::{Backorder, BackorderStatus, OrderRecord};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_acquisition_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/002_create_locks_table.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE backorders, orders, publish_records, locks")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

fn create_test_backorder(id: &str) -> Backorder {
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

fn test_numbers(count: usize) -> Vec<PhoneNumber> {
    (0..count)
        .map(|i| PhoneNumber::parse(&format!("+1934555{:04}", 100 + i)).unwrap())
        .collect()
}

#[tokio::test]
#[serial]
async fn insert_and_load_backorder() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let backorder = create_test_backorder("789555001");

    store.insert_backorder(&backorder).await.unwrap();

    let loaded = store
        .get_backorder(&backorder.backorder_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.backorder_id, backorder.backorder_id);
    assert_eq!(loaded.request_id, backorder.request_id);
    assert_eq!(loaded.provider, "inteliquent");
    assert_eq!(loaded.area_code, backorder.area_code);
    assert_eq!(loaded.country, Country::Us);
    assert_eq!(loaded.quantity_requested, 5);
    assert_eq!(loaded.status, BackorderStatus::Pending);
    assert_eq!(loaded.attempt_count, 0);
    assert!(loaded.numbers_completed.is_empty());
    assert!(loaded.last_checked_at.is_none());

    let by_request = store
        .find_backorder_for_request(backorder.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_request.backorder_id, backorder.backorder_id);
}

#[tokio::test]
#[serial]
async fn duplicate_request_provider_pair_rejected() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let first = create_test_backorder("b1");
    store.insert_backorder(&first).await.unwrap();

    let mut second = create_test_backorder("b2");
    second.request_id = first.request_id;
    let result = store.insert_backorder(&second).await;

    match result {
        Err(StoreError::DuplicateBackorder {
            request_id,
            provider,
        }) => {
            assert_eq!(request_id, first.request_id);
            assert_eq!(provider, "inteliquent");
        }
        other => panic!("expected DuplicateBackorder, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn check_cycle_records_outcome() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let backorder = create_test_backorder("b1");
    store.insert_backorder(&backorder).await.unwrap();
    let id = backorder.backorder_id.clone();

    let checking = store
        .transition(&id, BackorderStatus::Pending, BackorderUpdate::begin_check())
        .await
        .unwrap();
    assert_eq!(checking.status, BackorderStatus::Checking);
    assert_eq!(checking.attempt_count, 0);

    let completed = store
        .transition(
            &id,
            BackorderStatus::Checking,
            BackorderUpdate::outcome_completed(test_numbers(5), Utc::now()),
        )
        .await
        .unwrap();
    assert_eq!(completed.status, BackorderStatus::CompletedUnpublished);
    assert_eq!(completed.attempt_count, 1);
    assert_eq!(completed.numbers_completed, test_numbers(5));
    assert!(completed.last_checked_at.is_some());

    let published = store
        .transition(
            &id,
            BackorderStatus::CompletedUnpublished,
            BackorderUpdate::published(),
        )
        .await
        .unwrap();
    assert_eq!(published.status, BackorderStatus::Completed);
    // Publication is not a carrier poll
    assert_eq!(published.attempt_count, 1);
    assert_eq!(published.numbers_completed, test_numbers(5));
}

#[tokio::test]
#[serial]
async fn empty_poll_returns_to_pending() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let backorder = create_test_backorder("b1");
    store.insert_backorder(&backorder).await.unwrap();
    let id = backorder.backorder_id.clone();

    store
        .transition(&id, BackorderStatus::Pending, BackorderUpdate::begin_check())
        .await
        .unwrap();
    let pending = store
        .transition(
            &id,
            BackorderStatus::Checking,
            BackorderUpdate::outcome_pending(Utc::now()),
        )
        .await
        .unwrap();

    assert_eq!(pending.status, BackorderStatus::Pending);
    assert_eq!(pending.attempt_count, 1);
    assert!(pending.numbers_completed.is_empty());
}

#[tokio::test]
#[serial]
async fn stale_transition_reports_actual_status() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let backorder = create_test_backorder("b1");
    store.insert_backorder(&backorder).await.unwrap();
    let id = backorder.backorder_id.clone();

    store
        .transition(&id, BackorderStatus::Pending, BackorderUpdate::begin_check())
        .await
        .unwrap();

    // A second worker still assuming pending must lose the race.
    let result = store
        .transition(&id, BackorderStatus::Pending, BackorderUpdate::begin_check())
        .await;
    match result {
        Err(StoreError::StaleTransition {
            expected, actual, ..
        }) => {
            assert_eq!(expected, BackorderStatus::Pending);
            assert_eq!(actual, BackorderStatus::Checking);
        }
        other => panic!("expected StaleTransition, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn transition_rejects_invalid_target() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let backorder = create_test_backorder("b1");
    store.insert_backorder(&backorder).await.unwrap();

    // pending -> completed skips the publication gate
    let result = store
        .transition(
            &backorder.backorder_id,
            BackorderStatus::Pending,
            BackorderUpdate::published(),
        )
        .await;
    assert!(matches!(result, Err(StoreError::Domain(_))));

    // Row untouched
    let loaded = store
        .get_backorder(&backorder.backorder_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.status, BackorderStatus::Pending);
}

#[tokio::test]
#[serial]
async fn completion_without_numbers_rejected() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let backorder = create_test_backorder("b1");
    store.insert_backorder(&backorder).await.unwrap();
    let id = backorder.backorder_id.clone();

    store
        .transition(&id, BackorderStatus::Pending, BackorderUpdate::begin_check())
        .await
        .unwrap();
    let result = store
        .transition(
            &id,
            BackorderStatus::Checking,
            BackorderUpdate::outcome_completed(Vec::new(), Utc::now()),
        )
        .await;
    assert!(matches!(result, Err(StoreError::Domain(_))));
}

#[tokio::test]
#[serial]
async fn transition_on_missing_backorder() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let id = BackorderId::new("no-such-backorder");

    assert!(store.get_backorder(&id).await.unwrap().is_none());
    let result = store
        .transition(&id, BackorderStatus::Pending, BackorderUpdate::begin_check())
        .await;
    assert!(matches!(result, Err(StoreError::BackorderNotFound(_))));
}

#[tokio::test]
#[serial]
async fn list_open_backorders_skips_terminal_rows() {
    let store = PostgresBackorderStore::new(get_test_pool().await);

    let pending = create_test_backorder("b-pending");
    store.insert_backorder(&pending).await.unwrap();

    let abandoned = create_test_backorder("b-abandoned");
    store.insert_backorder(&abandoned).await.unwrap();
    store
        .transition(
            &abandoned.backorder_id,
            BackorderStatus::Pending,
            BackorderUpdate::abandon(Utc::now()),
        )
        .await
        .unwrap();

    let unpublished = create_test_backorder("b-unpublished");
    store.insert_backorder(&unpublished).await.unwrap();
    store
        .transition(
            &unpublished.backorder_id,
            BackorderStatus::Pending,
            BackorderUpdate::begin_check(),
        )
        .await
        .unwrap();
    store
        .transition(
            &unpublished.backorder_id,
            BackorderStatus::Checking,
            BackorderUpdate::outcome_completed(test_numbers(5), Utc::now()),
        )
        .await
        .unwrap();

    let open = store.list_open_backorders(10).await.unwrap();
    let ids: Vec<_> = open.iter().map(|b| b.backorder_id.as_str()).collect();
    assert_eq!(ids, vec!["b-pending", "b-unpublished"]);

    let limited = store.list_open_backorders(1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
#[serial]
async fn order_insert_and_lookup() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let order = OrderRecord::new(
        OrderId::new("ord-1"),
        RequestId::new(),
        "plivo",
        test_numbers(3),
    );

    store.insert_order(&order).await.unwrap();

    let found = store
        .find_order_for_request(order.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.order_id, order.order_id);
    assert_eq!(found.provider, "plivo");
    assert_eq!(found.numbers, test_numbers(3));

    let duplicate = OrderRecord::new(
        OrderId::new("ord-2"),
        order.request_id,
        "plivo",
        test_numbers(1),
    );
    assert!(matches!(
        store.insert_order(&duplicate).await,
        Err(StoreError::DuplicateOrder(_))
    ));
}

#[tokio::test]
#[serial]
async fn publish_record_is_insert_if_absent() {
    let store = PostgresBackorderStore::new(get_test_pool().await);
    let subject = PublishSubject::Backorder(BackorderId::new("b1"));

    assert!(!store.has_publish_record(&subject).await.unwrap());
    assert!(store.record_publish(&subject, "200 OK").await.unwrap());
    assert!(!store.record_publish(&subject, "200 OK").await.unwrap());
    assert!(store.has_publish_record(&subject).await.unwrap());

    // Order and backorder subjects do not collide
    let order_subject = PublishSubject::Order(OrderId::new("b1"));
    assert!(!store.has_publish_record(&order_subject).await.unwrap());
    assert!(store.record_publish(&order_subject, "200 OK").await.unwrap());
}

#[tokio::test]
#[serial]
async fn lock_acquire_contention_release() {
    let locks = PostgresLockManager::new(get_test_pool().await);
    let key = backorder_lock_key(&BackorderId::new("b1"));

    let handle = locks.acquire(&key, Duration::seconds(30)).await.unwrap();
    let contended = locks.acquire(&key, Duration::seconds(30)).await;
    assert!(matches!(contended, Err(LockError::AlreadyHeld { .. })));

    locks.release(handle).await.unwrap();
    let reacquired = locks.acquire(&key, Duration::seconds(30)).await.unwrap();
    locks.release(reacquired).await.unwrap();
}

#[tokio::test]
#[serial]
async fn lapsed_lease_is_stolen() {
    let locks = PostgresLockManager::new(get_test_pool().await);
    let key = backorder_lock_key(&BackorderId::new("b1"));

    // Zero-length lease lapses immediately
    let mut stale = locks.acquire(&key, Duration::zero()).await.unwrap();
    let fresh = locks.acquire(&key, Duration::seconds(30)).await.unwrap();
    assert_ne!(stale.holder(), fresh.holder());

    // The displaced handle can no longer renew or release
    assert!(matches!(
        locks.renew(&mut stale, Duration::seconds(30)).await,
        Err(LockError::NotHeld { .. })
    ));
    assert!(matches!(
        locks.release(stale).await,
        Err(LockError::NotHeld { .. })
    ));

    // The new holder's lease survived the attempts
    assert!(matches!(
        locks.acquire(&key, Duration::seconds(30)).await,
        Err(LockError::AlreadyHeld { .. })
    ));
}

#[tokio::test]
#[serial]
async fn renew_extends_lease() {
    let locks = PostgresLockManager::new(get_test_pool().await);
    let key = backorder_lock_key(&BackorderId::new("b1"));

    let mut handle = locks.acquire(&key, Duration::seconds(5)).await.unwrap();
    let before = handle.expires_at();

    locks.renew(&mut handle, Duration::seconds(60)).await.unwrap();
    assert!(handle.expires_at() > before);

    locks.release(handle).await.unwrap();
}
