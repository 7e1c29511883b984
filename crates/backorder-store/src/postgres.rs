use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{AreaCode, BackorderId, Country, OrderId, PhoneNumber, RequestId};
use domain::{Backorder, BackorderStatus, OrderRecord};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    error::LockError,
    lock::{LockHandle, LockManager},
    store::{BackorderStore, BackorderUpdate, PublishSubject, validate_update},
};

/// PostgreSQL-backed backorder store implementation.
#[derive(Clone)]
pub struct PostgresBackorderStore {
    pool: PgPool,
}

impl PostgresBackorderStore {
    /// Creates a new PostgreSQL backorder store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_backorder(row: PgRow) -> Result<Backorder> {
        let numbers: Vec<String> = row.try_get("numbers_completed")?;
        let numbers_completed = numbers
            .iter()
            .map(|n| PhoneNumber::parse(n))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Backorder {
            backorder_id: BackorderId::new(row.try_get::<String, _>("backorder_id")?),
            request_id: RequestId::from_uuid(row.try_get::<Uuid, _>("request_id")?),
            provider: row.try_get("provider")?,
            area_code: AreaCode::parse(&row.try_get::<String, _>("area_code")?)?,
            country: row.try_get::<String, _>("country")?.parse::<Country>()?,
            quantity_requested: row.try_get("quantity_requested")?,
            status: row
                .try_get::<String, _>("status")?
                .parse::<BackorderStatus>()?,
            attempt_count: row.try_get("attempt_count")?,
            created_at: row.try_get("created_at")?,
            last_checked_at: row.try_get("last_checked_at")?,
            numbers_completed,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        let numbers: Vec<String> = row.try_get("numbers")?;
        let numbers = numbers
            .iter()
            .map(|n| PhoneNumber::parse(n))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(OrderRecord {
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            request_id: RequestId::from_uuid(row.try_get::<Uuid, _>("request_id")?),
            provider: row.try_get("provider")?,
            numbers,
            placed_at: row.try_get("placed_at")?,
        })
    }

    async fn current_status(&self, backorder_id: &BackorderId) -> Result<Option<BackorderStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM backorders WHERE backorder_id = $1")
                .bind(backorder_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match status {
            Some(s) => Ok(Some(s.parse::<BackorderStatus>()?)),
            None => Ok(None),
        }
    }
}

const BACKORDER_COLUMNS: &str = "backorder_id, request_id, provider, area_code, country, \
     quantity_requested, status, attempt_count, numbers_completed, created_at, last_checked_at";

#[async_trait]
impl BackorderStore for PostgresBackorderStore {
    async fn insert_backorder(&self, backorder: &Backorder) -> Result<()> {
        let numbers: Vec<String> = backorder
            .numbers_completed
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO backorders (backorder_id, request_id, provider, area_code, country,
                quantity_requested, status, attempt_count, numbers_completed, created_at, last_checked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(backorder.backorder_id.as_str())
        .bind(backorder.request_id.as_uuid())
        .bind(&backorder.provider)
        .bind(backorder.area_code.as_str())
        .bind(backorder.country.as_iso())
        .bind(backorder.quantity_requested)
        .bind(backorder.status.as_str())
        .bind(backorder.attempt_count)
        .bind(&numbers)
        .bind(backorder.created_at)
        .bind(backorder.last_checked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // One row per (request, provider); re-inserting an existing
            // backorder_id is the same logical duplicate.
            if let sqlx::Error::Database(ref db_err) = e
                && matches!(
                    db_err.constraint(),
                    Some("backorders_request_id_provider_key") | Some("backorders_pkey")
                )
            {
                return StoreError::DuplicateBackorder {
                    request_id: backorder.request_id,
                    provider: backorder.provider.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_backorder(&self, backorder_id: &BackorderId) -> Result<Option<Backorder>> {
        let row = sqlx::query(&format!(
            "SELECT {BACKORDER_COLUMNS} FROM backorders WHERE backorder_id = $1"
        ))
        .bind(backorder_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_backorder).transpose()
    }

    async fn find_backorder_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Backorder>> {
        let row = sqlx::query(&format!(
            "SELECT {BACKORDER_COLUMNS} FROM backorders WHERE request_id = $1 \
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_backorder).transpose()
    }

    async fn list_open_backorders(&self, limit: i64) -> Result<Vec<Backorder>> {
        let open: Vec<String> = [
            BackorderStatus::Pending,
            BackorderStatus::Checking,
            BackorderStatus::CompletedUnpublished,
        ]
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();

        let rows = sqlx::query(&format!(
            "SELECT {BACKORDER_COLUMNS} FROM backorders WHERE status = ANY($1) \
             ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(&open)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_backorder).collect()
    }

    async fn transition(
        &self,
        backorder_id: &BackorderId,
        expected: BackorderStatus,
        update: BackorderUpdate,
    ) -> Result<Backorder> {
        validate_update(expected, &update)?;

        let numbers: Option<Vec<String>> = update
            .numbers_completed
            .as_ref()
            .map(|ns| ns.iter().map(|n| n.as_str().to_string()).collect());
        let increment: i32 = if update.increment_attempts { 1 } else { 0 };

        let row = sqlx::query(&format!(
            r#"
            UPDATE backorders
            SET status = $3,
                attempt_count = attempt_count + $4,
                last_checked_at = COALESCE($5, last_checked_at),
                numbers_completed = COALESCE($6, numbers_completed)
            WHERE backorder_id = $1 AND status = $2
            RETURNING {BACKORDER_COLUMNS}
            "#
        ))
        .bind(backorder_id.as_str())
        .bind(expected.as_str())
        .bind(update.to.as_str())
        .bind(increment)
        .bind(update.checked_at)
        .bind(numbers)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_backorder(row),
            None => match self.current_status(backorder_id).await? {
                Some(actual) => Err(StoreError::StaleTransition {
                    backorder_id: backorder_id.clone(),
                    expected,
                    actual,
                }),
                None => Err(StoreError::BackorderNotFound(backorder_id.clone())),
            },
        }
    }

    async fn insert_order(&self, order: &OrderRecord) -> Result<()> {
        let numbers: Vec<String> = order
            .numbers
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, request_id, provider, numbers, placed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.request_id.as_uuid())
        .bind(&order.provider)
        .bind(&numbers)
        .bind(order.placed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && matches!(
                    db_err.constraint(),
                    Some("orders_request_id_key") | Some("orders_pkey")
                )
            {
                return StoreError::DuplicateOrder(order.request_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn find_order_for_request(&self, request_id: RequestId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            "SELECT order_id, request_id, provider, numbers, placed_at \
             FROM orders WHERE request_id = $1",
        )
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn record_publish(
        &self,
        subject: &PublishSubject,
        response_status: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO publish_records (subject, published_at, response_status)
            VALUES ($1, now(), $2)
            ON CONFLICT (subject) DO NOTHING
            "#,
        )
        .bind(subject.key())
        .bind(response_status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn has_publish_record(&self, subject: &PublishSubject) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM publish_records WHERE subject = $1)")
                .bind(subject.key())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

/// PostgreSQL-backed lock manager.
///
/// Acquire is a single insert-or-steal-expired statement, so the database
/// clock arbitrates every lease. Release and renew are holder-checked.
#[derive(Clone)]
pub struct PostgresLockManager {
    pool: PgPool,
}

impl PostgresLockManager {
    /// Creates a new PostgreSQL lock manager.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockManager for PostgresLockManager {
    async fn acquire(&self, key: &str, lease: Duration) -> std::result::Result<LockHandle, LockError> {
        let holder = Uuid::new_v4();

        let row = sqlx::query(
            r#"
            INSERT INTO locks (key, holder, expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE
                SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at
                WHERE locks.expires_at <= now()
            RETURNING expires_at
            "#,
        )
        .bind(key)
        .bind(holder)
        .bind(lease.num_milliseconds() as f64 / 1000.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
                Ok(LockHandle::new(key.to_string(), holder, expires_at))
            }
            None => Err(LockError::AlreadyHeld {
                key: key.to_string(),
            }),
        }
    }

    async fn renew(
        &self,
        handle: &mut LockHandle,
        lease: Duration,
    ) -> std::result::Result<(), LockError> {
        let row = sqlx::query(
            r#"
            UPDATE locks SET expires_at = now() + make_interval(secs => $3)
            WHERE key = $1 AND holder = $2
            RETURNING expires_at
            "#,
        )
        .bind(handle.key())
        .bind(handle.holder())
        .bind(lease.num_milliseconds() as f64 / 1000.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                handle.set_expires_at(row.try_get("expires_at")?);
                Ok(())
            }
            None => Err(LockError::NotHeld {
                key: handle.key().to_string(),
            }),
        }
    }

    async fn release(&self, handle: LockHandle) -> std::result::Result<(), LockError> {
        let result = sqlx::query("DELETE FROM locks WHERE key = $1 AND holder = $2")
            .bind(handle.key())
            .bind(handle.holder())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LockError::NotHeld {
                key: handle.key().to_string(),
            });
        }

        Ok(())
    }
}
