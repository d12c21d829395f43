// PostgreSQL subscription store
// Uses sqlx for async database operations

use super::*;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::info;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS subscriptions (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    plan_id TEXT NOT NULL,
    status TEXT NOT NULL,
    amount DOUBLE PRECISION NOT NULL,
    currency TEXT NOT NULL,
    payment_id TEXT,
    order_id TEXT,
    auto_renew BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

// `created_at` and `id` are left alone on conflict.
const UPSERT_ACTIVE: &str = r#"
INSERT INTO subscriptions
    (id, user_id, plan_id, status, amount, currency, payment_id, order_id, auto_renew, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
ON CONFLICT (user_id) DO UPDATE SET
    plan_id = EXCLUDED.plan_id,
    status = EXCLUDED.status,
    amount = EXCLUDED.amount,
    currency = EXCLUDED.currency,
    payment_id = EXCLUDED.payment_id,
    order_id = EXCLUDED.order_id,
    auto_renew = EXCLUDED.auto_renew,
    updated_at = EXCLUDED.updated_at
RETURNING id, user_id, plan_id, status, amount, currency, payment_id, order_id, auto_renew, created_at, updated_at
"#;

const SELECT_BY_USER: &str = r#"
SELECT id, user_id, plan_id, status, amount, currency, payment_id, order_id, auto_renew, created_at, updated_at
FROM subscriptions
WHERE user_id = $1
"#;

/// PostgreSQL subscription store
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Connect and make sure the subscriptions table exists
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("PostgreSQL subscription store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    fn from_row(row: &PgRow) -> Result<Subscription, StorageError> {
        let status: String = row.try_get("status")?;
        Ok(Subscription {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_id: row.try_get("plan_id")?,
            status: SubscriptionStatus::parse(&status)?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            payment_id: row.try_get("payment_id")?,
            order_id: row.try_get("order_id")?,
            auto_renew: row.try_get("auto_renew")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn upsert_active(
        &self,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, StorageError> {
        let row = sqlx::query(UPSERT_ACTIVE)
            .bind(Uuid::new_v4())
            .bind(&update.user_id)
            .bind(&update.plan_id)
            .bind(SubscriptionStatus::Active.as_str())
            .bind(update.amount)
            .bind(&update.currency)
            .bind(&update.payment_id)
            .bind(&update.order_id)
            .bind(update.auto_renew)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Self::from_row(&row)
    }

    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<Subscription>, StorageError> {
        let row = sqlx::query(SELECT_BY_USER)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }
}
