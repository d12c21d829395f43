// Subscription storage abstraction
// Pluggable persistence for subscription state driven by payment webhooks

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, StorageKind};

/// Storage backend trait for subscription state
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create or refresh the active subscription for `update.user_id`
    async fn upsert_active(&self, update: SubscriptionUpdate)
        -> Result<Subscription, StorageError>;

    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<Subscription>, StorageError>;
}

/// Fields carried by a successful payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    pub user_id: String,
    pub plan_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub auto_renew: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StorageError> {
        match value {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            other => Err(StorageError::InvalidData(format!(
                "unknown subscription status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub amount: f64,
    pub currency: String,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Apply an update, keeping identity and creation time of `existing`
    pub fn activate(existing: Option<&Subscription>, update: SubscriptionUpdate) -> Self {
        let now = Utc::now();
        Self {
            id: existing.map(|s| s.id).unwrap_or_else(Uuid::new_v4),
            user_id: update.user_id,
            plan_id: update.plan_id,
            status: SubscriptionStatus::Active,
            amount: update.amount,
            currency: update.currency,
            payment_id: update.payment_id,
            order_id: update.order_id,
            auto_renew: update.auto_renew,
            created_at: existing.map(|s| s.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Factory function to create storage backend based on configuration
pub async fn create_subscription_store(
    config: &AppConfig,
) -> Result<Arc<dyn SubscriptionStore>, StorageError> {
    match (config.storage, config.database_url.as_deref()) {
        (StorageKind::Postgres, Some(url)) => {
            let store = postgres::PostgresSubscriptionStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        (StorageKind::Postgres, None) => Err(StorageError::ConnectionError(
            "database_url is required for postgres storage".to_string(),
        )),
        (StorageKind::Memory, _) => Ok(Arc::new(memory::MemorySubscriptionStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_column_text() {
        let status = SubscriptionStatus::parse(SubscriptionStatus::Active.as_str()).unwrap();
        assert_eq!(status, SubscriptionStatus::Active);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"ACTIVE\"");

        let err = SubscriptionStatus::parse("CANCELLED").unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
    }
}
