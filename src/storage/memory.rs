// In-memory subscription store
// Uses HashMap with Mutex for thread-safe access

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory subscription store keyed by user id
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn upsert_active(
        &self,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, StorageError> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .map_err(|e| StorageError::ConnectionError(format!("Lock poisoned: {}", e)))?;

        let subscription = Subscription::activate(subscriptions.get(&update.user_id), update);
        subscriptions.insert(subscription.user_id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<Subscription>, StorageError> {
        let subscriptions = self
            .subscriptions
            .lock()
            .map_err(|e| StorageError::ConnectionError(format!("Lock poisoned: {}", e)))?;

        Ok(subscriptions.get(user_id).cloned())
    }
}
