//! Shared application state handed to every handler

use std::sync::Arc;

use crate::config::AppConfig;
use crate::health::HealthMonitor;
use crate::storage::SubscriptionStore;

/// Cheaply cloneable handle to the long-lived services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub monitor: Arc<HealthMonitor>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        monitor: Arc<HealthMonitor>,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            config,
            monitor,
            subscriptions,
        }
    }
}
