use async_trait::async_trait;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of a single probe run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl HealthCheckResult {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            error: None,
            details: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: Some(latency_ms),
            error: Some(message.into()),
            details: None,
        }
    }

    /// The probe itself failed to produce a result (timeout, panic)
    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            latency_ms: None,
            error: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Health check trait
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Stable identifier used as the key in reports
    fn key(&self) -> &str;

    /// Human readable name
    fn display_name(&self) -> &str;

    /// Perform the health check
    async fn check(&self) -> HealthCheckResult;

    /// Whether a failure of this check makes the whole system unhealthy
    fn is_required(&self) -> bool {
        false
    }

    /// Timeout for this health check
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// PostgreSQL health check
pub struct PostgresHealthCheck {
    pool: Option<PgPool>,
    init_error: Option<String>,
    timeout: Duration,
}

impl PostgresHealthCheck {
    /// The pool connects lazily, so construction never touches the network.
    pub fn new(database_url: Option<&str>, timeout: Duration) -> Self {
        let (pool, init_error) = match database_url {
            Some(url) => match PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(timeout)
                .idle_timeout(Duration::from_secs(10))
                .connect_lazy(url)
            {
                Ok(pool) => (Some(pool), None),
                Err(e) => {
                    warn!("Invalid PostgreSQL URL for health checks: {}", e);
                    (None, Some(format!("Invalid PostgreSQL URL: {}", e)))
                }
            },
            None => (None, None),
        };
        Self {
            pool,
            init_error,
            timeout,
        }
    }
}

#[async_trait]
impl HealthCheck for PostgresHealthCheck {
    fn key(&self) -> &str {
        "postgresql"
    }

    fn display_name(&self) -> &str {
        "PostgreSQL Database"
    }

    async fn check(&self) -> HealthCheckResult {
        let start = Instant::now();

        let Some(pool) = &self.pool else {
            let message = self
                .init_error
                .clone()
                .unwrap_or_else(|| "PostgreSQL not configured".to_string());
            return HealthCheckResult::unhealthy(message, elapsed_ms(start));
        };

        match sqlx::query("SELECT NOW()").execute(pool).await {
            Ok(_) => HealthCheckResult::healthy(elapsed_ms(start)).with_details(serde_json::json!({
                "connectionPool": pool.size(),
                "idleConnections": pool.num_idle(),
            })),
            Err(e) => {
                error!("PostgreSQL health check failed: {}", e);
                HealthCheckResult::unhealthy(e.to_string(), elapsed_ms(start))
            }
        }
    }

    fn is_required(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// MongoDB health check
pub struct MongoHealthCheck {
    client: Option<mongodb::Client>,
    init_error: Option<String>,
    timeout: Duration,
}

impl MongoHealthCheck {
    pub async fn new(mongodb_url: Option<&str>, timeout: Duration) -> Self {
        let mut check = Self {
            client: None,
            init_error: None,
            timeout,
        };

        let Some(url) = mongodb_url else {
            return check;
        };

        match Self::build_client(url, timeout).await {
            Ok(client) => check.client = Some(client),
            Err(e) => {
                warn!("Failed to initialise MongoDB client for health checks: {}", e);
                check.init_error = Some(e.to_string());
            }
        }
        check
    }

    async fn build_client(url: &str, timeout: Duration) -> mongodb::error::Result<mongodb::Client> {
        let mut options = mongodb::options::ClientOptions::parse(url).await?;
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);
        mongodb::Client::with_options(options)
    }
}

#[async_trait]
impl HealthCheck for MongoHealthCheck {
    fn key(&self) -> &str {
        "mongodb"
    }

    fn display_name(&self) -> &str {
        "MongoDB Database"
    }

    async fn check(&self) -> HealthCheckResult {
        let start = Instant::now();

        let Some(client) = &self.client else {
            let message = self
                .init_error
                .clone()
                .unwrap_or_else(|| "MongoDB not configured".to_string());
            return HealthCheckResult::unhealthy(message, elapsed_ms(start));
        };

        match client.database("admin").run_command(doc! { "ping": 1 }).await {
            Ok(_) => HealthCheckResult::healthy(elapsed_ms(start))
                .with_details(serde_json::json!({ "connected": true })),
            Err(e) => {
                error!("MongoDB ping failed: {}", e);
                HealthCheckResult::unhealthy(e.to_string(), elapsed_ms(start))
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Redis health check
pub struct RedisHealthCheck {
    redis_client: Option<redis::Client>,
    init_error: Option<String>,
    timeout: Duration,
}

impl RedisHealthCheck {
    pub fn new(redis_url: Option<&str>, timeout: Duration) -> Self {
        let (redis_client, init_error) = match redis_url.map(redis::Client::open) {
            Some(Ok(client)) => (Some(client), None),
            Some(Err(e)) => (None, Some(format!("Invalid Redis URL: {}", e))),
            None => (None, None),
        };
        Self {
            redis_client,
            init_error,
            timeout,
        }
    }
}

#[async_trait]
impl HealthCheck for RedisHealthCheck {
    fn key(&self) -> &str {
        "redis"
    }

    fn display_name(&self) -> &str {
        "Redis Cache"
    }

    async fn check(&self) -> HealthCheckResult {
        let start = Instant::now();

        let Some(client) = &self.redis_client else {
            let message = self
                .init_error
                .clone()
                .unwrap_or_else(|| "Redis not configured".to_string());
            return HealthCheckResult::unhealthy(message, elapsed_ms(start));
        };

        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Redis connection failed: {}", e);
                return HealthCheckResult::unhealthy(
                    format!("Connection failed: {}", e),
                    elapsed_ms(start),
                );
            }
        };

        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => HealthCheckResult::healthy(elapsed_ms(start))
                .with_details(serde_json::json!({ "connected": true })),
            Err(e) => {
                error!("Redis ping failed: {}", e);
                HealthCheckResult::unhealthy(format!("Ping failed: {}", e), elapsed_ms(start))
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// External HTTP API health check (exchanges and the payment provider)
pub struct HttpApiHealthCheck {
    key: String,
    display_name: String,
    url: String,
    client: reqwest::Client,
    accept_client_errors: bool,
    count_items: bool,
    timeout: Duration,
}

impl HttpApiHealthCheck {
    pub fn new(key: &str, display_name: &str, url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            url: url.to_string(),
            client,
            accept_client_errors: false,
            count_items: false,
            timeout,
        }
    }

    /// Treat 4xx as reachable; used for endpoints that need credentials
    pub fn accept_client_errors(mut self) -> Self {
        self.accept_client_errors = true;
        self
    }

    /// Report how many items a JSON array response carried
    pub fn count_items(mut self) -> Self {
        self.count_items = true;
        self
    }
}

#[async_trait]
impl HealthCheck for HttpApiHealthCheck {
    fn key(&self) -> &str {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn check(&self) -> HealthCheckResult {
        let start = Instant::now();
        debug!("Probing {} at {}", self.display_name, self.url);

        let response = match self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("{} health check failed: {}", self.display_name, e);
                return HealthCheckResult::unhealthy(e.to_string(), elapsed_ms(start))
                    .with_details(serde_json::json!({ "statusCode": "N/A" }));
            }
        };

        let status = response.status();
        let reachable = status.is_success() || (self.accept_client_errors && status.as_u16() < 500);

        if !reachable {
            warn!("{} returned status: {}", self.display_name, status);
            return HealthCheckResult::unhealthy(
                format!("Request failed with status code {}", status.as_u16()),
                elapsed_ms(start),
            )
            .with_details(serde_json::json!({ "statusCode": status.as_u16() }));
        }

        let mut details = serde_json::json!({ "statusCode": status.as_u16() });
        if self.accept_client_errors {
            details["apiReachable"] = serde_json::Value::Bool(true);
        }
        if self.count_items {
            let count = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.as_array().map(Vec::len))
                .unwrap_or(0);
            details["dataCount"] = serde_json::json!(count);
        }

        HealthCheckResult::healthy(elapsed_ms(start)).with_details(details)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// In-process service check; healthy whenever the process can answer
pub struct InternalServiceHealthCheck {
    key: String,
    display_name: String,
    required: bool,
    details: serde_json::Value,
}

impl InternalServiceHealthCheck {
    pub fn new(key: &str, display_name: &str, required: bool, details: serde_json::Value) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            required,
            details,
        }
    }

    pub fn market_data() -> Self {
        Self::new(
            "marketData",
            "Market Data Service",
            true,
            serde_json::json!({ "serviceAvailable": true, "dataCollectionActive": true }),
        )
    }

    pub fn exchange_service() -> Self {
        Self::new(
            "exchangeService",
            "Exchange Service",
            true,
            serde_json::json!({
                "serviceAvailable": true,
                "supportedExchanges": ["binance", "wazirx", "coindcx"],
            }),
        )
    }

    pub fn websocket(enabled: bool) -> Self {
        Self::new(
            "websocket",
            "WebSocket Server",
            false,
            serde_json::json!({ "serviceAvailable": true, "enabled": enabled }),
        )
    }
}

#[async_trait]
impl HealthCheck for InternalServiceHealthCheck {
    fn key(&self) -> &str {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy(0).with_details(self.details.clone())
    }

    fn is_required(&self) -> bool {
        self.required
    }
}
