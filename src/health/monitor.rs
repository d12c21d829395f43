use super::checks::{
    HealthCheck, HealthCheckResult, HealthStatus, HttpApiHealthCheck, InternalServiceHealthCheck,
    MongoHealthCheck, PostgresHealthCheck, RedisHealthCheck,
};
use crate::config::AppConfig;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Last known state of one monitored service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub required: bool,
    pub status: HealthStatus,
    #[serde(rename = "latency")]
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub details: Option<serde_json::Value>,
}

impl ServiceHealth {
    fn pending(check: &dyn HealthCheck) -> Self {
        Self {
            name: check.display_name().to_string(),
            required: check.is_required(),
            status: HealthStatus::Unknown,
            latency_ms: None,
            error: None,
            last_checked: None,
            details: None,
        }
    }

    fn from_result(check: &dyn HealthCheck, result: HealthCheckResult) -> Self {
        Self {
            name: check.display_name().to_string(),
            required: check.is_required(),
            status: result.status,
            latency_ms: result.latency_ms,
            error: result.error,
            last_checked: Some(Utc::now()),
            details: result.details,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    pub status: HealthStatus,
    pub healthy_services: usize,
    pub total_services: usize,
    pub required_services_healthy: usize,
    pub total_required_services: usize,
    pub last_checked: Option<DateTime<Utc>>,
    /// Seconds since the monitor was created
    pub uptime: f64,
    /// Milliseconds the last aggregation took
    pub check_duration: Option<u64>,
}

impl OverallHealth {
    /// Reduce per-service states to one status: healthy iff every required
    /// service is healthy.
    pub fn reduce(services: &BTreeMap<String, ServiceHealth>) -> Self {
        let total_services = services.len();
        let healthy_services = services
            .values()
            .filter(|s| s.status == HealthStatus::Healthy)
            .count();
        let total_required_services = services.values().filter(|s| s.required).count();
        let required_services_healthy = services
            .values()
            .filter(|s| s.required && s.status == HealthStatus::Healthy)
            .count();

        let status = if required_services_healthy == total_required_services {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        Self {
            status,
            healthy_services,
            total_services,
            required_services_healthy,
            total_required_services,
            last_checked: Some(Utc::now()),
            uptime: 0.0,
            check_duration: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: OverallHealth,
    pub services: BTreeMap<String, ServiceHealth>,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub version: String,
}

impl HealthReport {
    pub fn http_status_code(&self) -> StatusCode {
        match self.overall.status {
            HealthStatus::Healthy => StatusCode::OK,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        let status = self.http_status_code();
        (status, Json(self)).into_response()
    }
}

/// Polls every registered dependency in parallel and caches the reduced
/// result.
pub struct HealthMonitor {
    checks: Vec<Arc<dyn HealthCheck>>,
    environment: String,
    started_at: Instant,
    last_report: RwLock<HealthReport>,
}

impl HealthMonitor {
    pub fn new(checks: Vec<Arc<dyn HealthCheck>>, environment: impl Into<String>) -> Self {
        let environment = environment.into();
        let services: BTreeMap<String, ServiceHealth> = checks
            .iter()
            .map(|c| (c.key().to_string(), ServiceHealth::pending(c.as_ref())))
            .collect();
        let total_required_services = services.values().filter(|s| s.required).count();

        let initial = HealthReport {
            overall: OverallHealth {
                status: HealthStatus::Unknown,
                healthy_services: 0,
                total_services: services.len(),
                required_services_healthy: 0,
                total_required_services,
                last_checked: None,
                uptime: 0.0,
                check_duration: None,
            },
            services,
            timestamp: Utc::now(),
            environment: environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        Self {
            checks,
            environment,
            started_at: Instant::now(),
            last_report: RwLock::new(initial),
        }
    }

    /// Register the standard set of dependency probes
    pub async fn from_config(config: &AppConfig) -> Self {
        let probe_timeout = Duration::from_secs(config.health.timeout_secs);
        let endpoints = &config.exchanges;

        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(PostgresHealthCheck::new(
                config.database_url.as_deref(),
                probe_timeout,
            )),
            Arc::new(MongoHealthCheck::new(config.mongodb_url.as_deref(), probe_timeout).await),
            Arc::new(RedisHealthCheck::new(
                config.redis_url.as_deref(),
                probe_timeout,
            )),
            Arc::new(HttpApiHealthCheck::new(
                "binance",
                "Binance API",
                &endpoints.binance_url,
                probe_timeout,
            )),
            Arc::new(
                HttpApiHealthCheck::new(
                    "wazirx",
                    "WazirX API",
                    &endpoints.wazirx_url,
                    probe_timeout,
                )
                .count_items(),
            ),
            Arc::new(
                HttpApiHealthCheck::new(
                    "coindcx",
                    "CoinDCX API",
                    &endpoints.coindcx_url,
                    probe_timeout,
                )
                .count_items(),
            ),
            Arc::new(
                HttpApiHealthCheck::new(
                    "cashfree",
                    "Cashfree Payment API",
                    &endpoints.cashfree_url,
                    probe_timeout,
                )
                .accept_client_errors(),
            ),
            Arc::new(InternalServiceHealthCheck::market_data()),
            Arc::new(InternalServiceHealthCheck::exchange_service()),
            Arc::new(InternalServiceHealthCheck::websocket(
                config.websocket_enabled,
            )),
        ];

        info!("Health monitor initialised with {} services", checks.len());
        Self::new(checks, config.environment.clone())
    }

    fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Run every probe concurrently, reduce, cache and return the report
    pub async fn perform_health_check(&self) -> HealthReport {
        let started = Instant::now();

        let handles = self.checks.iter().map(|check| {
            let check = Arc::clone(check);
            let task = tokio::spawn({
                let check = Arc::clone(&check);
                async move {
                    let limit = check.timeout();
                    match timeout(limit, check.check()).await {
                        Ok(result) => result,
                        Err(_) => HealthCheckResult::errored(format!(
                            "Health check timed out after {}ms",
                            limit.as_millis()
                        )),
                    }
                }
            });
            async move {
                let result = task.await.unwrap_or_else(|e| {
                    error!("Health check '{}' panicked: {}", check.key(), e);
                    HealthCheckResult::errored(format!("Health check failed: {}", e))
                });
                (check, result)
            }
        });

        let services: BTreeMap<String, ServiceHealth> = join_all(handles)
            .await
            .into_iter()
            .map(|(check, result)| {
                (
                    check.key().to_string(),
                    ServiceHealth::from_result(check.as_ref(), result),
                )
            })
            .collect();

        let mut overall = OverallHealth::reduce(&services);
        overall.uptime = self.uptime_secs();
        overall.check_duration = Some(started.elapsed().as_millis() as u64);

        info!(
            overall_status = %overall.status,
            healthy_services = %format!("{}/{}", overall.healthy_services, overall.total_services),
            required_services_healthy = %format!(
                "{}/{}",
                overall.required_services_healthy, overall.total_required_services
            ),
            check_duration_ms = overall.check_duration.unwrap_or_default(),
            "Health check completed"
        );

        let report = HealthReport {
            overall,
            services,
            timestamp: Utc::now(),
            environment: self.environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        *self.last_report.write().await = report.clone();
        report
    }

    /// Cached report from the most recent aggregation
    pub async fn health_status(&self) -> HealthReport {
        let mut report = self.last_report.read().await.clone();
        report.overall.uptime = self.uptime_secs();
        report.timestamp = Utc::now();
        report
    }

    /// Start periodic health check background task
    ///
    /// Runs once immediately, then every `every` until `shutdown` fires.
    pub fn start_periodic_checks(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        info!(
            "Health monitor started with {}-second intervals",
            every.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Health monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                debug!("Running periodic health check");
                let report = self.perform_health_check().await;
                if report.overall.status != HealthStatus::Healthy {
                    warn!(
                        "System unhealthy: {}/{} required services healthy",
                        report.overall.required_services_healthy,
                        report.overall.total_required_services
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubCheck {
        key: &'static str,
        required: bool,
        status: HealthStatus,
        delay: Duration,
    }

    impl StubCheck {
        fn new(key: &'static str, required: bool, status: HealthStatus) -> Arc<dyn HealthCheck> {
            Arc::new(Self {
                key,
                required,
                status,
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl HealthCheck for StubCheck {
        fn key(&self) -> &str {
            self.key
        }

        fn display_name(&self) -> &str {
            self.key
        }

        async fn check(&self) -> HealthCheckResult {
            tokio::time::sleep(self.delay).await;
            match self.status {
                HealthStatus::Healthy => HealthCheckResult::healthy(1),
                _ => HealthCheckResult::unhealthy("stub failure", 1),
            }
        }

        fn is_required(&self) -> bool {
            self.required
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }
    }

    struct PanickingCheck;

    #[async_trait]
    impl HealthCheck for PanickingCheck {
        fn key(&self) -> &str {
            "panics"
        }

        fn display_name(&self) -> &str {
            "Panicking Service"
        }

        async fn check(&self) -> HealthCheckResult {
            panic!("probe exploded");
        }
    }

    #[tokio::test]
    async fn test_initial_report_is_unknown() {
        let monitor = HealthMonitor::new(
            vec![
                StubCheck::new("db", true, HealthStatus::Healthy),
                StubCheck::new("cache", false, HealthStatus::Healthy),
            ],
            "test",
        );

        let report = monitor.health_status().await;
        assert_eq!(report.overall.status, HealthStatus::Unknown);
        assert_eq!(report.overall.total_services, 2);
        assert_eq!(report.overall.total_required_services, 1);
        assert_eq!(report.services["db"].status, HealthStatus::Unknown);
        assert!(report.services["db"].last_checked.is_none());
    }

    #[tokio::test]
    async fn test_optional_failure_keeps_system_healthy() {
        let monitor = HealthMonitor::new(
            vec![
                StubCheck::new("db", true, HealthStatus::Healthy),
                StubCheck::new("cache", false, HealthStatus::Unhealthy),
            ],
            "test",
        );

        let report = monitor.perform_health_check().await;
        assert_eq!(report.overall.status, HealthStatus::Healthy);
        assert_eq!(report.overall.healthy_services, 1);
        assert_eq!(report.overall.required_services_healthy, 1);
        assert_eq!(report.services["cache"].error.as_deref(), Some("stub failure"));
        assert_eq!(report.http_status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_required_failure_makes_system_unhealthy() {
        let monitor = HealthMonitor::new(
            vec![
                StubCheck::new("db", true, HealthStatus::Unhealthy),
                StubCheck::new("market", true, HealthStatus::Healthy),
                StubCheck::new("cache", false, HealthStatus::Healthy),
            ],
            "test",
        );

        let report = monitor.perform_health_check().await;
        assert_eq!(report.overall.status, HealthStatus::Unhealthy);
        assert_eq!(report.overall.required_services_healthy, 1);
        assert_eq!(report.overall.total_required_services, 2);
        assert_eq!(report.http_status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let cached = monitor.health_status().await;
        assert_eq!(cached.overall.status, HealthStatus::Unhealthy);
        assert!(cached.services["db"].last_checked.is_some());
    }

    #[tokio::test]
    async fn test_no_required_services_is_healthy() {
        let monitor = HealthMonitor::new(
            vec![StubCheck::new("cache", false, HealthStatus::Unhealthy)],
            "test",
        );

        let report = monitor.perform_health_check().await;
        assert_eq!(report.overall.status, HealthStatus::Healthy);
        assert_eq!(report.overall.healthy_services, 0);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_as_error() {
        let slow: Arc<dyn HealthCheck> = Arc::new(StubCheck {
            key: "slow",
            required: true,
            status: HealthStatus::Healthy,
            delay: Duration::from_secs(5),
        });
        let monitor = HealthMonitor::new(vec![slow], "test");

        let report = monitor.perform_health_check().await;
        let slow = &report.services["slow"];
        assert_eq!(slow.status, HealthStatus::Error);
        assert!(slow.latency_ms.is_none());
        assert!(slow.error.as_ref().unwrap().contains("timed out"));
        assert_eq!(report.overall.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_recorded_as_error() {
        let monitor = HealthMonitor::new(
            vec![
                Arc::new(PanickingCheck) as Arc<dyn HealthCheck>,
                StubCheck::new("db", true, HealthStatus::Healthy),
            ],
            "test",
        );

        let report = monitor.perform_health_check().await;
        assert_eq!(report.services["panics"].status, HealthStatus::Error);
        assert_eq!(report.services["db"].status, HealthStatus::Healthy);
        assert_eq!(report.overall.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_report_serializes_camel_case() {
        let monitor = HealthMonitor::new(
            vec![StubCheck::new("db", true, HealthStatus::Healthy)],
            "test",
        );
        let report = monitor.perform_health_check().await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"]["status"], "healthy");
        assert_eq!(json["overall"]["totalRequiredServices"], 1);
        assert_eq!(json["services"]["db"]["latency"], 1);
        assert!(json["services"]["db"]["lastChecked"].is_string());
        assert_eq!(json["environment"], "test");
    }

    #[tokio::test]
    async fn test_periodic_checks_run_and_stop() {
        let monitor = Arc::new(HealthMonitor::new(
            vec![StubCheck::new("db", true, HealthStatus::Healthy)],
            "test",
        ));
        let shutdown = CancellationToken::new();

        let handle = monitor
            .clone()
            .start_periodic_checks(Duration::from_secs(60), shutdown.clone());

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            monitor.health_status().await.overall.status,
            HealthStatus::Healthy
        );

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_from_config_registers_standard_services() {
        let monitor = HealthMonitor::from_config(&AppConfig::default()).await;
        let report = monitor.health_status().await;

        assert_eq!(report.overall.total_services, 10);
        assert_eq!(report.overall.total_required_services, 3);
        for key in ["postgresql", "marketData", "exchangeService"] {
            assert!(report.services[key].required, "{} should be required", key);
        }
        assert!(!report.services["binance"].required);
        assert_eq!(report.services["cashfree"].name, "Cashfree Payment API");
    }
}
