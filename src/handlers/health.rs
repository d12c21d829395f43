use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::health::{HealthReport, HealthStatus};
use crate::state::AppState;

pub const SERVICE_NAME: &str = "cryptopulse-backend";

/// Lightweight check for load balancers; never touches dependencies
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "environment": state.config.environment,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn liveness() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "alive",
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
}

/// Ready when the last aggregation found every required service healthy
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.monitor.health_status().await;
    let ready = report.overall.status == HealthStatus::Healthy;
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "ready": ready,
            "status": report.overall.status,
            "requiredServicesHealthy": report.overall.required_services_healthy,
            "totalRequiredServices": report.overall.total_required_services,
            "timestamp": report.timestamp
        })),
    )
}

pub async fn api_status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "operational",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "timestamp": Utc::now().to_rfc3339(),
            "endpoints": {
                "health": "/health",
                "status": "/api/status",
                "healthReport": "/api/health",
                "payments": "/api/v1/payments/*"
            }
        })),
    )
}

/// Cached report from the background monitor
pub async fn health_report(State(state): State<AppState>) -> HealthReport {
    state.monitor.health_status().await
}

/// Run a fresh aggregation instead of waiting for the next interval
pub async fn run_health_check(State(state): State<AppState>) -> HealthReport {
    state.monitor.perform_health_check().await
}
