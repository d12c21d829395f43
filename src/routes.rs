use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::ApiError;
use crate::handlers::{fallback, health, payments};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
     script-src 'self'; img-src 'self' data: https:";

/// Build the full HTTP application
pub fn create_router(state: AppState) -> Router {
    let expose_errors = state.config.is_development();
    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/", get(fallback::root_redirect))
        .route("/favicon.ico", get(fallback::favicon))
        .route("/test", get(fallback::deployment_test))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/api/status", get(health::api_status))
        .route("/api/health", get(health::health_report))
        .route("/api/health/check", post(health::run_health_check))
        .route(
            "/api/v1/payments/webhook/cashfree",
            post(payments::cashfree_webhook),
        )
        .route(
            "/api/v1/payments/subscription/:user_id",
            get(payments::get_subscription),
        )
        // Must follow the last route: it only reaches routes already added
        .method_not_allowed_fallback(fallback::not_found)
        .fallback(fallback::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            ApiError::from_panic(panic).render(expose_errors)
        }))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!("Ignoring invalid FRONTEND_URL '{}': {}", frontend_url, e);
            layer
        }
    }
}
