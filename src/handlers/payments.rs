use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde_json::{json, Value};
use tracing::error;

use crate::error::ApiError;
use crate::payments::webhook::{LEGACY_SIGNATURE_HEADER, SIGNATURE_HEADER};
use crate::payments::{process_webhook, WebhookError};
use crate::state::AppState;

/// Cashfree webhook for payment status updates
///
/// The body is taken raw so the signature is checked over the exact bytes
/// that were signed, whatever the declared content type.
pub async fn cashfree_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .or_else(|| headers.get(LEGACY_SIGNATURE_HEADER))
        .and_then(|v| v.to_str().ok());

    let result = process_webhook(
        state.subscriptions.as_ref(),
        state.config.payments.webhook_secret.as_deref(),
        signature,
        &body,
    )
    .await;

    match result {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(WebhookError::InvalidSignature) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "success": false })))
        }
        Err(e @ WebhookError::InvalidPayload(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
        Err(WebhookError::MissingCustomerId) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Missing customerId" })),
        ),
        Err(WebhookError::Storage(e)) => {
            error!("Cashfree webhook error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false })),
            )
        }
    }
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, Response> {
    let subscription = state
        .subscriptions
        .get_by_user_id(&user_id)
        .await
        .map_err(|e| {
            ApiError::from(e)
                .render_failure("Failed to fetch subscription", state.config.is_development())
        })?;
    Ok(Json(json!({ "success": true, "data": subscription })))
}
