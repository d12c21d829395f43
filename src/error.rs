use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::any::Any;
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

/// Errors surfaced by handlers as JSON responses
///
/// Rendering takes the environment flag from the caller, so there is no
/// `IntoResponse` impl.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Build from a caught handler panic
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "handler panicked".to_string()
        };
        ApiError::Internal(message)
    }

    /// Render the error, revealing the message only in development
    pub fn render(&self, expose_details: bool) -> Response {
        error!("Request failed: {}", self);
        let message = if expose_details {
            self.to_string()
        } else {
            "Something went wrong".to_string()
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error",
                "message": message,
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
            .into_response()
    }

    /// `{ success: false, error }` body of the payments routes; the
    /// underlying message is added only in development
    pub fn render_failure(&self, summary: &str, expose_details: bool) -> Response {
        error!("{}: {}", summary, self);
        let mut body = json!({ "success": false, "error": summary });
        if expose_details {
            body["message"] = Value::String(self.to_string());
        }
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_panic_payloads() {
        let err = ApiError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "boom");

        let err = ApiError::from_panic(Box::new(String::from("kaboom")));
        assert_eq!(err.to_string(), "kaboom");

        let err = ApiError::from_panic(Box::new(42u8));
        assert_eq!(err.to_string(), "handler panicked");
    }

    #[test]
    fn test_render_is_internal_server_error() {
        let response = ApiError::Internal("db down".into()).render(true);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_storage_error_message() {
        let err = ApiError::from(StorageError::ConnectionError("db down".into()));
        assert_eq!(err.to_string(), "Storage error: Connection error: db down");

        let response = err.render_failure("Failed to fetch subscription", false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
