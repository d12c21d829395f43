use axum::{
    http::{header, Method, StatusCode, Uri},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

/// `302 Found` to the health endpoint, for GET and HEAD alike
pub async fn root_redirect() -> (StatusCode, [(header::HeaderName, &'static str); 1]) {
    (StatusCode::FOUND, [(header::LOCATION, "/health")])
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Deployment smoke test
pub async fn deployment_test() -> Json<Value> {
    Json(json!({
        "message": "Deployment test successful",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

pub async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "path": uri.to_string(),
            "method": method.as_str(),
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
}
