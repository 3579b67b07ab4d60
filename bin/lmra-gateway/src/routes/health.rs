//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Returns `{"status": "UP", "service": "ai-gateway", ...}` with HTTP 200.
/// Does not contact the model runner or GitHub.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Gateway is up", body = Value)
    )
)]
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status":    "UP",
        "service":   "ai-gateway",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "version":   env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn health_response_is_up() {
        let Json(body) = get_health().await;
        assert_eq!(body["status"], "UP");
        assert_eq!(body["service"], "ai-gateway");
    }

    #[tokio::test]
    async fn health_response_has_timestamp_and_version() {
        let Json(body) = get_health().await;
        assert!(body["timestamp"].as_str().unwrap_or("").ends_with('Z'));
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }
}
