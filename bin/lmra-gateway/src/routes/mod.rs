//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Per-client-IP rate limiting on `/api` (disable with `LMRA_RATE_LIMIT=0`)
//! - Optional OpenAPI document (disable with `LMRA_ENABLE_DOCS=false`)
//! - Health / heartbeat route
//! - `/api/ai` and `/api/modernization` routes

mod ai;
pub mod doc;
mod health;
mod history;
mod modernization;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Json, Router};
use tower::ServiceBuilder;

use crate::middleware::rate_limit::rate_limit_middleware;
use crate::middleware::{cors, trace, ClientLimiter};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
///
/// `limiter` guards every `/api` route; pass `None` to serve unlimited.
pub fn build(state: Arc<AppState>, limiter: Option<ClientLimiter>) -> Router {
    let mut api = Router::new()
        .nest("/ai", ai::router())
        .nest("/modernization", modernization::router().merge(history::router()));
    if let Some(limiter) = limiter {
        api = api.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let mut app = Router::new().merge(health::router()).nest("/api", api);

    if state.config.enable_docs {
        let api_doc = doc::get_docs();
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let doc = api_doc.clone();
                async move { Json(doc) }
            }),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{app_state, StubModel, StubRepo};
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn state() -> Arc<AppState> {
        app_state(
            Arc::new(StubModel::default()),
            Arc::new(StubRepo::with_files(&[])),
        )
        .await
    }

    fn from_client(uri: &str) -> Request<Body> {
        let mut req = Request::get(uri).body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 40000))));
        req
    }

    #[tokio::test]
    async fn health_is_served_at_root() {
        let resp = build(state().await, None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-trace-id"));
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let resp = build(state().await, None)
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api/ai/chat"].is_object());
        assert!(doc["paths"]["/api/modernization/analyze-codebase"].is_object());
        assert!(doc["paths"]["/api/modernization/history/{id}"].is_object());
    }

    #[tokio::test]
    async fn api_routes_are_rate_limited_but_health_is_not() {
        let limiter = ClientLimiter::new(1, Duration::from_secs(60));
        let app = build(state().await, limiter);

        let first = app.clone().oneshot(from_client("/api/ai/models")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.clone().oneshot(from_client("/api/ai/models")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let health = app.oneshot(from_client("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
