//! Per-client-IP request limit for the `/api` routes.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use tracing::{debug, warn};

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Keyed limiter allowing `limit` requests per `window` for each client IP.
#[derive(Clone)]
pub struct ClientLimiter {
    inner: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl ClientLimiter {
    /// Returns `None` when `limit` is zero or the window is empty, which
    /// disables limiting.
    pub fn new(limit: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(limit)?;
        let quota = Quota::with_period(window / limit)?.allow_burst(burst);
        Some(Self {
            inner: Arc::new(RateLimiter::keyed(quota)),
        })
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.inner.check_key(&ip).is_ok()
    }

    /// Forget clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.inner.retain_recent();
        debug!(tracked = self.inner.len(), "rate limiter pruned");
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<ClientLimiter>,
    req: Request,
    next: Next,
) -> Response {
    // Requests without peer info (in-process tests) are not limited.
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = peer {
        if !limiter.check(ip) {
            warn!(%ip, "client rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": RATE_LIMIT_MESSAGE })),
            )
                .into_response();
        }
    }

    next.run(req).await
}
