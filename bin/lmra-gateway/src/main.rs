//! lmra-gateway – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Build the model-runner and GitHub clients.
//! 5. Start pruning the per-client rate limiter in a background task.
//! 6. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod entities;
mod error;
mod manifest;
mod middleware;
mod pipeline;
mod relay;
mod routes;
mod schemas;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lmra_ollama::{OllamaClient, OllamaConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::middleware::ClientLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "lmra-gateway starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Upstream clients ────────────────────────────────────────────────────
    let model = OllamaClient::new(OllamaConfig {
        base_url: cfg.ollama_host.clone(),
        ..OllamaConfig::default()
    })?;
    info!(ollama_host = %cfg.ollama_host, default_model = %cfg.default_model, "model runner configured");

    if cfg.github_token.is_none() {
        warn!("GITHUB_TOKEN is not set; GitHub requests are limited to 60 per hour");
    }
    let repos = lmra_fetch::Api::new()
        .set_token(cfg.github_token.clone())
        .build()?;

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store: Arc::new(store),
        model: Arc::new(model),
        repos: Arc::new(repos),
    });

    // ── 5. Rate limiter ────────────────────────────────────────────────────────
    let window = Duration::from_secs(cfg.rate_limit_window_secs);
    let limiter = ClientLimiter::new(cfg.rate_limit, window);
    match &limiter {
        Some(l) => {
            info!(limit = cfg.rate_limit, window_secs = cfg.rate_limit_window_secs, "rate limiting enabled");
            let l = l.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(window);
                loop {
                    tick.tick().await;
                    l.retain_recent();
                }
            });
        }
        None => warn!("rate limiting disabled"),
    }

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state), limiter);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("lmra-gateway stopped");
    Ok(())
}

/// `RUST_LOG` wins over `LMRA_LOG`; an unparsable `LMRA_LOG` falls back to `info`.
fn init_tracing(cfg: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        cfg.log_level.parse::<EnvFilter>().unwrap_or_else(|e| {
            eprintln!("WARN: LMRA_LOG='{}' is not a valid filter ({e}); using 'info'", cfg.log_level);
            EnvFilter::new("info")
        })
    });

    let fmt = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if cfg.log_json {
        fmt.json().with_current_span(true).init();
    } else {
        fmt.compact().init();
    }
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
