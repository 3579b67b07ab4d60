//! Server configuration, loaded from environment variables at startup.

/// Runtime configuration for lmra-gateway.
///
/// Every field has a sensible default so the server works out-of-the-box
/// against a local Ollama without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// SQLite database URL for analysis history
    /// (default: `"sqlite://lmra-gateway.db"`, created when missing).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Base URL of the Ollama model runner.
    pub ollama_host: String,

    /// Model used when a request does not name one.
    pub default_model: String,

    /// Optional GitHub access token; raises the repository API rate limit.
    pub github_token: Option<String>,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Requests allowed per client IP within `rate_limit_window_secs`.
    /// `0` disables rate limiting.
    pub rate_limit: u32,

    pub rate_limit_window_secs: u64,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("LMRA_BIND", "0.0.0.0:8080"),
            database_url: env_or("LMRA_DATABASE_URL", "sqlite://lmra-gateway.db"),
            log_level: env_or("LMRA_LOG", "info"),
            log_json: parse_bool("LMRA_LOG_JSON", false),
            ollama_host: env_or("OLLAMA_HOST", "http://localhost:11434"),
            default_model: env_or("LMRA_DEFAULT_MODEL", "llama3"),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            cors_allowed_origins: std::env::var("LMRA_CORS_ORIGINS").ok(),
            rate_limit: parse_env("LMRA_RATE_LIMIT", 100),
            rate_limit_window_secs: parse_env("LMRA_RATE_WINDOW_SECS", 15 * 60),
            enable_docs: parse_bool("LMRA_ENABLE_DOCS", true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
            database_url: "sqlite::memory:".into(),
            log_level: "info".into(),
            log_json: false,
            ollama_host: "http://localhost:11434".into(),
            default_model: "llama3".into(),
            github_token: None,
            cors_allowed_origins: None,
            rate_limit: 100,
            rate_limit_window_secs: 15 * 60,
            enable_docs: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
