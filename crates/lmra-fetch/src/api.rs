use std::env;
use std::time::Duration;

use crate::client::{GitHubClient, DEFAULT_API_BASE};
use crate::error::FetchError;

/// Builder for [`GitHubClient`].
///
/// # Example
/// ```rust,no_run
/// use lmra_fetch::Api;
/// let client = Api::new()
///     .set_timeout_secs(10)
///     .build()
///     .unwrap();
/// ```
pub struct Api {
    pub(crate) api_base: String,
    pub(crate) token: Option<String>,
    pub(crate) timeout_secs: u64,
    pub(crate) proxy: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

impl Api {
    /// Create a new `Api` instance.
    ///
    /// The access token is read from `GITHUB_TOKEN` and the proxy from
    /// `HTTP_PROXY` / `HTTPS_PROXY`.
    pub fn new() -> Self {
        let token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        let proxy = env::var("HTTP_PROXY")
            .ok()
            .or_else(|| env::var("HTTPS_PROXY").ok());

        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            timeout_secs: 30,
            proxy,
        }
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    pub fn set_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Override the access token.  `None` sends unauthenticated requests.
    pub fn set_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Per-request timeout in seconds (default: `30`).
    pub fn set_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Override the HTTP/HTTPS proxy URL.
    pub fn set_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn build(self) -> Result<GitHubClient, FetchError> {
        GitHubClient::new(
            self.api_base,
            self.token,
            Duration::from_secs(self.timeout_secs),
            self.proxy,
        )
    }
}
