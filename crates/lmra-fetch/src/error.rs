use thiserror::Error;

/// Errors that can be returned by lmra-fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// An HTTP request failed (network error, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The repository reference could not be parsed.
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    /// The GitHub API answered 404 for the named resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The GitHub API rate limit is exhausted.  Requires manual intervention:
    /// configure an access token or wait for the window to reset.
    #[error(
        "GitHub API rate limit exceeded; set the GITHUB_TOKEN environment variable \
         to raise the limit"
    )]
    RateLimited,

    /// The GitHub API answered with an unexpected non-2xx status.
    #[error("GitHub API returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The GitHub API response was missing an expected field or had an unexpected shape.
    #[error("Invalid GitHub API response: {message}")]
    InvalidResponse { message: String },
}
