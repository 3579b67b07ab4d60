use std::time::Duration;

use thiserror::Error;

/// Errors returned by the model-service client.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Network failure, request timeout, or body decode failure.
    #[error("model service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream did not start answering within the allowed window.
    #[error("model service did not respond within {0:?}")]
    Timeout(Duration),

    /// Non-2xx answer from the model service.
    #[error("model service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response stream broke mid-way.
    #[error("model stream error: {0}")]
    Stream(String),

    #[error("invalid model service response: {0}")]
    Json(#[from] serde_json::Error),
}
