//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body of the
//! form `{"error": "..."}` with an appropriate status code.
//!
//! Database errors are logged with full detail but only a
//! generic message is returned to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lmra_fetch::FetchError;
use lmra_ollama::OllamaError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or incomplete request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The referenced repository, file set or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upstream quota is exhausted; needs manual intervention.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The model runner or repository host failed.
    ///
    /// `message` is shown to the caller as `error`, `details` as `details`.
    #[error("{message}: {details}")]
    Upstream { message: String, details: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServerError {
    pub fn upstream(message: impl Into<String>, details: impl ToString) -> Self {
        ServerError::Upstream {
            message: message.into(),
            details: details.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Upstream { .. } | ServerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text safe to show a client, e.g. in an SSE `error` event.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::BadRequest(m) | ServerError::NotFound(m) | ServerError::RateLimited(m) => {
                m.clone()
            }
            ServerError::Upstream { message, details } => format!("{message}: {details}"),
            ServerError::Database(_) => "internal server error".to_owned(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ServerError::BadRequest(m) | ServerError::NotFound(m) | ServerError::RateLimited(m) => {
                json!({ "error": m })
            }
            ServerError::Upstream { message, details } => {
                warn!(message = %message, details = %details, "upstream failure");
                json!({ "error": message, "details": details })
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                json!({ "error": "internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<FetchError> for ServerError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl(m) => ServerError::BadRequest(m),
            FetchError::NotFound(what) => ServerError::NotFound(what),
            FetchError::RateLimited => ServerError::RateLimited(FetchError::RateLimited.to_string()),
            other => ServerError::upstream("Failed to fetch repository content", other),
        }
    }
}

impl From<OllamaError> for ServerError {
    fn from(e: OllamaError) -> Self {
        ServerError::upstream("Failed to communicate with AI service", e)
    }
}
