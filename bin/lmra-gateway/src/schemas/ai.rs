//! Request / response types for `/api/ai`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::relay::OneShotMetrics;

/// Request body for `POST /api/ai/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user message; must not be blank.
    #[serde(default)]
    pub message: String,
    /// Model name; the configured default when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When `true`, the reply is streamed as SSE `data:` events.
    #[serde(default)]
    pub stream: bool,
}

/// Response body of a non-streaming chat.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatReply {
    pub response: String,
    pub model: String,
    pub metrics: OneShotMetrics,
}

/// Request body for `POST /api/ai/summarize`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub summary: String,
    pub model: String,
}
