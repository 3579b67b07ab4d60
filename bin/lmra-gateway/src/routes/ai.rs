//! Chat, summarization and model listing (`/api/ai`).
//!
//! `POST /chat` relays to the model runner either as one blocking call or,
//! with `stream: true`, as SSE `data:` events carrying live throughput
//! figures (see [`crate::relay`]).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lmra_ollama::ChatMessage;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::relay::{relay_chat, OneShotMetrics};
use crate::schemas::ai::{ChatReply, ChatRequest, SummarizeRequest, SummaryResponse};
use crate::state::AppState;

/// Bound on every blocking call made from this module.
const MODEL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(OpenApi)]
#[openapi(
    paths(chat, summarize, list_models),
    components(schemas(ChatRequest, ChatReply, SummarizeRequest, SummaryResponse, OneShotMetrics))
)]
pub struct AiApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/summarize", post(summarize))
        .route("/models", get(list_models))
}

fn model_or_default(state: &AppState, model: Option<String>) -> String {
    model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone())
}

/// Chat with a model (`POST /api/ai/chat`).
///
/// With `stream: true` the body is `text/event-stream`: one
/// `{"chunk", "metrics"}` event per fragment, then `{"done": true, ...}`,
/// or `{"error": ...}` if the runner fails mid-way.
#[utoipa::path(
    post,
    path = "/api/ai/chat",
    tag = "ai",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply, or an SSE stream when `stream` is set", body = ChatReply),
        (status = 400, description = "Message is missing"),
        (status = 500, description = "Model runner failed"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    let started = Instant::now();
    if req.message.trim().is_empty() {
        return Err(ServerError::BadRequest("Message is required".into()));
    }
    let model = model_or_default(&state, req.model);
    let messages = vec![ChatMessage::user(req.message)];
    debug!(model = %model, stream = req.stream, "chat request");

    if req.stream {
        let events = relay_chat(Arc::clone(&state.model), model, messages, started);
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let answer = state
        .model
        .chat(&model, &messages, MODEL_TIMEOUT)
        .await
        .map_err(|e| ServerError::upstream("Failed to communicate with AI service", e))?;
    let metrics = OneShotMetrics::new(answer.eval_count.unwrap_or(0), started.elapsed());
    info!(model = %answer.model, tokens = metrics.tokens, duration = %metrics.duration, "chat done");

    Ok(Json(ChatReply {
        response: answer.message.content,
        model: answer.model,
        metrics,
    })
    .into_response())
}

/// Summarize text (`POST /api/ai/summarize`).
#[utoipa::path(
    post,
    path = "/api/ai/summarize",
    tag = "ai",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Summary", body = SummaryResponse),
        (status = 400, description = "Text is missing"),
        (status = 500, description = "Model runner failed"),
    )
)]
pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<SummaryResponse>, ServerError> {
    if req.text.trim().is_empty() {
        return Err(ServerError::BadRequest("Text is required".into()));
    }
    let model = model_or_default(&state, req.model);
    let prompt = crate::pipeline::prompt::summarize_prompt(&req.text);
    let out = state
        .model
        .generate(&model, &prompt, MODEL_TIMEOUT)
        .await
        .map_err(|e| ServerError::upstream("Failed to summarize text", e))?;
    Ok(Json(SummaryResponse {
        summary: out.response,
        model: out.model,
    }))
}

/// Models installed on the runner (`GET /api/ai/models`), passed through.
#[utoipa::path(
    get,
    path = "/api/ai/models",
    tag = "ai",
    responses(
        (status = 200, description = "Runner model list", body = Value),
        (status = 500, description = "Model runner failed"),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ServerError> {
    let models = state
        .model
        .list_models()
        .await
        .map_err(|e| ServerError::upstream("Failed to fetch available models", e))?;
    Ok(Json(models))
}
