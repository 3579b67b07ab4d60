//! Code modernization endpoints (`/api/modernization`).
//!
//! `modernize` and `compare-patterns` are single model calls.  The three
//! `analyze-*` endpoints run a [`Pipeline`](crate::pipeline::Pipeline) and
//! record an `analysis_history` row; `analyze-codebase` and
//! `analyze-dependencies-github` stream named progress events when the
//! request sets `stream: true`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use lmra_ollama::ChatMessage;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::pipeline::dependencies::{DependencyPlan, GithubDependencyPlan};
use crate::pipeline::progress::{ProgressEvent, ProgressReporter};
use crate::pipeline::{prompt, spawn_streaming, CodebasePlan};
use crate::schemas::modernization::{
    AnalyzeCodebaseRequest, AnalyzeDependenciesRequest, AnalyzeGithubDependenciesRequest,
    ComparePatternsRequest, ComparisonResponse, ModernizeRequest, RecommendationsResponse,
};
use crate::state::AppState;

const MODERNIZE_TIMEOUT: Duration = Duration::from_secs(120);
const COMPARE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(OpenApi)]
#[openapi(
    paths(
        modernize,
        compare_patterns,
        analyze_codebase,
        analyze_dependencies,
        analyze_dependencies_github
    ),
    components(schemas(
        ModernizeRequest,
        RecommendationsResponse,
        ComparePatternsRequest,
        ComparisonResponse,
        AnalyzeCodebaseRequest,
        AnalyzeDependenciesRequest,
        AnalyzeGithubDependenciesRequest
    ))
)]
pub struct ModernizationApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/modernize", post(modernize))
        .route("/compare-patterns", post(compare_patterns))
        .route("/analyze-codebase", post(analyze_codebase))
        .route("/analyze-dependencies", post(analyze_dependencies))
        .route("/analyze-dependencies-github", post(analyze_dependencies_github))
}

fn event_stream(events: ReceiverStream<ProgressEvent>) -> Response {
    Sse::new(events.map(|e| Ok::<_, Infallible>(e.into_sse())))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Modernization advice for a code snippet (`POST /api/modernization/modernize`).
#[utoipa::path(
    post,
    path = "/api/modernization/modernize",
    tag = "modernization",
    request_body = ModernizeRequest,
    responses(
        (status = 200, description = "Recommendations", body = RecommendationsResponse),
        (status = 400, description = "Code or language missing"),
        (status = 500, description = "Model runner failed"),
    )
)]
pub async fn modernize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModernizeRequest>,
) -> Result<Json<RecommendationsResponse>, ServerError> {
    if req.code.trim().is_empty() || req.language.trim().is_empty() {
        return Err(ServerError::BadRequest("Code and language are required".into()));
    }
    let prompt = prompt::modernize_prompt(&req.code, &req.language, req.target_version.as_deref());
    let answer = state
        .model
        .chat(
            &state.config.default_model,
            &[ChatMessage::user(prompt)],
            MODERNIZE_TIMEOUT,
        )
        .await
        .map_err(|e| ServerError::upstream("Failed to analyze code", e))?;
    Ok(Json(RecommendationsResponse {
        recommendations: answer.message.content,
        model: answer.model,
    }))
}

/// Explain what the modern pattern improves (`POST /api/modernization/compare-patterns`).
#[utoipa::path(
    post,
    path = "/api/modernization/compare-patterns",
    tag = "modernization",
    request_body = ComparePatternsRequest,
    responses(
        (status = 200, description = "Comparison", body = ComparisonResponse),
        (status = 400, description = "A pattern or the language is missing"),
        (status = 500, description = "Model runner failed"),
    )
)]
pub async fn compare_patterns(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ComparePatternsRequest>,
) -> Result<Json<ComparisonResponse>, ServerError> {
    if [&req.old_pattern, &req.new_pattern, &req.language]
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(ServerError::BadRequest(
            "Old pattern, new pattern, and language are required".into(),
        ));
    }
    let prompt = prompt::compare_prompt(&req.old_pattern, &req.new_pattern, &req.language);
    let answer = state
        .model
        .chat(
            &state.config.default_model,
            &[ChatMessage::user(prompt)],
            COMPARE_TIMEOUT,
        )
        .await
        .map_err(|e| ServerError::upstream("Failed to compare patterns", e))?;
    Ok(Json(ComparisonResponse {
        comparison: answer.message.content,
        model: answer.model,
    }))
}

/// Analyze a GitHub repository's code (`POST /api/modernization/analyze-codebase`).
///
/// With `stream: true` the body is `text/event-stream` with `started`,
/// `progress`, `result`, `error` and `done` events; the last one is always
/// `done`.  Request validation errors are returned before the stream opens.
#[utoipa::path(
    post,
    path = "/api/modernization/analyze-codebase",
    tag = "modernization",
    request_body = AnalyzeCodebaseRequest,
    responses(
        (status = 200, description = "Analysis payload, or an SSE progress stream", body = Value),
        (status = 400, description = "Invalid repository URL or language"),
        (status = 404, description = "No files found matching criteria"),
        (status = 429, description = "GitHub rate limit exhausted"),
        (status = 500, description = "Upstream failure"),
    )
)]
pub async fn analyze_codebase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeCodebaseRequest>,
) -> Result<Response, ServerError> {
    let stream = req.stream;
    let plan = CodebasePlan::new(req.into(), &state.config.default_model)?;
    let pipeline = state.pipeline();
    debug!(stream, "codebase analysis requested");

    if stream {
        let events = spawn_streaming(move |mut reporter| async move {
            let _ = pipeline.analyze_codebase(plan, &mut reporter).await;
        });
        return Ok(event_stream(events));
    }

    let payload = pipeline
        .analyze_codebase(plan, &mut ProgressReporter::silent())
        .await?;
    Ok(Json(payload).into_response())
}

/// Analyze a dependency list (`POST /api/modernization/analyze-dependencies`).
#[utoipa::path(
    post,
    path = "/api/modernization/analyze-dependencies",
    tag = "modernization",
    request_body = AnalyzeDependenciesRequest,
    responses(
        (status = 200, description = "Analysis payload", body = Value),
        (status = 400, description = "Dependencies or language missing"),
        (status = 500, description = "Model runner failed"),
    )
)]
pub async fn analyze_dependencies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeDependenciesRequest>,
) -> Result<Json<Value>, ServerError> {
    let plan = DependencyPlan::new(
        req.dependencies,
        req.language,
        req.model,
        &state.config.default_model,
    )?;
    let payload = state
        .pipeline()
        .analyze_dependencies(plan, &mut ProgressReporter::silent())
        .await?;
    Ok(Json(payload))
}

/// Analyze the dependency manifests of a GitHub repository
/// (`POST /api/modernization/analyze-dependencies-github`).
#[utoipa::path(
    post,
    path = "/api/modernization/analyze-dependencies-github",
    tag = "modernization",
    request_body = AnalyzeGithubDependenciesRequest,
    responses(
        (status = 200, description = "Analysis payload, or an SSE progress stream", body = Value),
        (status = 400, description = "Invalid repository URL"),
        (status = 404, description = "No dependency files or dependencies found"),
        (status = 429, description = "GitHub rate limit exhausted"),
        (status = 500, description = "Upstream failure"),
    )
)]
pub async fn analyze_dependencies_github(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeGithubDependenciesRequest>,
) -> Result<Response, ServerError> {
    let stream = req.stream;
    let plan = GithubDependencyPlan::new(
        req.repo_url,
        req.branch,
        req.path,
        req.model,
        &state.config.default_model,
    )?;
    let pipeline = state.pipeline();

    if stream {
        let events = spawn_streaming(move |mut reporter| async move {
            let _ = pipeline.analyze_github_dependencies(plan, &mut reporter).await;
        });
        return Ok(event_stream(events));
    }

    let payload = pipeline
        .analyze_github_dependencies(plan, &mut ProgressReporter::silent())
        .await?;
    Ok(Json(payload).into_response())
}
