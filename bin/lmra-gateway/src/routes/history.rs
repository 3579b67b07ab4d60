//! Read-only access to recorded analysis runs.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::AnalysisStore;
use crate::error::ServerError;
use crate::schemas::history::{AnalysisView, HistoryPage, HistoryQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_history, get_history),
    components(schemas(AnalysisView, HistoryPage))
)]
pub struct HistoryApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/{id}", get(get_history))
}

/// Recent runs, newest first, without their result payloads.
#[utoipa::path(
    get,
    path = "/api/modernization/history",
    tag = "history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "One page of runs", body = HistoryPage),
    )
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ServerError> {
    let (limit, offset) = query.page();
    let records = state
        .store
        .list_analyses(limit, offset, query.analysis_type.as_deref())
        .await?;
    Ok(Json(HistoryPage {
        analyses: records.into_iter().map(AnalysisView::from).collect(),
        limit,
        offset,
    }))
}

/// One run, including its result payload.
#[utoipa::path(
    get,
    path = "/api/modernization/history/{id}",
    tag = "history",
    params(("id" = i64, Path, description = "Analysis id")),
    responses(
        (status = 200, description = "The run", body = AnalysisView),
        (status = 404, description = "No such run"),
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AnalysisView>, ServerError> {
    state
        .store
        .get_analysis(id)
        .await?
        .map(|r| Json(AnalysisView::from(r)))
        .ok_or_else(|| ServerError::NotFound(format!("Analysis {id} not found")))
}
