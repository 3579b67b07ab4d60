//! Request / response types for the analysis history API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::{AnalysisRecord, AnalysisStatus};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Query parameters for `GET /api/modernization/history`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Page size; default 50, at most 200.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// `codebase`, `dependencies` or `github-dependencies`.
    #[serde(rename = "type")]
    pub analysis_type: Option<String>,
}

impl HistoryQuery {
    pub fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// One analysis run as returned by the history API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisView {
    pub id: i64,
    pub repository_url: Option<String>,
    pub branch: Option<String>,
    pub analysis_type: String,
    pub language: Option<String>,
    pub files_analyzed: Option<i64>,
    #[schema(value_type = String, example = "completed")]
    pub status: AnalysisStatus,
    pub modernization_score: Option<i64>,
    pub overall_severity: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub query_parameters: Option<serde_json::Value>,
    /// Only present on single-record reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result_data: Option<serde_json::Value>,
    pub processed_files: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<AnalysisRecord> for AnalysisView {
    fn from(r: AnalysisRecord) -> Self {
        Self {
            id: r.id,
            repository_url: r.repository_url,
            branch: r.branch,
            analysis_type: r.analysis_type,
            language: r.language,
            files_analyzed: r.files_analyzed,
            status: r.status,
            modernization_score: r.modernization_score,
            overall_severity: r.overall_severity,
            query_parameters: r.query_parameters,
            result_data: r.result_data,
            processed_files: r.processed_files,
            error_message: r.error_message,
            created_at: r.created_at,
            completed_at: r.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryPage {
    pub analyses: Vec<AnalysisView>,
    pub limit: i64,
    pub offset: i64,
}
