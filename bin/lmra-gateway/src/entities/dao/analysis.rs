use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle of one analysis run.  Only `in_progress` is non-terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisStatus {
    InProgress,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AnalysisKind {
    Codebase,
    Dependencies,
    GithubDependencies,
}

/// A row in the `analysis_history` table.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub id: i64,
    pub repository_url: Option<String>,
    pub branch: Option<String>,
    pub analysis_type: String,
    pub language: Option<String>,
    pub files_analyzed: Option<i64>,
    pub status: AnalysisStatus,
    pub modernization_score: Option<i64>,
    pub overall_severity: Option<String>,
    pub query_parameters: Option<serde_json::Value>,
    /// `None` in list queries; only single-record reads load the payload.
    pub result_data: Option<serde_json::Value>,
    pub processed_files: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Values recorded when a run starts.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub repository_url: Option<String>,
    pub branch: Option<String>,
    pub kind: AnalysisKind,
    pub language: Option<String>,
    pub query_parameters: Option<serde_json::Value>,
}

/// Partial update of a run; `None` fields are left untouched.
///
/// Setting a terminal `status` also stamps `completed_at`.
#[derive(Debug, Clone, Default)]
pub struct AnalysisUpdate {
    pub branch: Option<String>,
    pub files_analyzed: Option<i64>,
    pub processed_files: Option<Vec<String>>,
    pub status: Option<AnalysisStatus>,
    pub modernization_score: Option<i64>,
    pub overall_severity: Option<String>,
    pub result_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl AnalysisUpdate {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(AnalysisStatus::Failed),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.branch.is_none()
            && self.files_analyzed.is_none()
            && self.processed_files.is_none()
            && self.status.is_none()
            && self.modernization_score.is_none()
            && self.overall_severity.is_none()
            && self.result_data.is_none()
            && self.error_message.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips_through_strum() {
        assert_eq!(AnalysisStatus::InProgress.to_string(), "in_progress");
        assert_eq!("failed".parse::<AnalysisStatus>().unwrap(), AnalysisStatus::Failed);
    }

    #[test]
    fn kind_uses_kebab_case() {
        assert_eq!(AnalysisKind::GithubDependencies.as_ref(), "github-dependencies");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!AnalysisStatus::InProgress.is_terminal());
        assert!(AnalysisStatus::Completed.is_terminal());
        assert!(AnalysisStatus::Failed.is_terminal());
    }
}
