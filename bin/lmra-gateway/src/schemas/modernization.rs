//! Request / response types for `/api/modernization`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pipeline::CodebaseRequest;

/// Request body for `POST /api/modernization/modernize`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModernizeRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    /// e.g. `"Java 17"`; "modern version" when omitted.
    #[serde(default)]
    pub target_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecommendationsResponse {
    pub recommendations: String,
    pub model: String,
}

/// Request body for `POST /api/modernization/compare-patterns`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparePatternsRequest {
    #[serde(default)]
    pub old_pattern: String,
    #[serde(default)]
    pub new_pattern: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComparisonResponse {
    pub comparison: String,
    pub model: String,
}

/// Request body for `POST /api/modernization/analyze-codebase`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCodebaseRequest {
    /// `https://github.com/owner/repo[/tree/branch]` or `owner/repo`.
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    /// Restricts sampling to this language's extensions.
    #[serde(default)]
    pub language: Option<String>,
    /// Explicit extension allow-list; overrides `language`.
    #[serde(default)]
    pub file_extensions: Vec<String>,
    /// Extra directories to skip, on top of the built-in list.
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    /// Default 30, at most 100.
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default)]
    pub model: Option<String>,
    /// When `true`, progress is streamed as named SSE events.
    #[serde(default)]
    pub stream: bool,
}

impl From<AnalyzeCodebaseRequest> for CodebaseRequest {
    fn from(req: AnalyzeCodebaseRequest) -> Self {
        CodebaseRequest {
            repo_url: req.repo_url,
            branch: req.branch,
            language: req.language,
            file_extensions: req.file_extensions,
            exclude_paths: req.exclude_paths,
            max_files: req.max_files,
            model: req.model,
        }
    }
}

/// Request body for `POST /api/modernization/analyze-dependencies`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AnalyzeDependenciesRequest {
    /// Package name → version.
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Request body for `POST /api/modernization/analyze-dependencies-github`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeGithubDependenciesRequest {
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    /// Only manifests below this directory are considered.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stream: bool,
}
