//! Dependency analysis: from a caller-supplied list, or from the manifest
//! files of a GitHub repository.

use std::collections::BTreeMap;

use lmra_fetch::{FetchError, RepoRef, TreeEntry};
use lmra_ollama::ChatMessage;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::filter::{normalize_language, FileFilter};
use super::parse::{parse_model_output, ModelVerdict};
use super::progress::{EventKind, ProgressEvent, ProgressReporter, RunState};
use super::{begin_run, end_run, prompt, Pipeline, ANALYSIS_TIMEOUT};
use crate::entities::{AnalysisKind, AnalysisStatus, AnalysisStore, AnalysisUpdate, NewAnalysis};
use crate::error::ServerError;
use crate::manifest::{parser_for, Dependencies, ManifestParser};

/// Manifests fetched per repository.
pub const MAX_MANIFESTS: usize = 10;

pub const NO_MANIFESTS_MESSAGE: &str = "No dependency files found in repository";
pub const NO_DEPENDENCIES_MESSAGE: &str = "No dependencies found in dependency files";

/// A caller-supplied dependency list.
#[derive(Debug, Clone)]
pub struct DependencyPlan {
    dependencies: Dependencies,
    language: String,
    model: String,
}

impl DependencyPlan {
    pub fn new(
        dependencies: Option<Dependencies>,
        language: Option<String>,
        model: Option<String>,
        default_model: &str,
    ) -> Result<Self, ServerError> {
        let dependencies = dependencies
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ServerError::BadRequest("Dependencies are required".into()))?;
        let language = language
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ServerError::BadRequest("Language is required".into()))?;
        let language = normalize_language(&language)
            .map(str::to_owned)
            .unwrap_or(language);
        Ok(Self {
            dependencies,
            language,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_owned()),
        })
    }
}

/// A repository whose manifests should be analyzed.
#[derive(Debug, Clone)]
pub struct GithubDependencyPlan {
    repo_url: String,
    repo: RepoRef,
    branch: Option<String>,
    path: Option<String>,
    model: String,
}

impl GithubDependencyPlan {
    pub fn new(
        repo_url: Option<String>,
        branch: Option<String>,
        path: Option<String>,
        model: Option<String>,
        default_model: &str,
    ) -> Result<Self, ServerError> {
        let repo_url = repo_url
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServerError::BadRequest("Repository URL is required".into()))?;
        let repo = RepoRef::parse(&repo_url)?;
        let branch = branch
            .filter(|b| !b.trim().is_empty())
            .or_else(|| repo.branch.clone());
        let path = path
            .map(|p| p.trim().trim_matches('/').to_owned())
            .filter(|p| !p.is_empty());
        Ok(Self {
            repo_url,
            repo,
            branch,
            path,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_owned()),
        })
    }

    fn in_scope(&self, entry: &TreeEntry) -> bool {
        match &self.path {
            Some(dir) => entry.path.starts_with(&format!("{dir}/")),
            None => true,
        }
    }
}

/// Manifest entries under the plan's path, outside excluded directories.
fn select_manifests(plan: &GithubDependencyPlan, tree: &[TreeEntry]) -> Vec<(TreeEntry, &'static dyn ManifestParser)> {
    let excludes = FileFilter::new(None, &[], &[]);
    tree.iter()
        .filter(|e| plan.in_scope(e) && !excludes.is_excluded(&e.path))
        .filter_map(|e| parser_for(e.file_name()).map(|p| (e.clone(), p)))
        .take(MAX_MANIFESTS)
        .collect()
}

fn completed_update(verdict: &ModelVerdict, files: Vec<String>, payload: &Value) -> AnalysisUpdate {
    AnalysisUpdate {
        files_analyzed: Some(files.len() as i64),
        processed_files: Some(files),
        status: Some(AnalysisStatus::Completed),
        modernization_score: verdict.score(),
        overall_severity: verdict.severity().map(|s| s.as_ref().to_owned()),
        result_data: Some(payload.clone()),
        ..AnalysisUpdate::default()
    }
}

impl<S: AnalysisStore> Pipeline<S> {
    pub async fn analyze_dependencies(
        &self,
        plan: DependencyPlan,
        reporter: &mut ProgressReporter,
    ) -> Result<Value, ServerError> {
        let run = NewAnalysis {
            repository_url: None,
            branch: None,
            kind: AnalysisKind::Dependencies,
            language: Some(plan.language.clone()),
            query_parameters: Some(json!({
                "dependencies": plan.dependencies,
                "language": plan.language,
                "model": plan.model,
            })),
        };
        let guard = begin_run(
            &self.store,
            run,
            reporter,
            format!("Analyzing {} dependencies", plan.dependencies.len()),
        )
        .await?;
        let outcome = self.dependency_stages(&plan, guard.id(), reporter).await;
        end_run(&self.store, guard, reporter, outcome).await
    }

    async fn dependency_stages(
        &self,
        plan: &DependencyPlan,
        id: i64,
        reporter: &mut ProgressReporter,
    ) -> Result<Value, ServerError> {
        reporter
            .progress(RunState::PromptingModel, 30, "Consulting the model")
            .await;
        let prompt = prompt::dependency_prompt(&plan.language, None, &plan.dependencies);
        let answer = self
            .model
            .chat(&plan.model, &[ChatMessage::user(prompt)], ANALYSIS_TIMEOUT)
            .await
            .map_err(|e| ServerError::upstream("Failed to analyze dependencies", e))?;

        reporter
            .progress(RunState::ParsingResult, 90, "Parsing analysis")
            .await;
        let verdict = parse_model_output(&answer.message.content);
        let mut meta = Map::new();
        meta.insert("language".into(), plan.language.clone().into());
        meta.insert("model".into(), answer.model.into());
        meta.insert("analysisId".into(), id.into());
        let payload = verdict.clone().into_payload(meta);

        let names: Vec<String> = plan.dependencies.keys().cloned().collect();
        self.store
            .update_analysis(id, completed_update(&verdict, names, &payload))
            .await?;
        Ok(payload)
    }

    pub async fn analyze_github_dependencies(
        &self,
        plan: GithubDependencyPlan,
        reporter: &mut ProgressReporter,
    ) -> Result<Value, ServerError> {
        let run = NewAnalysis {
            repository_url: Some(plan.repo_url.clone()),
            branch: plan.branch.clone(),
            kind: AnalysisKind::GithubDependencies,
            language: None,
            query_parameters: Some(json!({
                "repoUrl": plan.repo_url,
                "branch": plan.branch,
                "path": plan.path,
                "model": plan.model,
            })),
        };
        let guard = begin_run(
            &self.store,
            run,
            reporter,
            format!("Looking for dependency files in {}", plan.repo.full_name()),
        )
        .await?;
        let outcome = self.github_dependency_stages(&plan, guard.id(), reporter).await;
        end_run(&self.store, guard, reporter, outcome).await
    }

    async fn github_dependency_stages(
        &self,
        plan: &GithubDependencyPlan,
        id: i64,
        reporter: &mut ProgressReporter,
    ) -> Result<Value, ServerError> {
        reporter
            .progress(RunState::ListingFiles, 10, "Listing repository files")
            .await;
        let branch = self.resolve_branch(&plan.repo, plan.branch.as_deref()).await?;
        let tree = self.repos.list_tree(&plan.repo, &branch).await?;
        let manifests = select_manifests(plan, &tree);
        self.store
            .update_analysis(
                id,
                AnalysisUpdate {
                    branch: Some(branch.clone()),
                    ..AnalysisUpdate::default()
                },
            )
            .await?;
        if manifests.is_empty() {
            return Err(ServerError::NotFound(NO_MANIFESTS_MESSAGE.into()));
        }

        let total = manifests.len();
        let mut dependencies = Dependencies::new();
        let mut dependency_files = Vec::new();
        // Ecosystem of the first manifest that yielded anything.
        let mut ecosystem: Option<&'static dyn ManifestParser> = None;

        for (i, (entry, parser)) in manifests.iter().enumerate() {
            reporter
                .emit(
                    ProgressEvent::new(
                        EventKind::Progress,
                        RunState::SamplingFiles,
                        format!("Reading {}", entry.path),
                    )
                    .percent(20 + (40 * i / total) as u8)
                    .file(entry.path.clone(), i, total),
                )
                .await;

            let content = match self.repos.fetch_blob(&plan.repo, entry).await {
                Ok(c) => c,
                Err(FetchError::RateLimited) => return Err(FetchError::RateLimited.into()),
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "skipping unreadable dependency file");
                    continue;
                }
            };
            match parser.parse(&content) {
                Ok(found) => {
                    debug!(path = %entry.path, count = found.len(), "dependency file parsed");
                    dependency_files.push(entry.path.clone());
                    if !found.is_empty() && ecosystem.is_none() {
                        ecosystem = Some(*parser);
                    }
                    dependencies.extend(found);
                }
                Err(e) => warn!(path = %entry.path, error = %e, "skipping unparsable dependency file"),
            }
        }

        let Some(ecosystem) = ecosystem else {
            return Err(ServerError::NotFound(NO_DEPENDENCIES_MESSAGE.into()));
        };

        reporter
            .progress(
                RunState::PromptingModel,
                65,
                format!("Analyzing {} dependencies with {}", dependencies.len(), plan.model),
            )
            .await;
        let prompt = prompt::dependency_prompt(
            ecosystem.language(),
            Some(ecosystem.package_manager()),
            &dependencies,
        );
        let answer = self
            .model
            .chat(&plan.model, &[ChatMessage::user(prompt)], ANALYSIS_TIMEOUT)
            .await
            .map_err(|e| ServerError::upstream("Failed to analyze dependencies", e))?;

        reporter
            .progress(RunState::ParsingResult, 90, "Parsing analysis")
            .await;
        let verdict = parse_model_output(&answer.message.content);
        let mut meta = Map::new();
        meta.insert("repository".into(), plan.repo.html_url().into());
        meta.insert("branch".into(), branch.into());
        meta.insert("dependencyFiles".into(), json!(dependency_files));
        meta.insert("language".into(), ecosystem.language().into());
        meta.insert("packageManager".into(), ecosystem.package_manager().into());
        meta.insert("model".into(), answer.model.into());
        meta.insert("analysisId".into(), id.into());
        let payload = verdict.clone().into_payload(meta);

        self.store
            .update_analysis(id, completed_update(&verdict, dependency_files, &payload))
            .await?;
        Ok(payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{memory_store, StubModel, StubRepo};
    use std::sync::Arc;

    const ANSWER: &str = "```json\n{\"modernizationScore\": 40, \"overallSeverity\": \"high\", \"analysis\": {\"totalDependencies\": 2}}\n```";

    #[test]
    fn manual_plan_requires_input() {
        assert!(DependencyPlan::new(None, Some("java".into()), None, "llama3").is_err());
        assert!(DependencyPlan::new(Some(Dependencies::new()), Some("java".into()), None, "llama3").is_err());
        let deps = Dependencies::from([("junit".to_string(), "3.8".to_string())]);
        assert!(DependencyPlan::new(Some(deps), None, None, "llama3").is_err());
    }

    #[tokio::test]
    async fn manual_list_is_persisted() {
        let store = memory_store().await;
        let model = Arc::new(StubModel::replying(ANSWER));
        let p = Pipeline::new(store.clone(), Arc::new(StubRepo::with_files(&[])), model.clone());
        let deps = Dependencies::from([
            ("express".to_string(), "4.16.0".to_string()),
            ("lodash".to_string(), "4.17.4".to_string()),
        ]);
        let plan = DependencyPlan::new(Some(deps), Some("JS".into()), None, "llama3").unwrap();
        let payload = p
            .analyze_dependencies(plan, &mut ProgressReporter::silent())
            .await
            .unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["language"], "javascript");
        assert!(model.last_prompt().unwrap().contains("- lodash: 4.17.4"));

        let rec = store
            .get_analysis(payload["analysisId"].as_i64().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.analysis_type, "dependencies");
        assert_eq!(rec.overall_severity.as_deref(), Some("high"));
        assert_eq!(rec.status, AnalysisStatus::Completed);
    }

    #[tokio::test]
    async fn manifests_are_found_and_parsed() {
        let store = memory_store().await;
        let repo = Arc::new(StubRepo::with_files(&[
            ("README.md", "docs"),
            ("backend/requirements.txt", "Django==1.11\nrequests==2.9.0\n"),
            ("frontend/node_modules/x/package.json", "{}"),
        ]));
        let model = Arc::new(StubModel::replying(ANSWER));
        let p = Pipeline::new(store.clone(), repo, model.clone());
        let plan =
            GithubDependencyPlan::new(Some("octo/legacy".into()), None, None, None, "llama3").unwrap();
        let payload = p
            .analyze_github_dependencies(plan, &mut ProgressReporter::silent())
            .await
            .unwrap();

        assert_eq!(payload["dependencyFiles"], json!(["backend/requirements.txt"]));
        assert_eq!(payload["language"], "python");
        assert_eq!(payload["packageManager"], "pip");
        assert!(model.last_prompt().unwrap().contains("- Django: 1.11"));

        let rec = store
            .get_analysis(payload["analysisId"].as_i64().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.analysis_type, "github-dependencies");
        assert_eq!(rec.files_analyzed, Some(1));
    }

    #[tokio::test]
    async fn path_limits_the_search() {
        let store = memory_store().await;
        let repo = Arc::new(StubRepo::with_files(&[
            ("backend/requirements.txt", "Django==1.11\n"),
            ("web/package.json", r#"{"dependencies":{"react":"15.0.0"}}"#),
        ]));
        let p = Pipeline::new(store, repo, Arc::new(StubModel::replying(ANSWER)));
        let plan = GithubDependencyPlan::new(
            Some("octo/legacy".into()),
            None,
            Some("/web/".into()),
            None,
            "llama3",
        )
        .unwrap();
        let payload = p
            .analyze_github_dependencies(plan, &mut ProgressReporter::silent())
            .await
            .unwrap();
        assert_eq!(payload["packageManager"], "npm");
    }

    #[tokio::test]
    async fn no_manifest_is_not_found_without_model_call() {
        let store = memory_store().await;
        let model = Arc::new(StubModel::replying(ANSWER));
        let p = Pipeline::new(
            store.clone(),
            Arc::new(StubRepo::with_files(&[("main.py", "print(1)")])),
            model.clone(),
        );
        let plan =
            GithubDependencyPlan::new(Some("octo/legacy".into()), None, None, None, "llama3").unwrap();
        let err = p
            .analyze_github_dependencies(plan, &mut ProgressReporter::silent())
            .await
            .unwrap_err();
        assert!(matches!(&err, ServerError::NotFound(m) if m == NO_MANIFESTS_MESSAGE));
        assert_eq!(model.call_count(), 0);
        let runs = store.list_analyses(1, 0, Some("github-dependencies")).await.unwrap();
        assert_eq!(runs[0].status, AnalysisStatus::Failed);
    }

    #[tokio::test]
    async fn empty_manifests_are_not_found() {
        let store = memory_store().await;
        let p = Pipeline::new(
            store,
            Arc::new(StubRepo::with_files(&[("package.json", r#"{"name":"bare"}"#)])),
            Arc::new(StubModel::replying(ANSWER)),
        );
        let plan =
            GithubDependencyPlan::new(Some("octo/legacy".into()), None, None, None, "llama3").unwrap();
        let err = p
            .analyze_github_dependencies(plan, &mut ProgressReporter::silent())
            .await
            .unwrap_err();
        assert!(matches!(&err, ServerError::NotFound(m) if m == NO_DEPENDENCIES_MESSAGE));
    }
}
