//! Staged repository analysis.
//!
//! A codebase run moves through `created → listing-files → sampling-files →
//! prompting-model → parsing-result → completed`, or to `failed` from any
//! stage.  Each run owns one `analysis_history` row, created at the start
//! and updated in place; a [`RunGuard`] marks the row failed if the run is
//! dropped before it reaches a terminal state.
//!
//! Streaming callers get [`ProgressEvent`]s through [`spawn_streaming`];
//! synchronous callers use a silent [`ProgressReporter`].

pub mod dependencies;
pub mod filter;
pub mod parse;
pub mod progress;
pub mod prompt;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lmra_fetch::{FetchError, RepoRef, RepoSource, TreeEntry};
use lmra_ollama::{ChatMessage, ModelService};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::entities::{AnalysisKind, AnalysisStatus, AnalysisStore, AnalysisUpdate, NewAnalysis};
use crate::error::ServerError;

use filter::{detect_language, normalize_language, supported_languages, truncate_at_char_boundary, FileFilter};
use parse::parse_model_output;
use progress::{EventKind, ProgressEvent, ProgressReporter, RunState};
use prompt::FileSample;

pub const DEFAULT_MAX_FILES: usize = 30;
pub const MAX_FILES_LIMIT: usize = 100;
/// Files fetched per run, never more than `maxFiles`.
pub const SAMPLE_CAP: usize = 20;
/// Bytes kept of each fetched file.
pub const SAMPLE_BYTES: usize = 10_000;
/// Bound on the single model call of an analysis.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(300);

pub const NO_FILES_MESSAGE: &str = "No files found matching criteria";

/// Input of a codebase analysis, as received.
#[derive(Debug, Clone, Default)]
pub struct CodebaseRequest {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub language: Option<String>,
    pub file_extensions: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub max_files: Option<usize>,
    pub model: Option<String>,
}

/// A validated codebase request.  Building one makes no external call.
#[derive(Debug, Clone)]
pub struct CodebasePlan {
    repo_url: String,
    repo: RepoRef,
    branch: Option<String>,
    language: Option<&'static str>,
    filter: FileFilter,
    max_files: usize,
    model: String,
    query: Value,
}

impl CodebasePlan {
    pub fn new(req: CodebaseRequest, default_model: &str) -> Result<Self, ServerError> {
        let repo_url = req
            .repo_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServerError::BadRequest("Repository URL is required".into()))?
            .to_owned();
        let repo = RepoRef::parse(&repo_url)?;

        let language = match req.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => Some(normalize_language(label).ok_or_else(|| {
                ServerError::BadRequest(format!(
                    "Unsupported language '{label}'; expected one of: {}",
                    supported_languages().collect::<Vec<_>>().join(", ")
                ))
            })?),
            None => None,
        };

        let max_files = req
            .max_files
            .unwrap_or(DEFAULT_MAX_FILES)
            .clamp(1, MAX_FILES_LIMIT);
        let branch = req
            .branch
            .filter(|b| !b.trim().is_empty())
            .or_else(|| repo.branch.clone());
        let model = req
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_owned());

        let query = json!({
            "repoUrl": repo_url,
            "branch": branch,
            "language": language,
            "fileExtensions": req.file_extensions,
            "excludePaths": req.exclude_paths,
            "maxFiles": max_files,
            "model": model,
        });

        Ok(Self {
            filter: FileFilter::new(language, &req.file_extensions, &req.exclude_paths),
            repo_url,
            repo,
            branch,
            language,
            max_files,
            model,
            query,
        })
    }
}

/// Marks a run failed if dropped while still armed.  A run that already
/// reached a terminal state is left alone.
pub struct RunGuard<S: AnalysisStore> {
    store: Arc<S>,
    id: i64,
    armed: bool,
}

impl<S: AnalysisStore> RunGuard<S> {
    pub fn new(store: Arc<S>, id: i64) -> Self {
        Self {
            store,
            id,
            armed: true,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S: AnalysisStore> Drop for RunGuard<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id;
        warn!(analysis_id = id, "analysis abandoned before completion");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::clone(&self.store);
        handle.spawn(async move {
            match store.fail_if_in_progress(id, "client disconnected").await {
                Ok(true) => {}
                Ok(false) => debug!(analysis_id = id, "abandoned analysis had already finished"),
                Err(e) => warn!(analysis_id = id, error = %e, "failed to mark abandoned analysis"),
            }
        });
    }
}

/// Insert the run row and announce it.
pub(crate) async fn begin_run<S: AnalysisStore>(
    store: &Arc<S>,
    run: NewAnalysis,
    reporter: &mut ProgressReporter,
    message: impl Into<String>,
) -> Result<RunGuard<S>, ServerError> {
    let kind = run.kind;
    let id = match store.start_analysis(run).await {
        Ok(id) => id,
        Err(e) => {
            let e = ServerError::from(e);
            warn!(kind = %kind, error = %e, "could not record analysis run");
            reporter
                .emit(ProgressEvent::new(EventKind::Error, RunState::Failed, e.client_message()))
                .await;
            reporter
                .emit(ProgressEvent::new(EventKind::Done, RunState::Failed, "Analysis finished with errors"))
                .await;
            return Err(e);
        }
    };
    info!(analysis_id = id, kind = %kind, "analysis started");
    reporter.set_analysis_id(id);
    reporter
        .emit(ProgressEvent::new(EventKind::Started, RunState::Created, message).percent(0))
        .await;
    Ok(RunGuard::new(Arc::clone(store), id))
}

/// Record the terminal state of a run and emit the closing events.
///
/// On success the `completed` row is expected to be written already.
pub(crate) async fn end_run<S: AnalysisStore>(
    store: &Arc<S>,
    guard: RunGuard<S>,
    reporter: &mut ProgressReporter,
    outcome: Result<Value, ServerError>,
) -> Result<Value, ServerError> {
    let id = guard.id();
    match &outcome {
        Ok(payload) => {
            guard.disarm();
            info!(analysis_id = id, "analysis completed");
            reporter
                .emit(
                    ProgressEvent::new(EventKind::Result, RunState::Completed, "Analysis complete")
                        .percent(100)
                        .result(payload.clone()),
                )
                .await;
            reporter
                .emit(ProgressEvent::new(EventKind::Done, RunState::Completed, "Done").percent(100))
                .await;
        }
        Err(e) => {
            let message = e.client_message();
            if let Err(db) = store
                .update_analysis(id, AnalysisUpdate::failed(message.clone()))
                .await
            {
                warn!(analysis_id = id, error = %db, "failed to record analysis failure");
            }
            guard.disarm();
            warn!(analysis_id = id, error = %e, "analysis failed");
            reporter
                .emit(ProgressEvent::new(EventKind::Error, RunState::Failed, message))
                .await;
            reporter
                .emit(ProgressEvent::new(EventKind::Done, RunState::Failed, "Analysis finished with errors"))
                .await;
        }
    }
    outcome
}

/// Run `work` on a background task and expose its events as a stream.
///
/// When the stream's receiver is dropped (the client went away) the task
/// drops `work` at its next suspension point.
pub fn spawn_streaming<F, Fut>(work: F) -> ReceiverStream<ProgressEvent>
where
    F: FnOnce(ProgressReporter) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    let watcher = tx.clone();
    let fut = work(ProgressReporter::channel(tx));
    tokio::spawn(async move {
        tokio::select! {
            _ = fut => {}
            _ = watcher.closed() => debug!("event stream closed by client; analysis dropped"),
        }
    });
    ReceiverStream::new(rx)
}

/// Orchestrates analysis runs against a store, a repository host and a model.
pub struct Pipeline<S: AnalysisStore> {
    store: Arc<S>,
    repos: Arc<dyn RepoSource>,
    model: Arc<dyn ModelService>,
}

impl<S: AnalysisStore> Clone for Pipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            repos: Arc::clone(&self.repos),
            model: Arc::clone(&self.model),
        }
    }
}

impl<S: AnalysisStore> Pipeline<S> {
    pub fn new(store: Arc<S>, repos: Arc<dyn RepoSource>, model: Arc<dyn ModelService>) -> Self {
        Self { store, repos, model }
    }

    /// Analyze a repository's code.  Returns the client payload; the run
    /// row reflects the outcome either way.
    pub async fn analyze_codebase(
        &self,
        plan: CodebasePlan,
        reporter: &mut ProgressReporter,
    ) -> Result<Value, ServerError> {
        let run = NewAnalysis {
            repository_url: Some(plan.repo_url.clone()),
            branch: plan.branch.clone(),
            kind: AnalysisKind::Codebase,
            language: plan.language.map(str::to_owned),
            query_parameters: Some(plan.query.clone()),
        };
        let guard = begin_run(
            &self.store,
            run,
            reporter,
            format!("Starting analysis of {}", plan.repo.full_name()),
        )
        .await?;
        let outcome = self.codebase_stages(&plan, guard.id(), reporter).await;
        end_run(&self.store, guard, reporter, outcome).await
    }

    pub(crate) async fn resolve_branch(
        &self,
        repo: &RepoRef,
        requested: Option<&str>,
    ) -> Result<String, ServerError> {
        match requested {
            Some(b) => Ok(b.to_owned()),
            None => Ok(self.repos.default_branch(repo).await?),
        }
    }

    async fn codebase_stages(
        &self,
        plan: &CodebasePlan,
        id: i64,
        reporter: &mut ProgressReporter,
    ) -> Result<Value, ServerError> {
        // listing-files
        reporter
            .progress(RunState::ListingFiles, 5, "Resolving branch")
            .await;
        let branch = self.resolve_branch(&plan.repo, plan.branch.as_deref()).await?;
        reporter
            .progress(
                RunState::ListingFiles,
                10,
                format!("Listing files of {} on {branch}", plan.repo.full_name()),
            )
            .await;
        let tree = self.repos.list_tree(&plan.repo, &branch).await?;
        let selected = plan.filter.select(&tree, plan.max_files);
        debug!(listed = tree.len(), selected = selected.len(), "tree filtered");
        self.store
            .update_analysis(
                id,
                AnalysisUpdate {
                    branch: Some(branch.clone()),
                    ..AnalysisUpdate::default()
                },
            )
            .await?;
        if selected.is_empty() {
            return Err(ServerError::NotFound(NO_FILES_MESSAGE.into()));
        }
        reporter
            .emit(
                ProgressEvent::new(
                    EventKind::Progress,
                    RunState::ListingFiles,
                    format!("Found {} matching files", selected.len()),
                )
                .percent(20),
            )
            .await;

        // sampling-files
        let samples = self.sample_files(&plan.repo, &selected, reporter).await?;
        if samples.is_empty() {
            return Err(ServerError::NotFound(
                "Could not read any of the matching files".into(),
            ));
        }
        let processed: Vec<String> = samples.iter().map(|s| s.path.clone()).collect();
        let languages = prompt::languages(&samples);
        self.store
            .update_analysis(
                id,
                AnalysisUpdate {
                    files_analyzed: Some(samples.len() as i64),
                    processed_files: Some(processed.clone()),
                    ..AnalysisUpdate::default()
                },
            )
            .await?;

        // prompting-model
        reporter
            .progress(
                RunState::PromptingModel,
                65,
                format!("Analyzing {} files with {}", samples.len(), plan.model),
            )
            .await;
        let prompt = prompt::codebase_prompt(&plan.repo.full_name(), &branch, &samples);
        let answer = self
            .model
            .chat(&plan.model, &[ChatMessage::user(prompt)], ANALYSIS_TIMEOUT)
            .await
            .map_err(|e| ServerError::upstream("Failed to analyze codebase", e))?;

        // parsing-result
        reporter
            .progress(RunState::ParsingResult, 90, "Parsing analysis")
            .await;
        let verdict = parse_model_output(&answer.message.content);
        if !verdict.is_structured() {
            warn!(analysis_id = id, "model answer is not JSON; returning raw text");
        }
        let score = verdict.score();
        let severity = verdict.severity();

        let mut meta = Map::new();
        meta.insert("repository".into(), plan.repo.html_url().into());
        meta.insert("branch".into(), branch.into());
        meta.insert("filesAnalyzed".into(), samples.len().into());
        meta.insert("processedFiles".into(), json!(processed));
        meta.insert("languages".into(), json!(languages));
        meta.insert("model".into(), answer.model.into());
        meta.insert("analysisId".into(), id.into());
        let payload = verdict.into_payload(meta);

        self.store
            .update_analysis(
                id,
                AnalysisUpdate {
                    status: Some(AnalysisStatus::Completed),
                    modernization_score: score,
                    overall_severity: severity.map(|s| s.as_ref().to_owned()),
                    result_data: Some(payload.clone()),
                    ..AnalysisUpdate::default()
                },
            )
            .await?;
        Ok(payload)
    }

    /// Fetch up to [`SAMPLE_CAP`] files in listing order.  A failed fetch
    /// skips the file, except an exhausted rate limit which ends the run.
    async fn sample_files(
        &self,
        repo: &RepoRef,
        selected: &[TreeEntry],
        reporter: &mut ProgressReporter,
    ) -> Result<Vec<FileSample>, ServerError> {
        let batch = &selected[..selected.len().min(SAMPLE_CAP)];
        let total = batch.len();
        let mut samples = Vec::with_capacity(total);

        for (i, entry) in batch.iter().enumerate() {
            let percent = 20 + (40 * i / total) as u8;
            reporter
                .emit(
                    ProgressEvent::new(
                        EventKind::Progress,
                        RunState::SamplingFiles,
                        format!("Fetching {}", entry.path),
                    )
                    .percent(percent)
                    .file(entry.path.clone(), i, total),
                )
                .await;

            match self.repos.fetch_blob(repo, entry).await {
                Ok(content) => samples.push(FileSample {
                    path: entry.path.clone(),
                    language: detect_language(&entry.path).unwrap_or("other"),
                    content: truncate_at_char_boundary(&content, SAMPLE_BYTES).to_owned(),
                }),
                Err(FetchError::RateLimited) => return Err(FetchError::RateLimited.into()),
                Err(e) => warn!(path = %entry.path, error = %e, "skipping file that could not be fetched"),
            }
        }

        reporter
            .emit(
                ProgressEvent::new(
                    EventKind::Progress,
                    RunState::SamplingFiles,
                    format!("Fetched {} of {} files", samples.len(), total),
                )
                .percent(60),
            )
            .await;
        Ok(samples)
    }
}
