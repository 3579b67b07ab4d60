//! In-memory stand-ins for the model runner and the repository host.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lmra_fetch::{FetchError, RepoRef, RepoSource, TreeEntry};
use lmra_ollama::{
    ChatChunk, ChatMessage, ChatResponse, ChunkStream, GenerateResponse, ModelService, OllamaError,
};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::AppState;

#[derive(Default)]
pub struct StubModel {
    pub reply: String,
    pub eval_count: Option<u64>,
    pub delay: Duration,
    /// Lines yielded by `chat_stream`; `Err` items end the stream with an error.
    pub chunks: Vec<Result<ChatChunk, String>>,
    /// Keep the chat stream open after `chunks` instead of ending it.
    pub hold_open: bool,
    /// Set once the last chat stream handed out is dropped.
    pub stream_dropped: Arc<AtomicBool>,
    /// When set, every call fails with this upstream body.
    pub fail: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl StubModel {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    pub fn failing(body: impl Into<String>) -> Self {
        Self {
            fail: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }

    async fn enter(&self, prompt: &str) -> Result<(), OllamaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_owned());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.fail {
            Some(body) => Err(OllamaError::Status {
                status: 503,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Chat stream that raises a flag when dropped.
struct TrackedStream {
    inner: ChunkStream,
    dropped: Arc<AtomicBool>,
}

impl Stream for TrackedStream {
    type Item = Result<ChatChunk, OllamaError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

pub fn fragment(text: &str) -> ChatChunk {
    ChatChunk {
        model: Some("llama3".into()),
        message: Some(ChatMessage {
            role: "assistant".into(),
            content: text.into(),
        }),
        ..ChatChunk::default()
    }
}

pub fn done_chunk(eval_count: Option<u64>) -> ChatChunk {
    ChatChunk {
        model: Some("llama3".into()),
        done: true,
        eval_count,
        ..ChatChunk::default()
    }
}

#[async_trait]
impl ModelService for StubModel {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _timeout: Duration,
    ) -> Result<ChatResponse, OllamaError> {
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        self.enter(prompt).await?;
        Ok(ChatResponse {
            model: model.to_owned(),
            message: ChatMessage {
                role: "assistant".into(),
                content: self.reply.clone(),
            },
            eval_count: self.eval_count,
        })
    }

    async fn chat_stream(
        &self,
        _model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, OllamaError> {
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        self.enter(prompt).await?;
        let items: Vec<Result<ChatChunk, OllamaError>> = self
            .chunks
            .iter()
            .map(|c| c.clone().map_err(OllamaError::Stream))
            .collect();
        let tail: ChunkStream = if self.hold_open {
            futures::stream::pending().boxed()
        } else {
            futures::stream::empty().boxed()
        };
        Ok(TrackedStream {
            inner: futures::stream::iter(items).chain(tail).boxed(),
            dropped: Arc::clone(&self.stream_dropped),
        }
        .boxed())
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        _timeout: Duration,
    ) -> Result<GenerateResponse, OllamaError> {
        self.enter(prompt).await?;
        Ok(GenerateResponse {
            model: model.to_owned(),
            response: self.reply.clone(),
            eval_count: self.eval_count,
        })
    }

    async fn list_models(&self) -> Result<serde_json::Value, OllamaError> {
        self.enter("").await?;
        Ok(serde_json::json!({ "models": [{ "name": "llama3:latest" }] }))
    }
}

/// Repository host serving a fixed tree.
pub struct StubRepo {
    pub default_branch: String,
    pub entries: Vec<TreeEntry>,
    pub contents: HashMap<String, String>,
    /// Paths whose blob fetch fails.
    pub broken: HashSet<String>,
    pub rate_limited: bool,
    pub tree_calls: AtomicUsize,
    pub branches_seen: Mutex<Vec<String>>,
}

impl StubRepo {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let entries = files
            .iter()
            .enumerate()
            .map(|(i, (path, body))| TreeEntry {
                path: (*path).to_owned(),
                sha: format!("sha{i}"),
                size: body.len() as u64,
            })
            .collect();
        let contents = files
            .iter()
            .map(|(p, b)| ((*p).to_owned(), (*b).to_owned()))
            .collect();
        Self {
            default_branch: "main".into(),
            entries,
            contents,
            broken: HashSet::new(),
            rate_limited: false,
            tree_calls: AtomicUsize::new(0),
            branches_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RepoSource for StubRepo {
    async fn default_branch(&self, _repo: &RepoRef) -> Result<String, FetchError> {
        if self.rate_limited {
            return Err(FetchError::RateLimited);
        }
        Ok(self.default_branch.clone())
    }

    async fn list_tree(&self, _repo: &RepoRef, branch: &str) -> Result<Vec<TreeEntry>, FetchError> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.branches_seen.lock() {
            seen.push(branch.to_owned());
        }
        if self.rate_limited {
            return Err(FetchError::RateLimited);
        }
        Ok(self.entries.clone())
    }

    async fn fetch_blob(&self, _repo: &RepoRef, entry: &TreeEntry) -> Result<String, FetchError> {
        if self.broken.contains(&entry.path) {
            return Err(FetchError::Status {
                status: 500,
                message: "blob unavailable".into(),
            });
        }
        self.contents
            .get(&entry.path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(entry.path.clone()))
    }
}

pub async fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap())
}

pub async fn app_state(model: Arc<StubModel>, repos: Arc<StubRepo>) -> Arc<AppState> {
    Arc::new(AppState {
        config: Arc::new(Config::default()),
        store: memory_store().await,
        model,
        repos,
    })
}
