//! Progress events of an analysis run and the reporter that emits them.

use axum::response::sse::Event;
use serde::Serialize;
use serde_json::Value;
use strum::{AsRefStr, Display};
use tokio::sync::mpsc;
use tracing::debug;

/// SSE event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Started,
    Progress,
    Result,
    Done,
    Error,
}

/// Pipeline state a run is in when an event is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunState {
    Created,
    ListingFiles,
    SamplingFiles,
    PromptingModel,
    ParsingResult,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(skip)]
    pub kind: EventKind,
    pub stage: RunState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, stage: RunState, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
            percent: None,
            current_file: None,
            processed: None,
            total: None,
            analysis_id: None,
            result: None,
        }
    }

    pub fn percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent.min(100));
        self
    }

    pub fn file(mut self, path: impl Into<String>, processed: usize, total: usize) -> Self {
        self.current_file = Some(path.into());
        self.processed = Some(processed);
        self.total = Some(total);
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn into_sse(self) -> Event {
        let data = serde_json::to_string(&self)
            .unwrap_or_else(|e| serde_json::json!({ "message": e.to_string() }).to_string());
        Event::default().event(self.kind.as_ref()).data(data)
    }
}

/// Emits events for one run, in order, with a non-decreasing percent.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    percent: u8,
    analysis_id: Option<i64>,
}

impl ProgressReporter {
    pub fn channel(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            percent: 0,
            analysis_id: None,
        }
    }

    /// A reporter for synchronous requests; events are only logged.
    pub fn silent() -> Self {
        Self {
            tx: None,
            percent: 0,
            analysis_id: None,
        }
    }

    pub fn set_analysis_id(&mut self, id: i64) {
        self.analysis_id = Some(id);
    }

    pub async fn emit(&mut self, mut event: ProgressEvent) {
        if let Some(p) = event.percent {
            self.percent = self.percent.max(p);
            event.percent = Some(self.percent);
        }
        if event.analysis_id.is_none() {
            event.analysis_id = self.analysis_id;
        }
        debug!(
            kind = %event.kind,
            stage = %event.stage,
            percent = ?event.percent,
            "{}",
            event.message
        );
        if let Some(tx) = &self.tx {
            // A closed channel means the client left; the caller notices separately.
            let _ = tx.send(event).await;
        }
    }

    pub async fn progress(&mut self, stage: RunState, percent: u8, message: impl Into<String>) {
        self.emit(ProgressEvent::new(EventKind::Progress, stage, message).percent(percent))
            .await;
    }
}
