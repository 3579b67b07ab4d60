//! SSE relay of a streaming chat completion.
//!
//! One upstream stream is opened per request.  Every fragment is forwarded
//! as a `data:` event together with throughput figures tracked by a
//! [`ChatStreamSession`]; the upstream `done` line becomes a final
//! `{"done": true, ...}` event and any failure becomes `{"error": ...}`.
//! Dropping the returned stream drops the upstream body with it.

pub mod session;

pub use session::{estimate_tokens, ChatStreamSession, OneShotMetrics};

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use lmra_ollama::{ChatMessage, ModelService};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};

fn data_event(value: serde_json::Value) -> Event {
    Event::default().data(value.to_string())
}

fn error_event(message: impl std::fmt::Display) -> Event {
    data_event(json!({ "error": message.to_string() }))
}

/// Relay `messages` to `model_name` as a stream of SSE events.
///
/// `request_started` is when the HTTP request arrived; the final event's
/// duration is measured from it.
pub fn relay_chat(
    model: Arc<dyn ModelService>,
    model_name: String,
    messages: Vec<ChatMessage>,
    request_started: Instant,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        let mut session = ChatStreamSession::new(request_started);

        let mut upstream = match model.chat_stream(&model_name, &messages).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(model = %model_name, error = %e, "failed to open chat stream");
                yield Ok(error_event(e));
                return;
            }
        };

        while let Some(item) = upstream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(model = %model_name, error = %e, "chat stream failed");
                    yield Ok(error_event(e));
                    return;
                }
            };

            if let Some(text) = chunk.fragment() {
                let metrics = session.push(text, Instant::now());
                yield Ok(data_event(json!({ "chunk": text, "metrics": metrics })));
            }

            if chunk.done {
                let metrics = session.finish(chunk.eval_count, Instant::now());
                debug!(tokens = metrics.tokens, duration = %metrics.duration, "chat stream finished");
                yield Ok(data_event(json!({
                    "done": true,
                    "response": session.accumulated(),
                    "metrics": metrics,
                })));
                return;
            }
        }

        // Upstream closed without a done line; nothing more to report.
        debug!(model = %model_name, "chat stream ended without completion marker");
    }
}
