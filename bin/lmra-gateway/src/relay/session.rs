//! Per-request throughput bookkeeping for a streaming chat.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use utoipa::ToSchema;

/// Estimated token count for `text`: `ceil(words × 1.3)`.
///
/// This is a heuristic, not a tokenizer. It only exists to give clients a
/// live throughput figure while the runner has not reported `eval_count`.
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    (words * 13).div_ceil(10)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Seconds with two decimals, as sent on the wire (`"1.00"`).
pub fn format_secs(elapsed: Duration) -> String {
    format!("{:.2}", elapsed.as_secs_f64())
}

fn rate(tokens: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if tokens == 0 || secs <= 0.0 {
        return 0.0;
    }
    round2(tokens as f64 / secs)
}

/// Metrics attached to every relayed fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentMetrics {
    pub tokens: u64,
    /// Seconds since the first fragment.
    pub duration: String,
    pub mean_tokens_per_second: f64,
    pub current_tokens_per_second: f64,
}

/// Metrics attached to the terminating `done` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMetrics {
    pub tokens: u64,
    /// Seconds since the request arrived.
    pub duration: String,
    pub mean_tokens_per_second: f64,
}

/// Metrics of a blocking chat call.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneShotMetrics {
    pub tokens: u64,
    pub duration: String,
    pub tokens_per_second: f64,
}

impl OneShotMetrics {
    pub fn new(tokens: u64, elapsed: Duration) -> Self {
        Self {
            tokens,
            duration: format_secs(elapsed),
            tokens_per_second: rate(tokens, elapsed),
        }
    }
}

/// Accumulator and rate state owned by exactly one streaming request.
#[derive(Debug)]
pub struct ChatStreamSession {
    accumulated: String,
    request_started: Instant,
    first_fragment: Option<Instant>,
    previous_fragment: Option<Instant>,
    previous_tokens: u64,
}

impl ChatStreamSession {
    pub fn new(request_started: Instant) -> Self {
        Self {
            accumulated: String::new(),
            request_started,
            first_fragment: None,
            previous_fragment: None,
            previous_tokens: 0,
        }
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Record a fragment received at `now` and compute its metrics.
    pub fn push(&mut self, fragment: &str, now: Instant) -> FragmentMetrics {
        self.accumulated.push_str(fragment);
        let first = *self.first_fragment.get_or_insert(now);
        let previous = self.previous_fragment.unwrap_or(first);

        let tokens = estimate_tokens(&self.accumulated);
        let since_first = now.saturating_duration_since(first);
        let new_tokens = tokens.saturating_sub(self.previous_tokens);
        let current = rate(new_tokens, now.saturating_duration_since(previous));

        self.previous_fragment = Some(now);
        self.previous_tokens = tokens;

        FragmentMetrics {
            tokens,
            duration: format_secs(since_first),
            mean_tokens_per_second: rate(tokens, since_first),
            current_tokens_per_second: current,
        }
    }

    /// Metrics for the `done` event. A missing or zero `eval_count` falls
    /// back to the word-count estimate.
    pub fn finish(&self, eval_count: Option<u64>, now: Instant) -> FinalMetrics {
        let tokens = eval_count
            .filter(|&n| n > 0)
            .unwrap_or_else(|| estimate_tokens(&self.accumulated));
        let elapsed = now.saturating_duration_since(self.request_started);
        FinalMetrics {
            tokens,
            duration: format_secs(elapsed),
            mean_tokens_per_second: rate(tokens, elapsed),
        }
    }
}
