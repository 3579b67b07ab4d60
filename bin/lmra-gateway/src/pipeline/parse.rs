//! Recovery of a JSON object from free-form model output.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use strum::{AsRefStr, EnumString};

pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse AI response as JSON";

/// What the model answered, once we tried to read it as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelVerdict {
    Structured(Map<String, Value>),
    /// No JSON object could be recovered; the text is kept verbatim.
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fence regex compiles")
    })
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Read `text` as a JSON object.
///
/// Tried in order: every fenced code block, the whole text, and the slice
/// between the first `{` and the last `}`.
pub fn parse_model_output(text: &str) -> ModelVerdict {
    let fenced = fence_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| as_object(m.as_str()));
    if let Some(map) = fenced {
        return ModelVerdict::Structured(map);
    }

    if let Some(map) = as_object(text) {
        return ModelVerdict::Structured(map);
    }

    let braces = text
        .find('{')
        .zip(text.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| as_object(&text[start..=end]));
    match braces {
        Some(map) => ModelVerdict::Structured(map),
        None => ModelVerdict::Raw(text.to_owned()),
    }
}

impl ModelVerdict {
    pub fn is_structured(&self) -> bool {
        matches!(self, ModelVerdict::Structured(_))
    }

    /// `modernizationScore` as an integer clamped to 0..=100.
    pub fn score(&self) -> Option<i64> {
        let ModelVerdict::Structured(map) = self else {
            return None;
        };
        let raw = match map.get("modernizationScore")? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
            _ => return None,
        };
        if !raw.is_finite() {
            return None;
        }
        Some(raw.round().clamp(0.0, 100.0) as i64)
    }

    /// `overallSeverity`, when it is one of the four known levels.
    pub fn severity(&self) -> Option<Severity> {
        let ModelVerdict::Structured(map) = self else {
            return None;
        };
        map.get("overallSeverity")?.as_str()?.trim().parse().ok()
    }

    /// Client payload: the model's object (normalized) or the raw-text
    /// fallback, with `meta` fields laid over it.
    pub fn into_payload(self, meta: Map<String, Value>) -> Value {
        let score = self.score();
        let severity = self.severity();
        let mut payload = match self {
            ModelVerdict::Structured(mut map) => {
                map.insert("success".into(), Value::Bool(true));
                match score {
                    Some(s) => map.insert("modernizationScore".into(), s.into()),
                    None => map.remove("modernizationScore"),
                };
                match severity {
                    Some(s) => map.insert("overallSeverity".into(), s.as_ref().into()),
                    None => map.remove("overallSeverity"),
                };
                map
            }
            ModelVerdict::Raw(text) => {
                let mut map = Map::new();
                map.insert("success".into(), Value::Bool(false));
                map.insert("error".into(), PARSE_FAILURE_MESSAGE.into());
                map.insert("rawResponse".into(), Value::String(text));
                map
            }
        };
        payload.extend(meta);
        Value::Object(payload)
    }
}
