//! Best-effort decoding of backend output into a [`DesignResponse`].
//!
//! The backend is asked for JSON but nothing enforces it. Parsing therefore
//! never fails: text that is not a JSON object becomes a degraded response
//! whose analysis is the raw text and which carries no suggestions.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::design::{DesignRequest, DesignResponse, DesignSuggestion};

/// Analysis text used when the backend omits one.
pub const ANALYSIS_PLACEHOLDER: &str = "Analysis not available";

/// Title used for suggestions that arrive without one.
pub const UNTITLED_SUGGESTION: &str = "Untitled suggestion";

/// Result of parsing backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The output was a JSON object and was mapped field by field.
    Parsed(DesignResponse),
    /// The output was not usable JSON; the raw text is the analysis.
    Fallback(DesignResponse),
}

impl ParseOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParseOutcome::Fallback(_))
    }

    pub fn response(&self) -> &DesignResponse {
        match self {
            ParseOutcome::Parsed(r) | ParseOutcome::Fallback(r) => r,
        }
    }

    pub fn into_response(self) -> DesignResponse {
        match self {
            ParseOutcome::Parsed(r) | ParseOutcome::Fallback(r) => r,
        }
    }
}

/// Parses raw backend text for a given request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse and return just the response.
    pub fn parse(&self, raw_text: &str, request: &DesignRequest) -> DesignResponse {
        self.parse_outcome(raw_text, request).into_response()
    }

    pub fn parse_outcome(&self, raw_text: &str, request: &DesignRequest) -> ParseOutcome {
        let body = strip_code_fence(raw_text);

        let object = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                debug!(kind = json_kind(&other), "Backend output is JSON but not an object");
                return ParseOutcome::Fallback(fallback(raw_text, request));
            }
            Err(e) => {
                debug!(error = %e, "Backend output is not JSON, using raw text");
                return ParseOutcome::Fallback(fallback(raw_text, request));
            }
        };

        let analysis = object
            .get("analysis")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANALYSIS_PLACEHOLDER)
            .to_string();

        let elements = object
            .get("suggestions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let suggestions: Vec<DesignSuggestion> = elements
            .iter()
            .filter_map(Value::as_object)
            .map(suggestion_from_object)
            .collect();

        if suggestions.len() != elements.len() {
            debug!(
                dropped = elements.len() - suggestions.len(),
                "Dropped suggestions that were not JSON objects"
            );
        }

        ParseOutcome::Parsed(DesignResponse {
            id: Uuid::new_v4(),
            request_id: request.id(),
            analysis,
            suggestions,
            timestamp: Utc::now(),
        })
    }
}

fn fallback(raw_text: &str, request: &DesignRequest) -> DesignResponse {
    DesignResponse {
        id: Uuid::new_v4(),
        request_id: request.id(),
        analysis: raw_text.to_string(),
        suggestions: Vec::new(),
        timestamp: Utc::now(),
    }
}

fn suggestion_from_object(obj: &Map<String, Value>) -> DesignSuggestion {
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::trim);

    DesignSuggestion {
        id: Uuid::new_v4(),
        title: text("title")
            .filter(|s| !s.is_empty())
            .unwrap_or(UNTITLED_SUGGESTION)
            .to_string(),
        description: text("description").unwrap_or_default().to_string(),
        category: text("category")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        priority: text("priority")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        estimated_cost: obj.get("estimatedCost").and_then(cost_from_value),
    }
}

/// Accept non-negative numbers and numeric strings such as `"$1,200"`.
fn cost_from_value(value: &Value) -> Option<f64> {
    let cost = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (cost.is_finite() && cost >= 0.0).then_some(cost)
}

/// Unwrap output that is entirely one markdown code fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    match inner.find('\n') {
        Some(pos) => inner[pos + 1..].trim(),
        None => inner.trim(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
