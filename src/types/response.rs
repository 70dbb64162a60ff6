//! Normalized dispatch result and the outward `{status, data, message}` envelope.
//!
//! Whatever protocol answered, callers see one of two shapes:
//!
//! ```json
//! {"status": "success", "data": {"choices": [{"message": {"content": "..."}}]}}
//! {"status": "error", "message": "..."}
//! ```
//!
//! Native answers are wrapped into the `choices` layout; OpenAI-compatible
//! answers are passed through untouched under `data`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

static EMBEDDED_JSON: Lazy<Regex> = Lazy::new(|| {
    // Greedy: first '{' to last '}'.
    Regex::new(r"(?s)\{.*\}").expect("static regex")
});

/// A successful chat answer in the shape the answering protocol produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatResponse {
    /// Native `/api/chat` answer, reduced to `message.content`.
    Native { content: String },
    /// OpenAI-compatible answer, kept as-is.
    Compatible { body: Value },
}

impl ChatResponse {
    /// Assistant text, if the response carries any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ChatResponse::Native { content } => Some(content.as_str()),
            ChatResponse::Compatible { body } => compatible_content(body),
        }
    }

    /// The `data` member of the outward envelope.
    pub fn data(&self) -> Value {
        match self {
            ChatResponse::Native { content } => json!({
                "choices": [ { "message": { "content": content } } ]
            }),
            ChatResponse::Compatible { body } => body.clone(),
        }
    }

    /// Parse the first JSON object embedded in the assistant text.
    ///
    /// Models asked for structured output often wrap it in prose or code
    /// fences; this pulls out the outermost `{...}` span.
    pub fn json_payload(&self) -> Option<Value> {
        let text = self.content()?;
        let m = EMBEDDED_JSON.find(text)?;
        serde_json::from_str(m.as_str()).ok()
    }
}

/// `choices[0].message.content`, falling back to legacy `choices[0].text`.
pub(crate) fn compatible_content(body: &Value) -> Option<&str> {
    let first = body.get("choices")?.as_array()?.first()?;
    first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .or_else(|| first.get("text").and_then(Value::as_str))
}

/// Outcome of a dispatch. Every protocol-specific response is converted into
/// this before it reaches a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    Success(ChatResponse),
    Error(String),
}

impl NormalizedResult {
    pub fn native(content: impl Into<String>) -> Self {
        NormalizedResult::Success(ChatResponse::Native {
            content: content.into(),
        })
    }

    pub fn compatible(body: Value) -> Self {
        NormalizedResult::Success(ChatResponse::Compatible { body })
    }

    pub fn error(message: impl Into<String>) -> Self {
        NormalizedResult::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NormalizedResult::Success(_))
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            NormalizedResult::Success(r) => r.content(),
            NormalizedResult::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            NormalizedResult::Error(m) => Some(m.as_str()),
            NormalizedResult::Success(_) => None,
        }
    }

    /// Outward envelope as a JSON value.
    pub fn to_envelope(&self) -> Value {
        match self {
            NormalizedResult::Success(r) => json!({ "status": "success", "data": r.data() }),
            NormalizedResult::Error(m) => json!({ "status": "error", "message": m }),
        }
    }
}

impl Serialize for NormalizedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            NormalizedResult::Success(r) => {
                map.serialize_entry("status", "success")?;
                map.serialize_entry("data", &r.data())?;
            }
            NormalizedResult::Error(m) => {
                map.serialize_entry("status", "error")?;
                map.serialize_entry("message", m)?;
            }
        }
        map.end()
    }
}

impl From<crate::Result<ChatResponse>> for NormalizedResult {
    fn from(r: crate::Result<ChatResponse>) -> Self {
        match r {
            Ok(resp) => NormalizedResult::Success(resp),
            Err(e) => NormalizedResult::Error(e.to_string()),
        }
    }
}
