//! Invocation events.
//!
//! Every invocation produces zero or more advisory events (log, progress)
//! followed by exactly one terminal result event. Events carry the request id
//! they belong to and a per-invocation sequence number assigned when they are
//! queued on the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolError;

/// Opaque identifier of one invocation, unique within a session.
///
/// String and numeric JSON-RPC ids never collide: `"1"` and `1` name two
/// different invocations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestId {
    String(String),
    /// Any other JSON id, keyed by its JSON text.
    Json(String),
}

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self::String(id.into())
    }

    /// Derive a request id from a JSON-RPC `id` (string or number).
    pub fn from_json(id: &Value) -> Self {
        match id {
            Value::String(s) => Self::String(s.clone()),
            other => Self::Json(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String(s) | Self::Json(s) => s,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log severity, using the MCP logging level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// Successful tool output, already shaped by the tool's declared output type.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Human readable rendering of the result.
    pub text: String,
    /// Structured result, when the tool declares a structured output type.
    pub structured: Option<Value>,
}

/// Outcome carried by the terminal event.
pub type InvocationResult = Result<ToolOutput, ToolError>;

/// Payload of an [`Event`].
#[derive(Debug, Clone)]
pub enum EventKind {
    Log {
        level: LogLevel,
        message: String,
    },
    Progress {
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    },
    Result(InvocationResult),
}

impl EventKind {
    /// Whether this is the terminal result of an invocation.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Progress { .. } => "progress",
            Self::Result(_) => "result",
        }
    }
}

/// One event on a session's outbound channel.
#[derive(Debug, Clone)]
pub struct Event {
    pub request_id: RequestId,
    /// Position within the invocation, strictly increasing from 1.
    pub seq: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn is_result(&self) -> bool {
        self.kind.is_result()
    }

    /// Advisory events as plain JSON, used when attaching them to a
    /// buffered response.
    pub fn advisory_json(&self) -> Option<Value> {
        match &self.kind {
            EventKind::Log { level, message } => Some(serde_json::json!({
                "seq": self.seq,
                "kind": "log",
                "level": level,
                "message": message,
            })),
            EventKind::Progress {
                progress,
                total,
                message,
            } => Some(serde_json::json!({
                "seq": self.seq,
                "kind": "progress",
                "progress": progress,
                "total": total,
                "message": message,
            })),
            EventKind::Result(_) => None,
        }
    }
}
