//! Category-specific payloads carried by a [`LogEntry`](super::LogEntry).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::LogLevel;

/// Flat header map, sorted by name for stable display.
pub type HeaderMap = BTreeMap<String, String>;

/// Placeholder stored when a body could be read neither as JSON nor as text.
pub const UNREADABLE_BODY: &str = "Unable to read response body";

/// Captured HTTP exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkPayload {
    pub method: String,
    pub url: String,
    /// Absent when the request failed before a response arrived.
    pub status_code: Option<u16>,
    pub request_headers: Option<HeaderMap>,
    pub response_headers: Option<HeaderMap>,
    pub request_body: Option<Value>,
    pub response_body: Option<Value>,
    pub duration_ms: Option<u64>,
}

/// Lifecycle phase of a socket connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SocketPhase {
    Open,
    Message,
    Close,
    Error,
}

impl SocketPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketPhase::Open => "open",
            SocketPhase::Message => "message",
            SocketPhase::Close => "close",
            SocketPhase::Error => "error",
        }
    }
}

impl fmt::Display for SocketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocketPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SocketPhase::Open),
            "message" => Ok(SocketPhase::Message),
            "close" => Ok(SocketPhase::Close),
            "error" => Ok(SocketPhase::Error),
            other => Err(format!("unknown socket phase '{}'", other)),
        }
    }
}

/// Captured socket lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocketPayload {
    pub phase: SocketPhase,
    pub url: Option<String>,
    /// Parsed JSON when the frame was textual JSON, raw otherwise.
    pub data: Option<Value>,
}

/// Captured console call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolePayload {
    pub level: LogLevel,
    pub args: Vec<Value>,
    /// Arguments joined into one line, computed once at capture.
    pub text: String,
}

impl ConsolePayload {
    pub fn new(level: LogLevel, args: Vec<Value>) -> Self {
        let text = join_console_args(&args);
        Self { level, args, text }
    }
}

/// Explicitly reported analytics event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsPayload {
    pub name: String,
    pub properties: Option<Map<String, Value>>,
}

/// Category-specific part of a log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Payload {
    Network(NetworkPayload),
    #[serde(rename = "websocket")]
    Socket(SocketPayload),
    Console(ConsolePayload),
    Analytics(AnalyticsPayload),
}

/// Join console arguments the way a terminal would print them: strings
/// verbatim, objects and arrays as compact JSON, other scalars by value.
pub fn join_console_args(args: &[Value]) -> String {
    args.iter()
        .map(display_value)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human form of a single JSON value.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| "[Object]".to_string())
        }
    }
}
