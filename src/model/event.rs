//! Core log entry type plus the category and severity enums.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::payload::{
    AnalyticsPayload, ConsolePayload, NetworkPayload, Payload, SocketPayload, SocketPhase,
};
use crate::error::RecordError;

/// Counter feeding the high bits of entry identifiers.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

const RANDOM_BITS: u32 = 20;
const ID_SUFFIX_LEN: usize = 9;

/// The four fixed event kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Network,
    #[serde(rename = "websocket")]
    Socket,
    Console,
    Analytics,
}

impl Category {
    /// Display order used by `LogStore::enabled_categories`.
    pub const ALL: [Category; 4] = [
        Category::Console,
        Category::Network,
        Category::Socket,
        Category::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Network => "network",
            Category::Socket => "websocket",
            Category::Console => "console",
            Category::Analytics => "analytics",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network" => Ok(Category::Network),
            "websocket" | "socket" => Ok(Category::Socket),
            "console" => Ok(Category::Console),
            "analytics" | "event" => Ok(Category::Analytics),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Severity attached to every entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" | "log" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// A single captured event.
///
/// The category is derived from the payload variant, so an entry can never
/// claim one category while carrying another's data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: String,
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub summary: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl LogEntry {
    /// Build an entry with a fresh identifier and the current wall-clock time.
    pub fn new(level: LogLevel, summary: impl Into<String>, payload: Payload) -> Self {
        let timestamp_ms = now_timestamp_ms();
        Self {
            id: generate_id(timestamp_ms),
            timestamp_ms,
            level,
            summary: summary.into(),
            payload,
        }
    }

    /// Network entry; `error` level for 4xx/5xx responses.
    pub fn network(payload: NetworkPayload) -> Self {
        let level = match payload.status_code {
            Some(status) if status >= 400 => LogLevel::Error,
            _ => LogLevel::Info,
        };
        let summary = match payload.status_code {
            Some(status) => format!("{} {} ({})", payload.method, payload.url, status),
            None => format!("{} {}", payload.method, payload.url),
        };
        Self::new(level, summary, Payload::Network(payload))
    }

    pub fn socket(payload: SocketPayload) -> Self {
        let level = if payload.phase == SocketPhase::Error {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        let summary = match payload.url.as_deref() {
            Some(url) if !url.is_empty() => format!("{} ({})", payload.phase, url),
            _ => payload.phase.to_string(),
        };
        Self::new(level, summary, Payload::Socket(payload))
    }

    pub fn console(level: LogLevel, args: Vec<Value>) -> Self {
        let payload = ConsolePayload::new(level, args);
        let summary = payload.text.clone();
        Self::new(level, summary, Payload::Console(payload))
    }

    pub fn analytics(name: impl Into<String>, properties: Option<Map<String, Value>>) -> Self {
        let name = name.into();
        Self::new(
            LogLevel::Info,
            name.clone(),
            Payload::Analytics(AnalyticsPayload { name, properties }),
        )
    }

    pub fn category(&self) -> Category {
        match self.payload {
            Payload::Network(_) => Category::Network,
            Payload::Socket(_) => Category::Socket,
            Payload::Console(_) => Category::Console,
            Payload::Analytics(_) => Category::Analytics,
        }
    }

    /// Check the fields each category requires.
    pub fn validate(&self) -> Result<(), RecordError> {
        let category = self.category();
        let malformed = |reason: &str| RecordError::Malformed {
            category,
            reason: reason.to_string(),
        };

        if self.id.is_empty() {
            return Err(malformed("missing id"));
        }

        match &self.payload {
            Payload::Network(net) => {
                if net.method.trim().is_empty() {
                    return Err(malformed("missing method"));
                }
                if net.url.trim().is_empty() {
                    return Err(malformed("missing url"));
                }
            }
            Payload::Socket(_) => {}
            Payload::Console(console) => {
                if console.args.is_empty() {
                    return Err(malformed("no console arguments"));
                }
            }
            Payload::Analytics(event) => {
                if event.name.is_empty() {
                    return Err(malformed("empty event name"));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// `"{timestamp}-{suffix}"` where the suffix packs a process-wide sequence
/// number above random low bits, so two ids never collide in one process.
fn generate_id(timestamp_ms: u64) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let noise: u64 = rand::thread_rng().gen_range(0..(1u64 << RANDOM_BITS));
    let packed = (seq << RANDOM_BITS) | noise;
    format!("{}-{}", timestamp_ms, to_base36(packed, ID_SUFFIX_LEN))
}

fn to_base36(mut value: u64, min_len: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::with_capacity(min_len.max(13));
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    while out.len() < min_len {
        out.push(b'0');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
