//! Explicit logging API bound to the process-wide store.
//!
//! For host code that reports events itself instead of (or in addition to)
//! relying on interception. Every function is a no-op until [`initialize`]
//! has run and never panics into the caller.

use serde_json::{Map, Value};

use crate::config::PartialConfig;
use crate::guard::{attempt, attempt_result};
use crate::model::{HeaderMap, LogEntry, LogLevel, NetworkPayload, SocketPayload, SocketPhase};
use crate::store::store;

/// Initialize the process-wide store and start the enabled interceptors.
/// Later calls are ignored.
pub fn initialize(config: PartialConfig) {
    attempt("initialize", || store().initialize(config), ());
}

/// Record a network exchange. An empty `method` or `url` drops the entry.
#[allow(clippy::too_many_arguments)]
pub fn log_network(
    method: &str,
    url: &str,
    status_code: Option<u16>,
    request_headers: Option<HeaderMap>,
    response_headers: Option<HeaderMap>,
    request_body: Option<Value>,
    response_body: Option<Value>,
    duration_ms: Option<u64>,
) {
    let payload = NetworkPayload {
        method: method.to_uppercase(),
        url: url.to_string(),
        status_code,
        request_headers,
        response_headers,
        request_body,
        response_body,
        duration_ms,
    };
    attempt_result(
        "log_network",
        || store().try_record(LogEntry::network(payload)),
        (),
    );
}

pub fn log_socket(phase: SocketPhase, url: Option<&str>, data: Option<Value>) {
    let payload = SocketPayload {
        phase,
        url: url.map(str::to_string),
        data,
    };
    attempt_result(
        "log_socket",
        || store().try_record(LogEntry::socket(payload)),
        (),
    );
}

/// Record a console line; `args` must not be empty.
pub fn log_console(level: LogLevel, args: Vec<Value>) {
    attempt_result(
        "log_console",
        || store().try_record(LogEntry::console(level, args)),
        (),
    );
}

/// Record an analytics event through the explicit-event interceptor.
pub fn log_event(name: &str, properties: Option<Map<String, Value>>) {
    let name = name.to_string();
    attempt(
        "log_event",
        || store().interceptors().analytics.track(name, properties),
        (),
    );
}
