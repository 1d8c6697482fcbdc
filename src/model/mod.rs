//! Event data model shared by interceptors, the log store and the search
//! evaluator.

pub mod event;
pub mod payload;

pub use event::{Category, LogEntry, LogLevel};
pub use payload::{
    AnalyticsPayload, ConsolePayload, HeaderMap, NetworkPayload, Payload, SocketPayload,
    SocketPhase,
};
