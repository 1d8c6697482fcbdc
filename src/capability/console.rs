//! Leveled console channel: five independently swappable entry points.

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;

use super::CapabilitySlot;
use crate::model::payload::join_console_args;
use crate::model::LogLevel;

/// One console entry point.
pub trait ConsoleWriter: Send + Sync {
    fn write(&self, args: &[Value]);
}

/// The five leveled entry points of the console channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleMethod {
    Log,
    Debug,
    Info,
    Warn,
    Error,
}

impl ConsoleMethod {
    pub const ALL: [ConsoleMethod; 5] = [
        ConsoleMethod::Log,
        ConsoleMethod::Debug,
        ConsoleMethod::Info,
        ConsoleMethod::Warn,
        ConsoleMethod::Error,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConsoleMethod::Log => "log",
            ConsoleMethod::Debug => "debug",
            ConsoleMethod::Info => "info",
            ConsoleMethod::Warn => "warn",
            ConsoleMethod::Error => "error",
        }
    }

    /// Severity reported for calls through this entry point; `log` is `info`.
    pub fn level(&self) -> LogLevel {
        match self {
            ConsoleMethod::Log | ConsoleMethod::Info => LogLevel::Info,
            ConsoleMethod::Debug => LogLevel::Debug,
            ConsoleMethod::Warn => LogLevel::Warn,
            ConsoleMethod::Error => LogLevel::Error,
        }
    }
}

/// Writes joined arguments to stdout (log/debug/info) or stderr (warn/error).
pub struct StdStreamWriter {
    method: ConsoleMethod,
}

impl StdStreamWriter {
    pub fn new(method: ConsoleMethod) -> Self {
        Self { method }
    }
}

impl ConsoleWriter for StdStreamWriter {
    fn write(&self, args: &[Value]) {
        let line = join_console_args(args);
        // Write errors (closed pipe etc.) are the host's concern, not ours.
        let _ = match self.method {
            ConsoleMethod::Warn | ConsoleMethod::Error => {
                writeln!(std::io::stderr().lock(), "{}", line)
            }
            _ => writeln!(std::io::stdout().lock(), "{}", line),
        };
    }
}

pub struct ConsoleChannel {
    log: CapabilitySlot<dyn ConsoleWriter>,
    debug: CapabilitySlot<dyn ConsoleWriter>,
    info: CapabilitySlot<dyn ConsoleWriter>,
    warn: CapabilitySlot<dyn ConsoleWriter>,
    error: CapabilitySlot<dyn ConsoleWriter>,
}

impl ConsoleChannel {
    pub fn empty() -> Self {
        Self {
            log: CapabilitySlot::empty("console.log"),
            debug: CapabilitySlot::empty("console.debug"),
            info: CapabilitySlot::empty("console.info"),
            warn: CapabilitySlot::empty("console.warn"),
            error: CapabilitySlot::empty("console.error"),
        }
    }

    pub fn std_streams() -> Self {
        let channel = Self::empty();
        for method in ConsoleMethod::ALL {
            channel
                .slot(method)
                .set(Arc::new(StdStreamWriter::new(method)));
        }
        channel
    }

    pub fn slot(&self, method: ConsoleMethod) -> &CapabilitySlot<dyn ConsoleWriter> {
        match method {
            ConsoleMethod::Log => &self.log,
            ConsoleMethod::Debug => &self.debug,
            ConsoleMethod::Info => &self.info,
            ConsoleMethod::Warn => &self.warn,
            ConsoleMethod::Error => &self.error,
        }
    }

    /// Route `args` through the writer currently installed for `method`.
    pub fn call(&self, method: ConsoleMethod, args: &[Value]) {
        if let Some(writer) = self.slot(method).current() {
            writer.write(args);
        }
    }

    pub fn log(&self, args: &[Value]) {
        self.call(ConsoleMethod::Log, args);
    }

    pub fn debug(&self, args: &[Value]) {
        self.call(ConsoleMethod::Debug, args);
    }

    pub fn info(&self, args: &[Value]) {
        self.call(ConsoleMethod::Info, args);
    }

    pub fn warn(&self, args: &[Value]) {
        self.call(ConsoleMethod::Warn, args);
    }

    pub fn error(&self, args: &[Value]) {
        self.call(ConsoleMethod::Error, args);
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::std_streams()
    }
}
