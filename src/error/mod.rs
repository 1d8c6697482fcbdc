// Error types for the bugbubble observability layer
//
// This module defines the error taxonomy used internally by interceptors and
// the log store. None of these errors ever cross into host application code:
// every public entry point swallows them after logging. Host capability errors
// (network/socket failures) live in `host` and pass through unchanged.

mod host;
mod intercept;
mod record;

pub use host::{NetworkError, SocketError};
pub use intercept::{log_intercept_error, InterceptError, InterceptErrorCodes};
pub use record::{RecordError, RecordErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so diagnostics can be filtered by code.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
