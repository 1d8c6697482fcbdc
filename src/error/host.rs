// Errors produced by host capabilities themselves.
//
// Interceptors never construct these; they only observe them and hand the
// exact same value back to the caller.

use std::fmt;

/// Failure reported by a host HTTP client or legacy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkError {
    pub message: String,
}

impl NetworkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for NetworkError {}

/// Failure reported by a host socket implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketError {
    pub message: String,
}

impl SocketError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SocketError {}
