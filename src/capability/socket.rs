//! Full-duplex socket capability.

use std::sync::Arc;

use serde_json::Value;

use crate::error::SocketError;

/// Frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageData {
    Text(String),
    Binary(Vec<u8>),
}

impl MessageData {
    /// Structured form: parsed JSON for textual JSON, otherwise the raw text
    /// or the bytes as a number array.
    pub fn to_value(&self) -> Value {
        match self {
            MessageData::Text(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
            MessageData::Binary(bytes) => {
                Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
            }
        }
    }
}

/// Lifecycle notification delivered to socket listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Open,
    Message(MessageData),
    Close {
        code: u16,
        reason: String,
        /// Some hosts omit the clean-shutdown flag.
        was_clean: Option<bool>,
    },
    Error {
        message: String,
    },
}

pub type SocketListener = Arc<dyn Fn(&SocketEvent) + Send + Sync>;

/// An open (or opening) connection.
///
/// Listeners are additive: registering one never displaces another.
pub trait Socket: Send {
    fn url(&self) -> &str;
    fn add_listener(&mut self, listener: SocketListener);
    fn send(&mut self, data: MessageData) -> Result<(), SocketError>;
    fn close(&mut self, code: Option<u16>, reason: Option<&str>) -> Result<(), SocketError>;
}

/// Socket constructor.
pub trait SocketConnector: Send + Sync {
    fn connect(&self, url: &str, protocols: &[String]) -> Result<Box<dyn Socket>, SocketError>;
}
