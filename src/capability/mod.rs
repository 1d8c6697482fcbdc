//! Host capabilities and the slots they live in.
//!
//! A capability is a process-wide facility the host application calls
//! through (HTTP client, legacy request factory, socket connector, console
//! channel). Each lives in a [`CapabilitySlot`]; interceptors patch a slot by
//! swapping in a wrapper around the original and later put the original back.
//! Host code always resolves the capability through the slot at call time,
//! so a swap takes effect for every subsequent call.

use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{InterceptError, NetworkError, SocketError};

pub mod console;
pub mod http;
pub mod socket;

pub use console::{ConsoleChannel, ConsoleMethod, ConsoleWriter, StdStreamWriter};
pub use http::{
    decode_body, extract_headers, parse_header_block, ErrorHandler, HttpClient, HttpRequest,
    HttpResponse, LegacyRequest, LoadEvent, LoadHandler, RawHeaders, RequestFactory,
};
pub use socket::{MessageData, Socket, SocketConnector, SocketEvent, SocketListener};

/// Process-wide host capabilities.
static HOST: Lazy<Arc<HostCapabilities>> =
    Lazy::new(|| Arc::new(HostCapabilities::with_std_console()));

/// Access the process-wide host capabilities.
pub fn host() -> Arc<HostCapabilities> {
    HOST.clone()
}

/// A swappable reference to one host capability.
pub struct CapabilitySlot<T: ?Sized> {
    name: &'static str,
    current: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> CapabilitySlot<T> {
    pub fn new(name: &'static str, capability: Arc<T>) -> Self {
        Self {
            name,
            current: RwLock::new(Some(capability)),
        }
    }

    /// Slot for a capability the host does not (yet) provide.
    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            current: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Capability callers should use right now.
    pub fn current(&self) -> Option<Arc<T>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Host-side registration of the real capability.
    pub fn set(&self, capability: Arc<T>) {
        match self.current.write() {
            Ok(mut guard) => *guard = Some(capability),
            Err(poisoned) => *poisoned.into_inner() = Some(capability),
        }
    }

    /// Swap in a replacement built from the current original.
    ///
    /// Returns the original so the caller can restore it later. Fails without
    /// touching the slot when it is empty or `build` fails.
    pub fn install<F>(&self, build: F) -> Result<Arc<T>, InterceptError>
    where
        F: FnOnce(Arc<T>) -> Result<Arc<T>, InterceptError>,
    {
        let mut guard = self
            .current
            .write()
            .map_err(|_| InterceptError::LockPoisoned {
                capability: self.name.to_string(),
            })?;
        let original = guard
            .clone()
            .ok_or_else(|| InterceptError::CapabilityMissing {
                capability: self.name.to_string(),
            })?;
        let replacement = build(original.clone())?;
        *guard = Some(replacement);
        Ok(original)
    }

    /// Put a previously saved original back.
    pub fn restore(&self, original: Arc<T>) -> Result<(), InterceptError> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| InterceptError::RestoreFailed {
                capability: self.name.to_string(),
                reason: "slot lock poisoned".to_string(),
            })?;
        *guard = Some(original);
        Ok(())
    }

    /// Whether the slot currently holds exactly `capability`.
    pub fn holds(&self, capability: &Arc<T>) -> bool {
        self.current()
            .map(|current| Arc::ptr_eq(&current, capability))
            .unwrap_or(false)
    }
}

/// Every capability the observability layer knows how to tap.
pub struct HostCapabilities {
    pub http: CapabilitySlot<dyn HttpClient>,
    pub legacy_http: CapabilitySlot<dyn RequestFactory>,
    pub socket: CapabilitySlot<dyn SocketConnector>,
    pub console: ConsoleChannel,
}

impl HostCapabilities {
    /// All slots empty.
    pub fn new() -> Self {
        Self {
            http: CapabilitySlot::empty("http"),
            legacy_http: CapabilitySlot::empty("legacy_http"),
            socket: CapabilitySlot::empty("socket"),
            console: ConsoleChannel::empty(),
        }
    }

    /// Empty network/socket slots, console wired to stdout/stderr.
    pub fn with_std_console() -> Self {
        Self {
            console: ConsoleChannel::std_streams(),
            ..Self::new()
        }
    }

    /// Issue a request through whatever HTTP client is currently installed.
    pub fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetworkError>> {
        match self.http.current() {
            Some(client) => client.fetch(request),
            None => Box::pin(async { Err(NetworkError::new("no HTTP client registered")) }),
        }
    }

    /// Create a legacy request object through the current factory.
    pub fn new_request(&self) -> Option<Box<dyn LegacyRequest>> {
        self.legacy_http.current().map(|factory| factory.create())
    }

    /// Open a socket through the current connector.
    pub fn connect(&self, url: &str, protocols: &[String]) -> Result<Box<dyn Socket>, SocketError> {
        match self.socket.current() {
            Some(connector) => connector.connect(url, protocols),
            None => Err(SocketError::new("no socket connector registered")),
        }
    }

    /// Write to the console channel at `method`.
    pub fn console(&self, method: ConsoleMethod, args: &[Value]) {
        self.console.call(method, args);
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::new()
    }
}
