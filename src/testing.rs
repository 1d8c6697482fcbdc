//! Simulated host capabilities.
//!
//! In-process stand-ins for an HTTP client, a legacy request object, a socket
//! connector and a console, used by the demo harness and the integration
//! tests. Responses are scripted per URL; unknown URLs fail the way a refused
//! connection would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::capability::{
    ConsoleMethod, ConsoleWriter, ErrorHandler, HostCapabilities, HttpClient, HttpRequest,
    HttpResponse, LegacyRequest, LoadEvent, LoadHandler, MessageData, RawHeaders, RequestFactory,
    Socket, SocketConnector, SocketEvent, SocketListener,
};
use crate::error::{NetworkError, SocketError};
use crate::model::payload::join_console_args;

pub const CONNECTION_REFUSED: &str = "connection refused";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
enum Route {
    Respond { status: u16, body: Vec<u8> },
    Fail(String),
}

/// Scripted outcomes keyed by URL, shared by both HTTP paths.
#[derive(Debug, Default)]
pub struct SimulatedRoutes {
    routes: Mutex<HashMap<String, Route>>,
}

impl SimulatedRoutes {
    pub fn respond(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        lock(&self.routes).insert(
            url.to_string(),
            Route::Respond {
                status,
                body: body.into(),
            },
        );
    }

    pub fn fail(&self, url: &str, message: &str) {
        lock(&self.routes).insert(url.to_string(), Route::Fail(message.to_string()));
    }

    fn resolve(&self, url: &str) -> Route {
        lock(&self.routes)
            .get(url)
            .cloned()
            .unwrap_or_else(|| Route::Fail(CONNECTION_REFUSED.to_string()))
    }
}

pub struct SimulatedHttpClient {
    routes: Arc<SimulatedRoutes>,
}

impl HttpClient for SimulatedHttpClient {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetworkError>> {
        let route = self.routes.resolve(&request.url);
        Box::pin(async move {
            match route {
                Route::Respond { status, body } => Ok(HttpResponse::new(
                    status,
                    RawHeaders::from_pairs([("content-type", "application/json")]),
                    body,
                )),
                Route::Fail(message) => Err(NetworkError::new(message)),
            }
        })
    }
}

pub struct SimulatedRequestFactory {
    routes: Arc<SimulatedRoutes>,
}

impl RequestFactory for SimulatedRequestFactory {
    fn create(&self) -> Box<dyn LegacyRequest> {
        Box::new(SimulatedRequest {
            routes: self.routes.clone(),
            url: String::new(),
            on_load: None,
            on_error: None,
        })
    }
}

/// Completes synchronously inside `send`.
struct SimulatedRequest {
    routes: Arc<SimulatedRoutes>,
    url: String,
    on_load: Option<LoadHandler>,
    on_error: Option<ErrorHandler>,
}

impl LegacyRequest for SimulatedRequest {
    fn open(&mut self, _method: &str, url: &str) -> Result<(), NetworkError> {
        self.url = url.to_string();
        Ok(())
    }

    fn set_request_header(&mut self, _name: &str, _value: &str) -> Result<(), NetworkError> {
        Ok(())
    }

    fn on_load(&self) -> Option<LoadHandler> {
        self.on_load.clone()
    }

    fn set_on_load(&mut self, handler: Option<LoadHandler>) {
        self.on_load = handler;
    }

    fn on_error(&self) -> Option<ErrorHandler> {
        self.on_error.clone()
    }

    fn set_on_error(&mut self, handler: Option<ErrorHandler>) {
        self.on_error = handler;
    }

    fn send(&mut self, _body: Option<Value>) -> Result<(), NetworkError> {
        match self.routes.resolve(&self.url) {
            Route::Respond { status, body } => {
                let event = LoadEvent {
                    status,
                    response_text: String::from_utf8(body).ok(),
                    raw_headers: Some("content-type: application/json\r\n".to_string()),
                };
                if let Some(handler) = &self.on_load {
                    handler(&event);
                }
            }
            Route::Fail(message) => {
                if let Some(handler) = &self.on_error {
                    handler(&NetworkError::new(message));
                }
            }
        }
        Ok(())
    }
}

type Listeners = Arc<Mutex<Vec<SocketListener>>>;

/// Connector whose sockets echo every frame back to their own listeners and
/// can be driven from outside with [`SimulatedSocketHub::emit`].
#[derive(Default)]
pub struct SimulatedSocketHub {
    open: Arc<Mutex<Vec<(String, Listeners)>>>,
}

impl SimulatedSocketHub {
    /// Deliver `event` to every open socket on `url`.
    pub fn emit(&self, url: &str, event: SocketEvent) {
        let targets: Vec<Listeners> = lock(&self.open)
            .iter()
            .filter(|(open_url, _)| open_url == url)
            .map(|(_, listeners)| listeners.clone())
            .collect();
        for listeners in &targets {
            fire(listeners, &event);
        }
    }

    /// Number of sockets on `url` that have not been closed.
    pub fn open_count(&self, url: &str) -> usize {
        lock(&self.open)
            .iter()
            .filter(|(open_url, _)| open_url == url)
            .count()
    }
}

fn fire(listeners: &Listeners, event: &SocketEvent) {
    let snapshot = lock(listeners).clone();
    for listener in snapshot {
        listener(event);
    }
}

impl SocketConnector for SimulatedSocketHub {
    fn connect(&self, url: &str, _protocols: &[String]) -> Result<Box<dyn Socket>, SocketError> {
        if url.is_empty() {
            return Err(SocketError::new("empty socket url"));
        }
        let listeners: Listeners = Arc::default();
        lock(&self.open).push((url.to_string(), listeners.clone()));
        Ok(Box::new(SimulatedSocket {
            url: url.to_string(),
            listeners,
            hub: self.open.clone(),
            closed: false,
        }))
    }
}

struct SimulatedSocket {
    url: String,
    listeners: Listeners,
    hub: Arc<Mutex<Vec<(String, Listeners)>>>,
    closed: bool,
}

impl Socket for SimulatedSocket {
    fn url(&self) -> &str {
        &self.url
    }

    fn add_listener(&mut self, listener: SocketListener) {
        lock(&self.listeners).push(listener);
    }

    fn send(&mut self, data: MessageData) -> Result<(), SocketError> {
        if self.closed {
            return Err(SocketError::new("socket is closed"));
        }
        fire(&self.listeners, &SocketEvent::Message(data));
        Ok(())
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) -> Result<(), SocketError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        lock(&self.hub).retain(|(_, listeners)| !Arc::ptr_eq(listeners, &self.listeners));
        fire(
            &self.listeners,
            &SocketEvent::Close {
                code: code.unwrap_or(1000),
                reason: reason.unwrap_or_default().to_string(),
                was_clean: Some(true),
            },
        );
        Ok(())
    }
}

/// Console writer that keeps every line it is handed.
#[derive(Default)]
pub struct CaptureWriter {
    lines: Mutex<Vec<String>>,
}

impl CaptureWriter {
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }
}

impl ConsoleWriter for CaptureWriter {
    fn write(&self, args: &[Value]) {
        lock(&self.lines).push(join_console_args(args));
    }
}

/// A host with every capability slot populated by a simulated implementation.
pub struct SimulatedHost {
    pub host: Arc<HostCapabilities>,
    pub routes: Arc<SimulatedRoutes>,
    pub sockets: Arc<SimulatedSocketHub>,
    pub console: Arc<CaptureWriter>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::attach(Arc::new(HostCapabilities::new()))
    }

    /// Populate the slots of an existing host (for example the process-wide one).
    pub fn attach(host: Arc<HostCapabilities>) -> Self {
        let routes = Arc::new(SimulatedRoutes::default());
        let sockets = Arc::new(SimulatedSocketHub::default());
        let console = Arc::new(CaptureWriter::default());
        Self::populate(&host, &routes, &sockets, &console);
        Self {
            host,
            routes,
            sockets,
            console,
        }
    }

    fn populate(
        host: &HostCapabilities,
        routes: &Arc<SimulatedRoutes>,
        sockets: &Arc<SimulatedSocketHub>,
        console: &Arc<CaptureWriter>,
    ) {
        host.http.set(Arc::new(SimulatedHttpClient {
            routes: routes.clone(),
        }));
        host.legacy_http.set(Arc::new(SimulatedRequestFactory {
            routes: routes.clone(),
        }));
        host.socket.set(sockets.clone());
        for method in ConsoleMethod::ALL {
            host.console.slot(method).set(console.clone());
        }
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}
