//! Network interceptor: taps the future-based HTTP client and the legacy
//! callback-style request factory.
//!
//! Both paths hand the caller exactly what the original produced (same
//! response, same error value) and defer reporting until after settlement.
//! Response bodies are decoded from a duplicate handle inside the deferred
//! task, so decoding never adds latency to the caller.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info};

use super::{Callback, CallbackCell, Interceptor, Reporter};
use crate::capability::{
    decode_body, extract_headers, parse_header_block, ErrorHandler, HostCapabilities, HttpClient,
    HttpRequest, HttpResponse, LegacyRequest, LoadEvent, LoadHandler, RequestFactory,
};
use crate::error::{log_intercept_error, InterceptError, NetworkError};
use crate::model::payload::UNREADABLE_BODY;
use crate::model::{Category, HeaderMap, NetworkPayload};
use crate::scheduler::Scheduler;

/// Response payload recorded when a legacy request errors out.
pub const LEGACY_NETWORK_ERROR: &str = "Network Error";

#[derive(Default)]
struct NetworkState {
    active: bool,
    original_http: Option<Arc<dyn HttpClient>>,
    original_legacy: Option<Arc<dyn RequestFactory>>,
    reporter: Option<Reporter<NetworkPayload>>,
}

pub struct NetworkInterceptor {
    host: Arc<HostCapabilities>,
    scheduler: Arc<dyn Scheduler>,
    callback: Arc<CallbackCell<NetworkPayload>>,
    state: Mutex<NetworkState>,
}

impl NetworkInterceptor {
    pub fn new(host: Arc<HostCapabilities>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            host,
            scheduler,
            callback: Arc::new(CallbackCell::new()),
            state: Mutex::new(NetworkState::default()),
        }
    }

    pub fn set_callback(&self, callback: Callback<NetworkPayload>) {
        self.callback.set(callback);
    }

    /// Install wrappers on whichever HTTP paths the host provides.
    ///
    /// A path the host lacks is skipped; any other failure rolls back what was
    /// already installed.
    fn install(&self, state: &mut NetworkState) -> Result<(), InterceptError> {
        let reporter = Reporter::new(self.callback.clone(), self.scheduler.clone());

        let http_reporter = reporter.clone();
        let original_http = skip_missing(self.host.http.install(move |inner| {
            Ok(Arc::new(ObservedHttpClient {
                inner,
                reporter: http_reporter,
            }) as Arc<dyn HttpClient>)
        }))?;

        let legacy_reporter = reporter.clone();
        let original_legacy = match skip_missing(self.host.legacy_http.install(move |inner| {
            Ok(Arc::new(ObservedRequestFactory {
                inner,
                reporter: legacy_reporter,
            }) as Arc<dyn RequestFactory>)
        })) {
            Ok(original) => original,
            Err(err) => {
                if let Some(original) = original_http {
                    if let Err(restore_err) = self.host.http.restore(original) {
                        log_intercept_error(&restore_err, Category::Network);
                    }
                }
                return Err(err);
            }
        };

        if original_http.is_none() && original_legacy.is_none() {
            return Err(InterceptError::CapabilityMissing {
                capability: "http".to_string(),
            });
        }

        state.original_http = original_http;
        state.original_legacy = original_legacy;
        state.reporter = Some(reporter);
        Ok(())
    }
}

fn skip_missing<T>(result: Result<T, InterceptError>) -> Result<Option<T>, InterceptError> {
    match result {
        Ok(original) => Ok(Some(original)),
        Err(InterceptError::CapabilityMissing { capability }) => {
            debug!(capability, "host lacks capability, skipping");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

impl Interceptor for NetworkInterceptor {
    fn category(&self) -> Category {
        Category::Network
    }

    fn start(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.active {
            return;
        }
        match self.install(&mut state) {
            Ok(()) => {
                state.active = true;
                info!(
                    http = state.original_http.is_some(),
                    legacy = state.original_legacy.is_some(),
                    "network interceptor started"
                );
            }
            Err(err) => log_intercept_error(&err, Category::Network),
        }
    }

    fn stop(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !state.active {
            return;
        }
        if let Some(original) = state.original_http.take() {
            if let Err(err) = self.host.http.restore(original) {
                log_intercept_error(&err, Category::Network);
            }
        }
        if let Some(original) = state.original_legacy.take() {
            if let Err(err) = self.host.legacy_http.restore(original) {
                log_intercept_error(&err, Category::Network);
            }
        }
        if let Some(reporter) = state.reporter.take() {
            reporter.retire();
        }
        state.active = false;
        info!("network interceptor stopped");
    }

    fn is_active(&self) -> bool {
        self.state.lock().map(|state| state.active).unwrap_or(false)
    }
}

/// Wrapper installed in the HTTP client slot.
struct ObservedHttpClient {
    inner: Arc<dyn HttpClient>,
    reporter: Reporter<NetworkPayload>,
}

impl HttpClient for ObservedHttpClient {
    fn fetch(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetworkError>> {
        let started = Instant::now();
        let method = request.normalized_method();
        let url = request.url.clone();
        let request_headers = request.headers.clone();
        let request_body = request.body.clone();

        let pending = self.inner.fetch(request);
        let reporter = self.reporter.clone();

        Box::pin(async move {
            let result = pending.await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => {
                    let copy = response.duplicate();
                    reporter.report_with(move || NetworkPayload {
                        method,
                        url,
                        status_code: Some(copy.status),
                        request_headers: Some(
                            request_headers.as_ref().map(extract_headers).unwrap_or_default(),
                        ),
                        response_headers: Some(extract_headers(&copy.headers)),
                        request_body,
                        response_body: Some(decode_body(copy.body())),
                        duration_ms: Some(duration_ms),
                    });
                }
                Err(err) => {
                    let message = err.message.clone();
                    reporter.report_with(move || NetworkPayload {
                        method,
                        url,
                        status_code: None,
                        request_headers: Some(
                            request_headers.as_ref().map(extract_headers).unwrap_or_default(),
                        ),
                        response_headers: Some(HeaderMap::new()),
                        request_body,
                        response_body: Some(Value::String(message)),
                        duration_ms: Some(duration_ms),
                    });
                }
            }

            result
        })
    }
}

/// Wrapper installed in the legacy request factory slot.
struct ObservedRequestFactory {
    inner: Arc<dyn RequestFactory>,
    reporter: Reporter<NetworkPayload>,
}

impl RequestFactory for ObservedRequestFactory {
    fn create(&self) -> Box<dyn LegacyRequest> {
        Box::new(ObservedRequest {
            inner: self.inner.create(),
            reporter: self.reporter.clone(),
            method: "GET".to_string(),
            url: String::new(),
            headers: HeaderMap::new(),
            started: None,
            sent: Arc::new(Mutex::new(None)),
            caller_load: Arc::new(Mutex::new(None)),
            caller_error: Arc::new(Mutex::new(None)),
            tapped: false,
        })
    }
}

/// Request state frozen at `send`.
#[derive(Clone)]
struct SentRequest {
    method: String,
    url: String,
    headers: HeaderMap,
    body: Option<Value>,
    started: Instant,
}

impl SentRequest {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

type Shared<T> = Arc<Mutex<Option<T>>>;

fn read_shared<T: Clone>(cell: &Shared<T>) -> Option<T> {
    match cell.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write_shared<T>(cell: &Shared<T>, value: Option<T>) {
    match cell.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

/// Decorator around one legacy request instance.
///
/// The instance may be reopened and sent again. Each `send` overwrites the
/// shared snapshot, and the handlers installed on the first `send` always
/// report the latest one. Caller handlers set after that live in shared cells
/// so the tapped handlers stay in place on the host object.
struct ObservedRequest {
    inner: Box<dyn LegacyRequest>,
    reporter: Reporter<NetworkPayload>,
    method: String,
    url: String,
    headers: HeaderMap,
    started: Option<Instant>,
    sent: Shared<SentRequest>,
    caller_load: Shared<LoadHandler>,
    caller_error: Shared<ErrorHandler>,
    tapped: bool,
}

impl ObservedRequest {
    fn tap_handlers(&mut self) {
        write_shared(&self.caller_load, self.inner.on_load());
        write_shared(&self.caller_error, self.inner.on_error());

        let reporter = self.reporter.clone();
        let sent = self.sent.clone();
        let caller_load = self.caller_load.clone();
        let on_load: LoadHandler = Arc::new(move |event: &LoadEvent| {
            if let Some(request) = read_shared(&sent) {
                let duration_ms = request.elapsed_ms();
                let event_copy = event.clone();
                reporter.report_with(move || NetworkPayload {
                    method: request.method,
                    url: request.url,
                    status_code: Some(event_copy.status),
                    request_headers: Some(request.headers),
                    response_headers: Some(
                        event_copy
                            .raw_headers
                            .as_deref()
                            .map(parse_header_block)
                            .unwrap_or_default(),
                    ),
                    request_body: request.body,
                    response_body: Some(Value::String(
                        event_copy
                            .response_text
                            .unwrap_or_else(|| UNREADABLE_BODY.to_string()),
                    )),
                    duration_ms: Some(duration_ms),
                });
            }
            if let Some(handler) = read_shared(&caller_load) {
                handler(event);
            }
        });
        self.inner.set_on_load(Some(on_load));

        let reporter = self.reporter.clone();
        let sent = self.sent.clone();
        let caller_error = self.caller_error.clone();
        let on_error: ErrorHandler = Arc::new(move |err: &NetworkError| {
            if let Some(request) = read_shared(&sent) {
                let duration_ms = request.elapsed_ms();
                reporter.report_with(move || NetworkPayload {
                    method: request.method,
                    url: request.url,
                    status_code: None,
                    request_headers: Some(request.headers),
                    response_headers: Some(HeaderMap::new()),
                    request_body: request.body,
                    response_body: Some(Value::String(LEGACY_NETWORK_ERROR.to_string())),
                    duration_ms: Some(duration_ms),
                });
            }
            if let Some(handler) = read_shared(&caller_error) {
                handler(err);
            }
        });
        self.inner.set_on_error(Some(on_error));
        self.tapped = true;
    }
}

impl LegacyRequest for ObservedRequest {
    fn open(&mut self, method: &str, url: &str) -> Result<(), NetworkError> {
        self.started = Some(Instant::now());
        self.method = method.to_uppercase();
        self.url = url.to_string();
        self.headers.clear();
        self.inner.open(method, url)
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), NetworkError> {
        self.headers.insert(name.to_string(), value.to_string());
        self.inner.set_request_header(name, value)
    }

    fn on_load(&self) -> Option<LoadHandler> {
        if self.tapped {
            read_shared(&self.caller_load)
        } else {
            self.inner.on_load()
        }
    }

    fn set_on_load(&mut self, handler: Option<LoadHandler>) {
        if self.tapped {
            write_shared(&self.caller_load, handler);
        } else {
            self.inner.set_on_load(handler);
        }
    }

    fn on_error(&self) -> Option<ErrorHandler> {
        if self.tapped {
            read_shared(&self.caller_error)
        } else {
            self.inner.on_error()
        }
    }

    fn set_on_error(&mut self, handler: Option<ErrorHandler>) {
        if self.tapped {
            write_shared(&self.caller_error, handler);
        } else {
            self.inner.set_on_error(handler);
        }
    }

    fn send(&mut self, body: Option<Value>) -> Result<(), NetworkError> {
        if self.reporter.is_live() {
            // Headers are snapshotted here, not at open: the recorded request
            // is the one that actually went out.
            let snapshot = SentRequest {
                method: self.method.clone(),
                url: self.url.clone(),
                headers: self.headers.clone(),
                body: body.clone(),
                started: self.started.take().unwrap_or_else(Instant::now),
            };
            write_shared(&self.sent, Some(snapshot));
            if !self.tapped {
                self.tap_handlers();
            }
        } else {
            write_shared(&self.sent, None);
        }
        self.inner.send(body)
    }
}
