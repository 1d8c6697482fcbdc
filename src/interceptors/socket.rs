//! Socket interceptor: wraps the socket connector so every new connection is
//! decorated with an internal lifecycle listener.
//!
//! The decorator forwards every operation to the host socket and only ever
//! *adds* a listener, so listeners the caller registers are untouched.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::info;

use super::{Callback, CallbackCell, Interceptor, Reporter};
use crate::capability::{
    HostCapabilities, MessageData, Socket, SocketConnector, SocketEvent, SocketListener,
};
use crate::error::{log_intercept_error, SocketError};
use crate::model::{Category, SocketPayload, SocketPhase};
use crate::scheduler::Scheduler;

#[derive(Default)]
struct SocketState {
    active: bool,
    original: Option<Arc<dyn SocketConnector>>,
    reporter: Option<Reporter<SocketPayload>>,
}

pub struct SocketInterceptor {
    host: Arc<HostCapabilities>,
    scheduler: Arc<dyn Scheduler>,
    callback: Arc<CallbackCell<SocketPayload>>,
    state: Mutex<SocketState>,
}

impl SocketInterceptor {
    pub fn new(host: Arc<HostCapabilities>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            host,
            scheduler,
            callback: Arc::new(CallbackCell::new()),
            state: Mutex::new(SocketState::default()),
        }
    }

    pub fn set_callback(&self, callback: Callback<SocketPayload>) {
        self.callback.set(callback);
    }
}

impl Interceptor for SocketInterceptor {
    fn category(&self) -> Category {
        Category::Socket
    }

    fn start(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.active {
            return;
        }
        let reporter = Reporter::new(self.callback.clone(), self.scheduler.clone());
        let wrapper_reporter = reporter.clone();
        let installed = self.host.socket.install(move |inner| {
            Ok(Arc::new(ObservedConnector {
                inner,
                reporter: wrapper_reporter,
            }) as Arc<dyn SocketConnector>)
        });
        match installed {
            Ok(original) => {
                state.original = Some(original);
                state.reporter = Some(reporter);
                state.active = true;
                info!("socket interceptor started");
            }
            Err(err) => log_intercept_error(&err, Category::Socket),
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
        if let Some(original) = state.original.take() {
            if let Err(err) = self.host.socket.restore(original) {
                log_intercept_error(&err, Category::Socket);
            }
        }
        if let Some(reporter) = state.reporter.take() {
            reporter.retire();
        }
        state.active = false;
        info!("socket interceptor stopped");
    }

    fn is_active(&self) -> bool {
        self.state.lock().map(|state| state.active).unwrap_or(false)
    }
}

struct ObservedConnector {
    inner: Arc<dyn SocketConnector>,
    reporter: Reporter<SocketPayload>,
}

impl SocketConnector for ObservedConnector {
    fn connect(&self, url: &str, protocols: &[String]) -> Result<Box<dyn Socket>, SocketError> {
        let socket = self.inner.connect(url, protocols)?;
        Ok(Box::new(ObservedSocket::new(
            socket,
            url.to_string(),
            self.reporter.clone(),
        )))
    }
}

/// Decorator composing the host socket.
pub(crate) struct ObservedSocket {
    inner: Box<dyn Socket>,
}

impl ObservedSocket {
    fn new(mut inner: Box<dyn Socket>, url: String, reporter: Reporter<SocketPayload>) -> Self {
        let listener: SocketListener = Arc::new(move |event: &SocketEvent| {
            let url = url.clone();
            let event = event.clone();
            reporter.report_with(move || payload_for(event, url));
        });
        inner.add_listener(listener);
        Self { inner }
    }
}

impl Socket for ObservedSocket {
    fn url(&self) -> &str {
        self.inner.url()
    }

    fn add_listener(&mut self, listener: SocketListener) {
        self.inner.add_listener(listener);
    }

    fn send(&mut self, data: MessageData) -> Result<(), SocketError> {
        self.inner.send(data)
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) -> Result<(), SocketError> {
        self.inner.close(code, reason)
    }
}

fn payload_for(event: SocketEvent, url: String) -> SocketPayload {
    let (phase, data) = match event {
        SocketEvent::Open => (SocketPhase::Open, None),
        SocketEvent::Message(data) => (SocketPhase::Message, Some(data.to_value())),
        SocketEvent::Close {
            code,
            reason,
            was_clean,
        } => (
            SocketPhase::Close,
            Some(json!({
                "code": code,
                "reason": reason,
                "wasClean": was_clean.unwrap_or(false),
            })),
        ),
        SocketEvent::Error { message } => {
            (SocketPhase::Error, Some(json!({ "message": message })))
        }
    };
    SocketPayload {
        phase,
        url: Some(url),
        data,
    }
}
