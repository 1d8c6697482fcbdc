//! Capability interceptors.
//!
//! Each interceptor wraps exactly one host capability, forwards every call to
//! the original unchanged, and reports a normalized payload through a
//! registered callback. Interceptors know nothing about storage or gating.
//!
//! Lifecycle per interceptor: `Inactive -> Active` on a successful `start`,
//! `Active -> Inactive` on `stop` or a failed installation. Redundant
//! `start`/`stop` calls are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::model::Category;
use crate::scheduler::Scheduler;

pub mod analytics;
pub mod console;
pub mod network;
pub mod socket;

pub use analytics::AnalyticsInterceptor;
pub use console::ConsoleInterceptor;
pub use network::NetworkInterceptor;
pub use socket::SocketInterceptor;

/// Callback receiving normalized payloads.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Common control surface of all interceptors.
pub trait Interceptor: Send + Sync {
    fn category(&self) -> Category;

    /// Install the wrapper. Idempotent; failures leave the interceptor
    /// inactive and are never returned to the caller.
    fn start(&self);

    /// Restore saved originals. Idempotent and best-effort.
    fn stop(&self);

    fn is_active(&self) -> bool;
}

/// Shared, replaceable callback slot.
pub(crate) struct CallbackCell<T> {
    inner: RwLock<Option<Callback<T>>>,
}

impl<T> CallbackCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub(crate) fn set(&self, callback: Callback<T>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(callback),
            Err(poisoned) => *poisoned.into_inner() = Some(callback),
        }
    }

    pub(crate) fn get(&self) -> Option<Callback<T>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Reporting handle captured by installed wrappers.
///
/// Every `start` mints a fresh `live` flag; `stop` clears it. Wrappers created
/// under an earlier activation (an open socket, a pending request) therefore
/// stop reporting new phases once their interceptor is stopped, while reports
/// already handed to the scheduler still run.
pub(crate) struct Reporter<T> {
    callback: Arc<CallbackCell<T>>,
    scheduler: Arc<dyn Scheduler>,
    live: Arc<AtomicBool>,
}

impl<T> Clone for Reporter<T> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            scheduler: self.scheduler.clone(),
            live: self.live.clone(),
        }
    }
}

impl<T: Send + 'static> Reporter<T> {
    pub(crate) fn new(callback: Arc<CallbackCell<T>>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            callback,
            scheduler,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    /// Defer building and delivering a payload to the next scheduling turn.
    pub(crate) fn report_with<F>(&self, build: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if !self.is_live() {
            return;
        }
        let callback = self.callback.clone();
        self.scheduler.defer(Box::new(move || {
            if let Some(callback) = callback.get() {
                callback(build());
            }
        }));
    }
}

/// The four interceptors bound to one host and scheduler.
pub struct InterceptorSet {
    pub network: Arc<NetworkInterceptor>,
    pub socket: Arc<SocketInterceptor>,
    pub console: Arc<ConsoleInterceptor>,
    pub analytics: Arc<AnalyticsInterceptor>,
}

impl InterceptorSet {
    pub fn new(
        host: Arc<crate::capability::HostCapabilities>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            network: Arc::new(NetworkInterceptor::new(host.clone(), scheduler.clone())),
            socket: Arc::new(SocketInterceptor::new(host.clone(), scheduler.clone())),
            console: Arc::new(ConsoleInterceptor::new(host, scheduler)),
            analytics: Arc::new(AnalyticsInterceptor::new()),
        }
    }

    pub fn get(&self, category: Category) -> &dyn Interceptor {
        match category {
            Category::Network => self.network.as_ref(),
            Category::Socket => self.socket.as_ref(),
            Category::Console => self.console.as_ref(),
            Category::Analytics => self.analytics.as_ref(),
        }
    }

    pub fn all(&self) -> [&dyn Interceptor; 4] {
        [
            self.network.as_ref(),
            self.socket.as_ref(),
            self.console.as_ref(),
            self.analytics.as_ref(),
        ]
    }
}
