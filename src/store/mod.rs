//! Event log store.
//!
//! One process-wide [`LogStore`] owns the bounded, newest-first buffer, the
//! merged configuration and the presentation state (visibility, selected
//! category, search text). Interceptors feed it through callbacks bound at
//! construction; hosts that opt out of interception call the `log_*` helpers
//! (or the free functions in [`crate::api`]).
//!
//! Every mutation notifies observers synchronously after the state lock is
//! released, so an observer may read the store from inside its callback.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::capability::{host, HostCapabilities};
use crate::config::{BugBubbleConfig, PartialConfig, TrackingOptions};
use crate::error::{ErrorCode, RecordError};
use crate::gate;
use crate::guard::attempt;
use crate::interceptors::InterceptorSet;
use crate::model::{
    AnalyticsPayload, Category, ConsolePayload, LogEntry, LogLevel, NetworkPayload, Payload,
    SocketPayload, SocketPhase,
};
use crate::scheduler::{Scheduler, ThreadScheduler};
use crate::search::filter_entries;

mod observers;

pub use observers::{Observer, Subscription};
use observers::ObserverRegistry;

/// Capacity of the entry broadcast channel; slow receivers skip ahead.
const ENTRY_CHANNEL_CAPACITY: usize = 256;

static STORE: Lazy<Arc<LogStore>> = Lazy::new(|| {
    let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::spawn("bugbubble-report"));
    LogStore::new(host(), scheduler)
});

/// The process-wide store, bound to the process-wide [`host()`].
pub fn store() -> Arc<LogStore> {
    STORE.clone()
}

#[derive(Debug, Default)]
struct StoreState {
    initialized: bool,
    /// Front is newest.
    logs: VecDeque<LogEntry>,
    config: BugBubbleConfig,
    visible: bool,
    selected_category: Option<Category>,
    search_text: String,
}

/// Point-in-time copy of the store for presentation layers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub initialized: bool,
    pub logs: Vec<LogEntry>,
    pub config: BugBubbleConfig,
    pub is_visible: bool,
    pub active_category: Option<Category>,
    pub search_query: String,
}

pub struct LogStore {
    state: Mutex<StoreState>,
    observers: Arc<ObserverRegistry>,
    interceptors: InterceptorSet,
    entries_tx: broadcast::Sender<LogEntry>,
}

impl LogStore {
    /// Build a store whose interceptors patch `host` and report via `scheduler`.
    pub fn new(host: Arc<HostCapabilities>, scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        let (entries_tx, _) = broadcast::channel(ENTRY_CHANNEL_CAPACITY);
        Arc::new_cyclic(|weak: &Weak<LogStore>| {
            let interceptors = InterceptorSet::new(host, scheduler);
            bind_interceptors(&interceptors, weak);
            Self {
                state: Mutex::new(StoreState::default()),
                observers: Arc::new(ObserverRegistry::default()),
                interceptors,
                entries_tx,
            }
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>, RecordError> {
        self.state.lock().map_err(|_| RecordError::LockPoisoned)
    }

    /// Merge `partial` over the defaults and start the interceptors of every
    /// enabled category. Only the first call has any effect.
    pub fn initialize(&self, partial: PartialConfig) {
        let enabled = {
            let Ok(mut state) = self.lock_state() else {
                warn!("store state poisoned, initialization skipped");
                return;
            };
            if state.initialized {
                debug!("store already initialized");
                return;
            }
            state.config = BugBubbleConfig::from_partial(&partial);
            state.initialized = true;
            gate::enabled_categories(&state.config)
        };

        for category in &enabled {
            let interceptor = self.interceptors.get(*category);
            attempt("interceptor start", || interceptor.start(), ());
        }
        info!(categories = ?enabled, "bugbubble store initialized");
        self.notify();
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().map(|s| s.initialized).unwrap_or(false)
    }

    /// Record `entry`; rejections are logged at debug level and dropped.
    pub fn record(&self, entry: LogEntry) {
        if let Err(err) = self.try_record(entry) {
            debug!(code = err.code(), "entry dropped: {}", err.message());
        }
    }

    /// Like [`LogStore::record`] but reports why an entry was dropped.
    pub fn try_record(&self, mut entry: LogEntry) -> Result<(), RecordError> {
        {
            let mut state = self.lock_state()?;
            if !state.initialized {
                return Err(RecordError::NotInitialized);
            }
            entry.validate()?;
            let category = entry.category();
            if !gate::is_enabled(category, &state.config) {
                return Err(RecordError::CategoryDisabled { category });
            }

            if let Some(newest) = state.logs.front() {
                entry.timestamp_ms = entry.timestamp_ms.max(newest.timestamp_ms);
            }
            let max_logs = state.config.max_logs;
            state.logs.push_front(entry.clone());
            state.logs.truncate(max_logs);
        }

        let _ = self.entries_tx.send(entry);
        self.notify();
        Ok(())
    }

    /// Record a network exchange.
    pub fn log_network(&self, payload: NetworkPayload) {
        self.record(LogEntry::network(payload));
    }

    pub fn log_socket(&self, phase: SocketPhase, url: Option<String>, data: Option<Value>) {
        self.record(LogEntry::socket(SocketPayload { phase, url, data }));
    }

    pub fn log_console(&self, level: LogLevel, args: Vec<Value>) {
        self.record(LogEntry::console(level, args));
    }

    pub fn log_event(&self, name: impl Into<String>, properties: Option<Map<String, Value>>) {
        self.record(LogEntry::analytics(name, properties));
    }

    /// Register an observer called after every mutation, in registration order.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.register(Arc::new(observer))
    }

    /// Drop every entry of `category`, or everything when `None`.
    pub fn clear(&self, category: Option<Category>) {
        self.mutate(|state| match category {
            Some(category) => state.logs.retain(|entry| entry.category() != category),
            None => state.logs.clear(),
        });
    }

    pub fn set_visible(&self, visible: bool) {
        self.mutate(|state| state.visible = visible);
    }

    pub fn set_selected_category(&self, category: Option<Category>) {
        self.mutate(|state| state.selected_category = category);
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.mutate(|state| state.search_text = text);
    }

    pub fn clear_search_text(&self) {
        self.mutate(|state| state.search_text.clear());
    }

    /// Toggle one category's override. Takes effect at the next `record`;
    /// interceptors are not re-patched.
    pub fn set_category_enabled(&self, category: Category, enabled: bool) {
        self.mutate(|state| {
            state
                .config
                .tracking_options
                .get_or_insert_with(TrackingOptions::default)
                .options
                .set(category, Some(enabled));
        });
    }

    /// Flip the master tracking switch.
    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.mutate(|state| {
            state
                .config
                .tracking_options
                .get_or_insert_with(TrackingOptions::default)
                .enabled = enabled;
        });
    }

    /// Entries of `category` matching the current search text, newest first.
    pub fn get_filtered(&self, category: Category) -> Vec<LogEntry> {
        match self.lock_state() {
            Ok(state) => filter_entries(&state.logs, category, &state.search_text),
            Err(_) => Vec::new(),
        }
    }

    pub fn enabled_categories(&self) -> Vec<Category> {
        match self.lock_state() {
            Ok(state) => gate::enabled_categories(&state.config),
            Err(_) => Vec::new(),
        }
    }

    pub fn config(&self) -> BugBubbleConfig {
        self.lock_state()
            .map(|state| state.config.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock_state().map(|state| state.logs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_state(&self) -> StoreSnapshot {
        match self.lock_state() {
            Ok(state) => StoreSnapshot {
                initialized: state.initialized,
                logs: state.logs.iter().cloned().collect(),
                config: state.config.clone(),
                is_visible: state.visible,
                active_category: state.selected_category,
                search_query: state.search_text.clone(),
            },
            Err(_) => StoreSnapshot {
                initialized: false,
                logs: Vec::new(),
                config: BugBubbleConfig::default(),
                is_visible: false,
                active_category: None,
                search_query: String::new(),
            },
        }
    }

    /// Receiver of every entry accepted from now on.
    pub fn subscribe_entries(&self) -> broadcast::Receiver<LogEntry> {
        self.entries_tx.subscribe()
    }

    /// Stream of accepted entries; entries missed by a lagging consumer are
    /// skipped rather than ending the stream.
    pub fn entry_stream(&self) -> impl Stream<Item = LogEntry> + Send + 'static {
        BroadcastStream::new(self.entries_tx.subscribe()).filter_map(|item| item.ok())
    }

    pub fn interceptors(&self) -> &InterceptorSet {
        &self.interceptors
    }

    /// Active flag of each interceptor.
    pub fn interceptor_status(&self) -> BTreeMap<Category, bool> {
        self.interceptors
            .all()
            .iter()
            .map(|interceptor| (interceptor.category(), interceptor.is_active()))
            .collect()
    }

    /// Restore every patched capability.
    pub fn shutdown_interceptors(&self) {
        for interceptor in self.interceptors.all() {
            attempt("interceptor stop", || interceptor.stop(), ());
        }
        info!("bugbubble interceptors stopped");
    }

    fn mutate(&self, apply: impl FnOnce(&mut StoreState)) {
        match self.lock_state() {
            Ok(mut state) => apply(&mut state),
            Err(err) => {
                warn!(code = err.code(), "{}", err.message());
                return;
            }
        }
        self.notify();
    }

    fn notify(&self) {
        self.observers.notify();
    }
}

/// Route interceptor reports into the store behind `weak`.
fn bind_interceptors(interceptors: &InterceptorSet, weak: &Weak<LogStore>) {
    let store = weak.clone();
    interceptors
        .network
        .set_callback(Arc::new(move |payload: NetworkPayload| {
            if let Some(store) = store.upgrade() {
                store.record(LogEntry::network(payload));
            }
        }));

    let store = weak.clone();
    interceptors
        .socket
        .set_callback(Arc::new(move |payload: SocketPayload| {
            if let Some(store) = store.upgrade() {
                store.record(LogEntry::socket(payload));
            }
        }));

    let store = weak.clone();
    interceptors
        .console
        .set_callback(Arc::new(move |payload: ConsolePayload| {
            if let Some(store) = store.upgrade() {
                let summary = payload.text.clone();
                store.record(LogEntry::new(
                    payload.level,
                    summary,
                    Payload::Console(payload),
                ));
            }
        }));

    let store = weak.clone();
    interceptors
        .analytics
        .set_callback(Arc::new(move |payload: AnalyticsPayload| {
            if let Some(store) = store.upgrade() {
                store.record(LogEntry::analytics(payload.name, payload.properties));
            }
        }));
}
