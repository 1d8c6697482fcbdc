//! Analytics interceptor.
//!
//! Analytics events have no ambient capability to patch: hosts report them
//! explicitly. `start`/`stop` only flip the active flag and `track` is a
//! direct call into the callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Callback, CallbackCell, Interceptor};
use crate::model::{AnalyticsPayload, Category};

pub struct AnalyticsInterceptor {
    active: AtomicBool,
    callback: Arc<CallbackCell<AnalyticsPayload>>,
}

impl AnalyticsInterceptor {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            callback: Arc::new(CallbackCell::new()),
        }
    }

    pub fn set_callback(&self, callback: Callback<AnalyticsPayload>) {
        self.callback.set(callback);
    }

    /// Forward an analytics event to the registered callback.
    pub fn track(&self, name: impl Into<String>, properties: Option<Map<String, Value>>) {
        if let Some(callback) = self.callback.get() {
            callback(AnalyticsPayload {
                name: name.into(),
                properties,
            });
        }
    }
}

impl Default for AnalyticsInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for AnalyticsInterceptor {
    fn category(&self) -> Category {
        Category::Analytics
    }

    fn start(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn start_stop_toggle_flag() {
        let interceptor = AnalyticsInterceptor::new();
        assert!(!interceptor.is_active());
        interceptor.start();
        interceptor.start();
        assert!(interceptor.is_active());
        interceptor.stop();
        assert!(!interceptor.is_active());
    }

    #[test]
    fn track_is_delivered_synchronously() {
        let interceptor = AnalyticsInterceptor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        interceptor.set_callback(Arc::new(move |p| sink.lock().unwrap().push(p)));

        let mut props = Map::new();
        props.insert("plan".to_string(), Value::from("pro"));
        interceptor.track("upgrade", Some(props));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "upgrade");
    }
}
