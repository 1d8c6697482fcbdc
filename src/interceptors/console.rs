//! Console interceptor: replaces the five leveled console entry points.
//!
//! Each replacement calls the saved original first, so host-visible output is
//! unchanged, then reports the arguments. Originals are saved and restored
//! per entry point, independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info};

use super::{Callback, CallbackCell, Interceptor, Reporter};
use crate::capability::{ConsoleMethod, ConsoleWriter, HostCapabilities};
use crate::error::{log_intercept_error, InterceptError};
use crate::model::{Category, ConsolePayload, LogLevel};
use crate::scheduler::Scheduler;

#[derive(Default)]
struct ConsoleState {
    active: bool,
    originals: HashMap<ConsoleMethod, Arc<dyn ConsoleWriter>>,
    reporter: Option<Reporter<ConsolePayload>>,
}

pub struct ConsoleInterceptor {
    host: Arc<HostCapabilities>,
    scheduler: Arc<dyn Scheduler>,
    callback: Arc<CallbackCell<ConsolePayload>>,
    state: Mutex<ConsoleState>,
}

impl ConsoleInterceptor {
    pub fn new(host: Arc<HostCapabilities>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            host,
            scheduler,
            callback: Arc::new(CallbackCell::new()),
            state: Mutex::new(ConsoleState::default()),
        }
    }

    pub fn set_callback(&self, callback: Callback<ConsolePayload>) {
        self.callback.set(callback);
    }

    fn install(&self, state: &mut ConsoleState) -> Result<(), InterceptError> {
        let reporter = Reporter::new(self.callback.clone(), self.scheduler.clone());
        let mut originals = HashMap::new();

        for method in ConsoleMethod::ALL {
            let wrapper_reporter = reporter.clone();
            let installed = self.host.console.slot(method).install(move |original| {
                Ok(Arc::new(ObservedWriter {
                    original,
                    level: method.level(),
                    reporter: wrapper_reporter,
                }) as Arc<dyn ConsoleWriter>)
            });
            match installed {
                Ok(original) => {
                    originals.insert(method, original);
                }
                Err(InterceptError::CapabilityMissing { capability }) => {
                    debug!(capability, "console entry point missing, skipping");
                }
                Err(err) => {
                    self.restore_all(&mut originals);
                    return Err(err);
                }
            }
        }

        if originals.is_empty() {
            return Err(InterceptError::CapabilityMissing {
                capability: "console".to_string(),
            });
        }

        state.originals = originals;
        state.reporter = Some(reporter);
        Ok(())
    }

    /// Put back every saved original; one failure does not stop the rest.
    fn restore_all(&self, originals: &mut HashMap<ConsoleMethod, Arc<dyn ConsoleWriter>>) {
        for (method, original) in originals.drain() {
            if let Err(err) = self.host.console.slot(method).restore(original) {
                log_intercept_error(&err, Category::Console);
            }
        }
    }
}

impl Interceptor for ConsoleInterceptor {
    fn category(&self) -> Category {
        Category::Console
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
                    entry_points = state.originals.len(),
                    "console interceptor started"
                );
            }
            Err(err) => log_intercept_error(&err, Category::Console),
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
        let mut originals = std::mem::take(&mut state.originals);
        self.restore_all(&mut originals);
        if let Some(reporter) = state.reporter.take() {
            reporter.retire();
        }
        state.active = false;
        info!("console interceptor stopped");
    }

    fn is_active(&self) -> bool {
        self.state.lock().map(|state| state.active).unwrap_or(false)
    }
}

struct ObservedWriter {
    original: Arc<dyn ConsoleWriter>,
    level: LogLevel,
    reporter: Reporter<ConsolePayload>,
}

impl ConsoleWriter for ObservedWriter {
    fn write(&self, args: &[Value]) {
        self.original.write(args);
        let level = self.level;
        let args = args.to_vec();
        self.reporter
            .report_with(move || ConsolePayload::new(level, args));
    }
}
