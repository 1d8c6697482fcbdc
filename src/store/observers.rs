//! Observer registry backing `LogStore::subscribe`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::guard::attempt;

/// Invoked after every store mutation.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Observers in registration order.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Mutex<Vec<(u64, Observer)>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub(crate) fn register(self: &Arc<Self>, observer: Observer) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.observers.lock() {
            Ok(mut observers) => observers.push((id, observer)),
            Err(poisoned) => poisoned.into_inner().push((id, observer)),
        }
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        let mut observers = match self.observers.lock() {
            Ok(observers) => observers,
            Err(poisoned) => poisoned.into_inner(),
        };
        observers.retain(|(existing, _)| *existing != id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.observers.lock().map(|o| o.len()).unwrap_or(0)
    }

    /// Call every observer; a panicking observer does not stop the others.
    ///
    /// The list is copied first so observers may subscribe or unsubscribe
    /// from inside their callback.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<Observer> = match self.observers.lock() {
            Ok(observers) => observers.iter().map(|(_, o)| o.clone()).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(_, o)| o.clone())
                .collect(),
        };
        for observer in snapshot {
            attempt("store observer", || observer(), ());
        }
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving notifications. Dropping the handle keeps the observer registered.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    /// Remove the observer. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
