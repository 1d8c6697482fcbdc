//! Deferred reporting.
//!
//! Interceptors never record inline: once the original capability has
//! finished, the report is handed to a [`Scheduler`] which runs it after the
//! caller's stack has unwound. Recording therefore cannot change the timing
//! or error semantics the caller observes, and cannot recurse into an
//! instrumented call that is still on the stack.

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::guard::attempt;

/// Unit of deferred work.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs a task after the current call stack unwinds.
pub trait Scheduler: Send + Sync {
    fn defer(&self, task: DeferredTask);
}

/// Spawns each task on a tokio runtime.
///
/// A spawned task never runs inside the `spawn` call itself, which is the
/// ordering guarantee reporting needs.
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: DeferredTask) {
        self.handle.spawn(async move {
            attempt("deferred report", task, ());
        });
    }
}

/// Single FIFO worker thread, for hosts without a tokio runtime.
pub struct ThreadScheduler {
    tx: Mutex<mpsc::Sender<DeferredTask>>,
}

impl ThreadScheduler {
    pub fn spawn(name: &str) -> Self {
        let (tx, rx) = mpsc::channel::<DeferredTask>();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    attempt("deferred report", task, ());
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn report worker; reports will be dropped");
        }
        Self { tx: Mutex::new(tx) }
    }
}

impl Scheduler for ThreadScheduler {
    fn defer(&self, task: DeferredTask) {
        let Ok(tx) = self.tx.lock() else {
            debug!("report worker sender poisoned; dropping report");
            return;
        };
        if tx.send(task).is_err() {
            debug!("report worker gone; dropping report");
        }
    }
}

/// Queue drained explicitly with [`ManualScheduler::run_pending`].
///
/// Used by tests and deterministic harnesses that need to observe the state
/// both before and after reports run.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<DeferredTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Run queued tasks, including any they enqueue, until the queue is empty.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = match self.queue.lock() {
                Ok(mut queue) => queue.pop_front(),
                Err(_) => None,
            };
            let Some(task) = next else {
                return ran;
            };
            attempt("deferred report", task, ());
            ran += 1;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: DeferredTask) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(task);
        }
    }
}

/// Tokio when a runtime is current, otherwise a dedicated worker thread.
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    match TokioScheduler::try_current() {
        Some(scheduler) => Arc::new(scheduler),
        None => Arc::new(ThreadScheduler::spawn("bugbubble-report")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn manual_scheduler_runs_nothing_until_drained() {
        let scheduler = Arc::new(ManualScheduler::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        scheduler.defer(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manual_scheduler_drains_nested_tasks() {
        let scheduler = Arc::new(ManualScheduler::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let counter = hits.clone();
        scheduler.defer(Box::new(move || {
            let counter = counter.clone();
            inner_scheduler.defer(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(scheduler.run_pending(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_does_not_stop_queue() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.defer(Box::new(|| panic!("report failed")));
        let counter = hits.clone();
        scheduler.defer(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.run_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn thread_scheduler_runs_in_order() {
        let scheduler = ThreadScheduler::spawn("test-report");
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            scheduler.defer(Box::new(move || {
                let _ = tx.send(i);
            }));
        }
        let seen: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn tokio_scheduler_defers_past_caller() {
        let scheduler = TokioScheduler::try_current().expect("runtime present");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.defer(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        rx.await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
