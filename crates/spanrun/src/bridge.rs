//! # Async Bridge
//!
//! Host futures complete on scheduler threads; guest deferreds may only be
//! resolved on the guest thread. The bridge is the one-way valve between
//! the two: completions are enqueued from anywhere, delivered only when the
//! guest thread drains once per tick.
//!
//! ## Invariants
//!
//! - **Drain never blocks**: it takes whatever has completed by now and
//!   returns. A completion that lands mid-drain waits for the next tick.
//! - **Late completions are dropped, not cancelled**: the continuation
//!   still runs to the end; its result simply has nowhere to go once the
//!   context is torn down.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use spanwire::Value;
use tokio::sync::mpsc;
use tracing::trace;

/// Strong type for pending task identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// The guest-side sink for drained completions. Implementations resolve or
/// reject the deferred the guest associated with the task.
pub trait DeferredResolver {
    fn resolve(&mut self, task: TaskId, value: Value);
    fn reject(&mut self, task: TaskId, message: &str);
}

struct Completed {
    task: TaskId,
    outcome: std::result::Result<Value, String>,
}

/// The completion queue for one guest context.
pub struct AsyncBridge {
    tx: mpsc::UnboundedSender<Completed>,
    // Taken only by drain, on the guest thread.
    rx: Mutex<mpsc::UnboundedReceiver<Completed>>,
    next: AtomicU64,
    in_flight: AtomicU64,
}

impl AsyncBridge {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            next: AtomicU64::new(1),
            in_flight: AtomicU64::new(0),
        }
    }

    /// Spawns a host future and returns the task id the guest will see its
    /// completion under. Must be called within a tokio runtime.
    pub fn register_task<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = std::result::Result<Value, String>> + Send + 'static,
    {
        let task = TaskId(self.next.fetch_add(1, Ordering::Relaxed));
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = future.await;
            // A closed queue means the context is gone; the result is
            // dropped on the floor by design.
            let _ = tx.send(Completed { task, outcome });
        });

        task
    }

    /// Enqueues an already-known outcome without spawning. Used by host
    /// code that completes synchronously but was promised a deferred.
    pub fn complete(&self, task: TaskId, outcome: std::result::Result<Value, String>) {
        let _ = self.tx.send(Completed { task, outcome });
    }

    /// Mints a task id without spawning, for use with [`complete`].
    ///
    /// [`complete`]: AsyncBridge::complete
    pub fn reserve_task(&self) -> TaskId {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Delivers every completion that has landed so far. Runs on the guest
    /// thread once per tick; never waits for stragglers.
    pub fn drain(&self, resolver: &mut dyn DeferredResolver) -> usize {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;

        while let Ok(completed) = rx.try_recv() {
            match completed.outcome {
                Ok(value) => resolver.resolve(completed.task, value),
                Err(message) => resolver.reject(completed.task, &message),
            }
            delivered += 1;
        }

        if delivered > 0 {
            self.in_flight.fetch_sub(delivered as u64, Ordering::Relaxed);
            trace!(delivered, "async bridge drained");
        }
        delivered
    }

    /// Tasks registered but not yet drained.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Default for AsyncBridge {
    fn default() -> Self {
        Self::new()
    }
}
