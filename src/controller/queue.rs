//! Rate-limited work queue - decides which run key a worker handles next

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Default)]
struct QueueState {
    /// Keys ready to be handed out, in arrival order
    queue: VecDeque<String>,

    /// Keys that need processing; a superset of `queue`
    dirty: HashSet<String>,

    /// Keys currently held by a worker
    processing: HashSet<String>,

    /// Consecutive failures per key
    failures: HashMap<String, u32>,

    /// Delayed re-adds that haven't fired yet
    waiting: usize,

    shutting_down: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.processing.is_empty() && self.waiting == 0
    }
}

struct Inner {
    state: Mutex<QueueState>,
    ready: Notify,
    idle: Notify,
    backoff_base: Duration,
    backoff_max: Duration,
}

/// De-duplicating work queue with per-key exclusivity.
///
/// A key is never handed to two workers at once. Adding a key that is being
/// processed marks it dirty and it is handed out again after [`WorkQueue::done`].
/// Adding a key that is already queued is a no-op.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    pub fn new(backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                ready: Notify::new(),
                idle: Notify::new(),
                backoff_base,
                backoff_max,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // The state is plain bookkeeping; a panicked holder can't leave it torn
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a key for processing
    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = self.state();
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            debug!("Key {} is being processed, will requeue when done", key);
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.ready.notify_one();
    }

    /// Wait for the next key; `None` once the queue is shut down
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.inner.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.inner.ready.notify_one();
                    }
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Release a key obtained from [`WorkQueue::get`]
    pub fn done(&self, key: &str) {
        let mut state = self.state();
        state.processing.remove(key);
        let requeued = state.dirty.contains(key) && !state.shutting_down;
        if requeued {
            state.queue.push_back(key.to_string());
        }
        let idle = state.is_idle();
        drop(state);

        if requeued {
            self.inner.ready.notify_one();
        }
        if idle {
            self.inner.idle.notify_waiters();
        }
    }

    /// Delay before the next attempt of a key that has failed `failures` times
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.inner
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.inner.backoff_max)
    }

    /// Re-add a key after an exponential backoff, returning the delay
    pub fn add_rate_limited(&self, key: &str) -> Duration {
        let delay = {
            let mut state = self.state();
            if state.shutting_down {
                return Duration::ZERO;
            }
            let failures = state.failures.entry(key.to_string()).or_insert(0);
            *failures += 1;
            let failures = *failures;
            state.waiting += 1;
            self.backoff(failures)
        };

        let queue = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
            let idle = {
                let mut state = queue.state();
                state.waiting -= 1;
                state.is_idle()
            };
            if idle {
                queue.inner.idle.notify_waiters();
            }
        });

        delay
    }

    /// Clear the failure history of a key
    pub fn forget(&self, key: &str) {
        self.state().failures.remove(key);
    }

    /// Consecutive failures recorded for a key
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.state().failures.get(key).copied().unwrap_or(0)
    }

    /// Keys waiting to be handed out
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nothing queued, nothing in flight and no delayed re-adds pending
    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }

    /// Resolve once the queue is idle
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop handing out keys; pending [`WorkQueue::get`] calls return `None`
    pub fn shut_down(&self) {
        let mut state = self.state();
        state.shutting_down = true;
        state.queue.clear();
        state.dirty.clear();
        drop(state);
        self.inner.ready.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }
}
