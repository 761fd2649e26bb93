//! Worker pool that drains the work queue into the reconciler

pub mod queue;

pub use queue::WorkQueue;

use crate::core::config::ControllerConfig;
use crate::core::ObjectKey;
use crate::persistence::{Lister, StoreError};
use crate::reconciler::Reconciler;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delivers run keys to the reconciler with retry and backoff
pub struct Controller {
    reconciler: Arc<Reconciler>,
    queue: WorkQueue,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(reconciler: Reconciler, config: ControllerConfig) -> Self {
        let queue = WorkQueue::new(config.backoff_base(), config.backoff_max());
        Self {
            reconciler: Arc::new(reconciler),
            queue,
            config,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Queue a raw key; malformed keys are dropped by the reconciler
    pub fn enqueue(&self, key: impl Into<String>) {
        self.queue.add(key);
    }

    /// Queue every PipelineRun the lister knows about
    pub async fn enqueue_all(&self, lister: &dyn Lister) -> Result<usize, StoreError> {
        resync(&self.queue, lister).await
    }

    /// Forward store change notifications into the queue until cancelled
    pub fn watch(
        &self,
        mut changes: broadcast::Receiver<ObjectKey>,
        lister: Arc<dyn Lister>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => change,
                };

                match change {
                    Ok(key) => queue.add(key.to_string()),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} change notifications, resyncing", missed);
                        if let Err(e) = resync(&queue, lister.as_ref()).await {
                            error!("Resync failed: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Watch stopped");
        })
    }

    /// Run the worker pool until `cancel` fires, then shut the queue down
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Starting controller with {} workers", self.config.workers);

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                reconciler: self.reconciler.clone(),
                queue: self.queue.clone(),
                max_requeues: self.config.max_requeues,
                cancel: cancel.clone(),
            };
            workers.spawn(worker.run());
        }

        cancel.cancelled().await;
        info!("Shutting down controller");
        self.queue.shut_down();

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Worker panicked: {}", e);
            }
        }
    }

    /// Resolve once every queued key has been handled and no retry is pending
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }
}

async fn resync(queue: &WorkQueue, lister: &dyn Lister) -> Result<usize, StoreError> {
    let runs = lister.list_pipeline_runs().await?;
    let count = runs.len();
    for run in runs {
        queue.add(run.metadata.key().to_string());
    }
    debug!("Queued {} PipelineRuns", count);
    Ok(count)
}

struct Worker {
    id: usize,
    reconciler: Arc<Reconciler>,
    queue: WorkQueue,
    max_requeues: Option<u32>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
            self.queue.done(&key);
        }
        debug!("Worker {} stopped", self.id);
    }

    async fn process(&self, key: &str) {
        debug!("Worker {} reconciling {}", self.id, key);

        match self.reconciler.reconcile(&self.cancel, key).await {
            Ok(()) => self.queue.forget(key),
            Err(e) if !e.is_retryable() => {
                error!("Dropping {}: {}", key, e);
                self.queue.forget(key);
            }
            Err(e) => {
                if self.cancel.is_cancelled() {
                    debug!("Reconcile of {} interrupted by shutdown", key);
                    return;
                }

                let failures = self.queue.num_requeues(key);
                if self.max_requeues.is_some_and(|max| failures >= max) {
                    error!("Dropping {} after {} retries: {}", key, failures, e);
                    self.queue.forget(key);
                    return;
                }

                let delay = self.queue.add_rate_limited(key);
                warn!("Error reconciling {}, retrying in {:?}: {}", key, delay, e);
            }
        }
    }
}
