//! PipelineRun reconciliation
//!
//! [`Reconciler::reconcile`] takes a `namespace/name` key and drives the run
//! one step closer to its desired state: resolve references, make sure every
//! PipelineTask has a TaskRun, and write back the aggregate condition.

pub mod error;
pub mod events;
pub mod expander;
pub mod orchestrator;
pub mod resolver;
pub mod tracker;


pub use error::{ReconcileError, ValidationError, ValidationKind};
pub use events::{EventHandler, ReconcileEvent};
pub use orchestrator::EnsureSummary;
pub use resolver::ResolvedPipelineRun;

use crate::core::condition::REASON_FAILED_VALIDATION;
use crate::core::{Condition, ConditionStatus, ObjectKey, PipelineRun};
use crate::persistence::{Lister, StatusWriter, StoreError, TaskRunCreator};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Await a store call unless the caller cancels first
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T, ReconcileError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        result = call => result.map_err(ReconcileError::from),
    }
}

/// Reconciles PipelineRuns against a store
pub struct Reconciler {
    lister: Arc<dyn Lister>,
    creator: Arc<dyn TaskRunCreator>,
    status_writer: Arc<dyn StatusWriter>,
    event_handlers: Vec<EventHandler>,
}

impl Reconciler {
    pub fn new(
        lister: Arc<dyn Lister>,
        creator: Arc<dyn TaskRunCreator>,
        status_writer: Arc<dyn StatusWriter>,
    ) -> Self {
        Self {
            lister,
            creator,
            status_writer,
            event_handlers: Vec::new(),
        }
    }

    /// Use one backend for reads, creates and status writes
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: Lister + TaskRunCreator + StatusWriter + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ReconcileEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn lister(&self) -> Arc<dyn Lister> {
        self.lister.clone()
    }

    fn emit(&self, event: ReconcileEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Reconcile the PipelineRun identified by `key` (`namespace/name`).
    ///
    /// Returns `Ok` when there is nothing more to do for now, including for
    /// malformed keys, deleted runs, finished runs and runs that failed
    /// validation. An `Err` is always transient and the key should be retried.
    pub async fn reconcile(&self, cancel: &CancellationToken, key: &str) -> Result<(), ReconcileError> {
        let run_key = match ObjectKey::parse(key) {
            Ok(run_key) => run_key,
            Err(err) => {
                error!("{}", err);
                self.emit(ReconcileEvent::KeyDropped {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
                return Ok(());
            }
        };

        let run = match guarded(cancel, self.lister.get_pipeline_run(&run_key)).await {
            Ok(run) => run,
            Err(err) if err.is_not_found() => {
                let reason = format!("pipeline run \"{}\" in work queue no longer exists", key);
                info!("{}", reason);
                self.emit(ReconcileEvent::KeyDropped {
                    key: key.to_string(),
                    reason,
                });
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if run.is_done() {
            debug!("PipelineRun {} is already done", run_key);
            return Ok(());
        }

        self.reconcile_run(cancel, run).await
    }

    async fn reconcile_run(&self, cancel: &CancellationToken, run: PipelineRun) -> Result<(), ReconcileError> {
        let run_key = run.metadata.key();

        let resolved = match resolver::resolve(self.lister.as_ref(), &run, cancel).await {
            Ok(resolved) => resolved,
            Err(ReconcileError::Validation(err)) => {
                return self.fail_validation(cancel, run, err).await;
            }
            Err(err) => return Err(err),
        };

        let summary = match orchestrator::ensure_task_runs(
            self.lister.as_ref(),
            self.creator.as_ref(),
            &run,
            &resolved,
            cancel,
        )
        .await
        {
            Ok(summary) => summary,
            Err(ReconcileError::Validation(err)) => {
                return self.fail_validation(cancel, run, err).await;
            }
            Err(err) => return Err(err),
        };
        for task_run in &summary.created {
            self.emit(ReconcileEvent::TaskRunCreated {
                run: run_key.clone(),
                task_run: task_run.clone(),
            });
        }

        let children = guarded(cancel, self.lister.list_task_runs_for(&run_key)).await?;
        let children = tracker::children_in_order(&resolved.pipeline, &run.metadata.name, children);
        let condition = tracker::compute_condition(resolved.pipeline.spec.tasks.len(), &children);

        let mut updated = run.clone();
        let now = Utc::now();
        updated.status.start_time.get_or_insert(now);
        updated.status.task_runs = tracker::summarize(&resolved.pipeline, &run.metadata.name, &children);
        let condition_changed = updated.status.set_succeeded(condition.clone());
        if condition.is_terminal() {
            updated.status.completion_time.get_or_insert(now);
        }

        if updated.status == run.status {
            debug!("PipelineRun {} status unchanged", run_key);
            return Ok(());
        }

        guarded(cancel, self.status_writer.update_pipeline_run_status(&updated)).await?;

        if condition_changed {
            info!(
                "PipelineRun {} is {} ({}): {}",
                run_key, condition.status, condition.reason, condition.message
            );
            self.emit(ReconcileEvent::ConditionChanged {
                run: run_key,
                condition,
            });
        }

        Ok(())
    }

    /// Park the run in `False/FailedValidation`; retrying can't fix it
    async fn fail_validation(
        &self,
        cancel: &CancellationToken,
        mut run: PipelineRun,
        err: ValidationError,
    ) -> Result<(), ReconcileError> {
        let run_key = run.metadata.key();
        warn!("PipelineRun {} failed validation: {}", run_key, err);

        let condition = Condition::succeeded(ConditionStatus::False, REASON_FAILED_VALIDATION, err.to_string());
        run.status.set_succeeded(condition.clone());
        run.status.completion_time.get_or_insert_with(Utc::now);

        guarded(cancel, self.status_writer.update_pipeline_run_status(&run)).await?;

        self.emit(ReconcileEvent::ValidationFailed {
            run: run_key.clone(),
            error: err,
        });
        self.emit(ReconcileEvent::ConditionChanged {
            run: run_key,
            condition,
        });
        Ok(())
    }
}
