//! Object access for the reconciler
//!
//! The reconciler never touches storage directly. It reads through
//! [`Lister`], creates children through [`TaskRunCreator`] and writes run
//! status through [`StatusWriter`], so the reconcile logic can be exercised
//! against the in-memory backend or any other implementation.

pub mod memory;

pub use memory::{InMemoryStore, StoreAction};

use crate::core::{
    ObjectKey, Pipeline, PipelineParams, PipelineResource, PipelineRun, ResourceKind, Task,
    TaskRun,
};
use thiserror::Error;

/// Errors returned by store backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: ResourceKind, key: ObjectKey },

    #[error("conflict writing {kind} {key}: resource version {expected} is stale (current {current})")]
    Conflict {
        kind: ResourceKind,
        key: ObjectKey,
        expected: u64,
        current: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read-only, namespace-scoped lookups
#[async_trait::async_trait]
pub trait Lister: Send + Sync {
    async fn get_pipeline_run(&self, key: &ObjectKey) -> Result<PipelineRun>;

    async fn get_pipeline(&self, namespace: &str, name: &str) -> Result<Pipeline>;

    async fn get_pipeline_params(&self, namespace: &str, name: &str) -> Result<PipelineParams>;

    async fn get_pipeline_resource(&self, namespace: &str, name: &str) -> Result<PipelineResource>;

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Task>;

    async fn get_task_run(&self, namespace: &str, name: &str) -> Result<TaskRun>;

    /// TaskRuns owned by the given PipelineRun, ordered by name
    async fn list_task_runs_for(&self, run: &ObjectKey) -> Result<Vec<TaskRun>>;

    /// Every PipelineRun, ordered by key
    async fn list_pipeline_runs(&self) -> Result<Vec<PipelineRun>>;
}

/// Creates child TaskRuns
#[async_trait::async_trait]
pub trait TaskRunCreator: Send + Sync {
    /// Store a new TaskRun; fails with [`StoreError::AlreadyExists`] on a name clash
    async fn create_task_run(&self, task_run: TaskRun) -> Result<TaskRun>;
}

/// Persists PipelineRun status
#[async_trait::async_trait]
pub trait StatusWriter: Send + Sync {
    /// Replace the stored status if `run.metadata.resource_version` is current.
    ///
    /// Fails with [`StoreError::Conflict`] when the stored object moved on.
    async fn update_pipeline_run_status(&self, run: &PipelineRun) -> Result<PipelineRun>;
}
