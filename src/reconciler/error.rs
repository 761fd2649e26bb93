//! Two-tier reconcile errors: terminal validation failures and retryable ones

use crate::persistence::StoreError;
use std::fmt;
use thiserror::Error;

/// What made a PipelineRun invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    PipelineNotFound,
    ParamsNotFound,
    TaskNotFound,
    ResourceNotFound,
    /// The Pipeline itself is malformed, e.g. repeats a task name
    InvalidPipeline,
    /// A binding names a resource the Task doesn't declare
    UndeclaredResource,
    /// A binding points at a PipelineResource of the wrong type
    ResourceTypeMismatch,
    /// The TaskRun name a task derives is taken by another PipelineRun's child
    TaskRunNameConflict,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationKind::PipelineNotFound => "PipelineNotFound",
            ValidationKind::ParamsNotFound => "ParamsNotFound",
            ValidationKind::TaskNotFound => "TaskNotFound",
            ValidationKind::ResourceNotFound => "ResourceNotFound",
            ValidationKind::InvalidPipeline => "InvalidPipeline",
            ValidationKind::UndeclaredResource => "UndeclaredResource",
            ValidationKind::ResourceTypeMismatch => "ResourceTypeMismatch",
            ValidationKind::TaskRunNameConflict => "TaskRunNameConflict",
        };
        f.write_str(s)
    }
}

/// A PipelineRun that can never succeed as written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors surfaced while reconciling a PipelineRun
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Terminal: retrying can't fix a missing or mismatched reference
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Transient: lookup, create or status-write failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller cancelled the reconcile
    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Whether the dispatcher should requeue the key
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReconcileError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::Store(err) if err.is_not_found())
    }
}
