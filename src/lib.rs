//! pipeline-controller - reconciles declarative PipelineRuns into TaskRuns

pub mod cli;
pub mod controller;
pub mod core;
pub mod persistence;
pub mod reconciler;

// Re-export commonly used types
pub use controller::{Controller, WorkQueue};
pub use crate::core::config::ControllerConfig;
pub use crate::core::{Condition, ConditionStatus, ObjectKey, PipelineRun, TaskRun};
pub use persistence::{InMemoryStore, Lister, StatusWriter, StoreError, TaskRunCreator};
pub use reconciler::{ReconcileError, ReconcileEvent, Reconciler, ValidationError, ValidationKind};
