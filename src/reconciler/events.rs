//! Events emitted while reconciling

use crate::core::{Condition, ObjectKey};
use crate::reconciler::error::ValidationError;
use std::sync::Arc;

/// Things worth telling an operator about
#[derive(Debug, Clone)]
pub enum ReconcileEvent {
    /// The key was dropped without error: malformed, or the run is gone
    KeyDropped { key: String, reason: String },

    ValidationFailed {
        run: ObjectKey,
        error: ValidationError,
    },

    TaskRunCreated { run: ObjectKey, task_run: String },

    ConditionChanged { run: ObjectKey, condition: Condition },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ReconcileEvent) + Send + Sync>;
