//! TaskRun: the concrete execution request handed to the execution engine

use crate::core::condition::{get_condition, Condition, ConditionType};
use crate::core::meta::{impl_resource, ObjectKey, ObjectMeta, ResourceKind};
use crate::core::pipeline::{Param, PipelineResourceRef, TaskRef};
use serde::{Deserialize, Serialize};

/// Label recording the Pipeline a TaskRun was expanded from
pub const PIPELINE_LABEL_KEY: &str = "pipeline.knative.dev/pipeline";

/// Label recording the PipelineRun a TaskRun belongs to
pub const PIPELINE_RUN_LABEL_KEY: &str = "pipeline.knative.dev/pipelineRun";

/// Pairs a task-local resource name with the PipelineResource it resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunResourceVersion {
    pub resource_ref: PipelineResourceRef,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRunInputs {
    #[serde(default)]
    pub resources: Vec<TaskRunResourceVersion>,

    #[serde(default)]
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRunOutputs {
    #[serde(default)]
    pub resources: Vec<TaskRunResourceVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    #[serde(default)]
    pub service_account: String,

    pub task_ref: TaskRef,

    #[serde(default)]
    pub inputs: TaskRunInputs,

    #[serde(default)]
    pub outputs: TaskRunOutputs,
}

/// Written by the execution engine, read by the condition tracker
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRunStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl TaskRunStatus {
    pub fn succeeded(&self) -> Option<&Condition> {
        get_condition(&self.conditions, ConditionType::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRun {
    pub metadata: ObjectMeta,
    pub spec: TaskRunSpec,

    #[serde(default)]
    pub status: TaskRunStatus,
}

impl_resource!(TaskRun, ResourceKind::TaskRun);

impl TaskRun {
    /// Key of the PipelineRun that controls this TaskRun
    pub fn owning_run(&self) -> Option<ObjectKey> {
        self.metadata
            .controller_ref()
            .filter(|owner| owner.kind == ResourceKind::PipelineRun.as_str())
            .map(|owner| ObjectKey::new(&self.metadata.namespace, &owner.name))
    }

    pub fn has_failed(&self) -> bool {
        self.status.succeeded().is_some_and(|c| c.is_false())
    }

    pub fn has_succeeded(&self) -> bool {
        self.status.succeeded().is_some_and(|c| c.is_true())
    }

    /// Succeeded or failed
    pub fn is_done(&self) -> bool {
        self.status.succeeded().is_some_and(|c| c.is_terminal())
    }
}
