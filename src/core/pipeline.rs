//! Pipeline domain model

use crate::core::meta::{impl_resource, ObjectMeta, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A name/value pair passed through to a TaskRun
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Reference to a Task by name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRef {
    pub name: String,
}

/// Reference to a PipelineResource by name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineResourceRef {
    pub name: String,
}

/// Binds a task-local resource name to a concrete PipelineResource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBinding {
    pub name: String,
    pub resource_ref: PipelineResourceRef,
}

impl SourceBinding {
    pub fn new(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_ref: PipelineResourceRef {
                name: resource.into(),
            },
        }
    }
}

/// One task instance within a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    /// Unique within the pipeline
    pub name: String,

    pub task_ref: TaskRef,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_source_bindings: Vec<SourceBinding>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_source_bindings: Vec<SourceBinding>,
}

impl PipelineTask {
    pub fn new(name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_ref: TaskRef { name: task.into() },
            params: Vec::new(),
            input_source_bindings: Vec::new(),
            output_source_bindings: Vec::new(),
        }
    }

    /// Every resource binding, inputs first
    pub fn bindings(&self) -> impl Iterator<Item = &SourceBinding> {
        self.input_source_bindings
            .iter()
            .chain(self.output_source_bindings.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub tasks: Vec<PipelineTask>,
}

/// An ordered template of PipelineTasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PipelineSpec,
}

impl_resource!(Pipeline, ResourceKind::Pipeline);

impl Pipeline {
    pub fn new(metadata: ObjectMeta, tasks: Vec<PipelineTask>) -> Self {
        Self {
            metadata,
            spec: PipelineSpec { tasks },
        }
    }

    /// Get a pipeline task by name
    pub fn task(&self, name: &str) -> Option<&PipelineTask> {
        self.spec.tasks.iter().find(|t| t.name == name)
    }

    /// First task name that appears more than once, if any
    pub fn duplicate_task_name(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.spec
            .tasks
            .iter()
            .find(|t| !seen.insert(t.name.as_str()))
            .map(|t| t.name.as_str())
    }
}
