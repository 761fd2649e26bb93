//! Task definitions: the interface a TaskRun must satisfy

use crate::core::meta::{impl_resource, ObjectMeta, ResourceKind};
use crate::core::resource::PipelineResourceType;
use serde::{Deserialize, Serialize};

/// A named resource slot with the type it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResource {
    pub name: String,

    #[serde(rename = "type")]
    pub resource_type: PipelineResourceType,
}

/// A declared input parameter; values are not type-checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParam {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inputs {
    #[serde(default)]
    pub resources: Vec<TaskResource>,

    #[serde(default)]
    pub params: Vec<TaskParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub resources: Vec<TaskResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Inputs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Outputs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: TaskSpec,
}

impl_resource!(Task, ResourceKind::Task);

impl Task {
    pub fn new(metadata: ObjectMeta, spec: TaskSpec) -> Self {
        Self { metadata, spec }
    }

    pub fn input_resource(&self, name: &str) -> Option<&TaskResource> {
        self.spec
            .inputs
            .as_ref()
            .and_then(|i| i.resources.iter().find(|r| r.name == name))
    }

    pub fn output_resource(&self, name: &str) -> Option<&TaskResource> {
        self.spec
            .outputs
            .as_ref()
            .and_then(|o| o.resources.iter().find(|r| r.name == name))
    }
}
