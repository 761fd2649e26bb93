//! PipelineRun: a single execution request for a Pipeline

use crate::core::condition::{get_condition, set_condition, Condition, ConditionType};
use crate::core::meta::{impl_resource, ObjectMeta, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineParamsRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub pipeline_ref: PipelineRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_params_ref: Option<PipelineParamsRef>,
}

impl PipelineRunSpec {
    /// Name of the referenced PipelineParams; an empty name counts as unset
    pub fn params_name(&self) -> Option<&str> {
        self.pipeline_params_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Summary of one child TaskRun as seen on the last reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunTaskRunStatus {
    pub pipeline_task_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Keyed by TaskRun name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_runs: BTreeMap<String, PipelineRunTaskRunStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl PipelineRunStatus {
    pub fn succeeded(&self) -> Option<&Condition> {
        get_condition(&self.conditions, ConditionType::Succeeded)
    }

    /// Set the `Succeeded` condition; returns `true` if it changed
    pub fn set_succeeded(&mut self, condition: Condition) -> bool {
        set_condition(&mut self.conditions, condition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub metadata: ObjectMeta,
    pub spec: PipelineRunSpec,

    #[serde(default)]
    pub status: PipelineRunStatus,
}

impl_resource!(PipelineRun, ResourceKind::PipelineRun);

impl PipelineRun {
    pub fn new(metadata: ObjectMeta, pipeline: impl Into<String>, params: Option<&str>) -> Self {
        Self {
            metadata,
            spec: PipelineRunSpec {
                pipeline_ref: PipelineRef {
                    name: pipeline.into(),
                },
                pipeline_params_ref: params.map(|name| PipelineParamsRef {
                    name: name.to_string(),
                }),
            },
            status: PipelineRunStatus::default(),
        }
    }

    /// Whether the run has reached True or False and needs no more work
    pub fn is_done(&self) -> bool {
        self.status.succeeded().is_some_and(|c| c.is_terminal())
    }
}
