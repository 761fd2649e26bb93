//! Multi-document YAML manifests

use crate::core::meta::{ObjectMeta, ResourceKind};
use crate::core::{Pipeline, PipelineParams, PipelineResource, PipelineRun, Task, TaskRun};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Namespace given to objects that don't name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Any object that can appear in a manifest, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Pipeline(Pipeline),
    PipelineParams(PipelineParams),
    PipelineResource(PipelineResource),
    Task(Task),
    PipelineRun(PipelineRun),
    TaskRun(TaskRun),
}

impl Object {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Object::Pipeline(_) => ResourceKind::Pipeline,
            Object::PipelineParams(_) => ResourceKind::PipelineParams,
            Object::PipelineResource(_) => ResourceKind::PipelineResource,
            Object::Task(_) => ResourceKind::Task,
            Object::PipelineRun(_) => ResourceKind::PipelineRun,
            Object::TaskRun(_) => ResourceKind::TaskRun,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Object::Pipeline(o) => &o.metadata,
            Object::PipelineParams(o) => &o.metadata,
            Object::PipelineResource(o) => &o.metadata,
            Object::Task(o) => &o.metadata,
            Object::PipelineRun(o) => &o.metadata,
            Object::TaskRun(o) => &o.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Pipeline(o) => &mut o.metadata,
            Object::PipelineParams(o) => &mut o.metadata,
            Object::PipelineResource(o) => &mut o.metadata,
            Object::Task(o) => &mut o.metadata,
            Object::PipelineRun(o) => &mut o.metadata,
            Object::TaskRun(o) => &mut o.metadata,
        }
    }
}

/// Load every object from a manifest file
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Object>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    from_yaml(&content)
}

/// Parse every document of a multi-document YAML string.
///
/// Empty documents are skipped and objects without a namespace land in
/// [`DEFAULT_NAMESPACE`].
pub fn from_yaml(yaml: &str) -> Result<Vec<Object>> {
    let mut objects = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("Invalid YAML in document {}", index + 1))?;
        if value.is_null() {
            continue;
        }

        let mut object: Object = serde_yaml::from_value(value)
            .with_context(|| format!("Invalid object in document {}", index + 1))?;

        let metadata = object.metadata_mut();
        if metadata.name.is_empty() {
            anyhow::bail!("Object in document {} has no metadata.name", index + 1);
        }
        if metadata.namespace.is_empty() {
            metadata.namespace = DEFAULT_NAMESPACE.to_string();
        }

        objects.push(object);
    }

    Ok(objects)
}
