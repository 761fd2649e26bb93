//! PipelineResources and PipelineParams

use crate::core::meta::{impl_resource, ObjectMeta, ResourceKind};
use crate::core::pipeline::Param;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Types of external artifacts a PipelineResource can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineResourceType {
    Git,
    Image,
    Gcs,
    Cluster,
}

impl fmt::Display for PipelineResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineResourceType::Git => "git",
            PipelineResourceType::Image => "image",
            PipelineResourceType::Gcs => "gcs",
            PipelineResourceType::Cluster => "cluster",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: PipelineResourceType,

    #[serde(default)]
    pub params: Vec<Param>,
}

/// A named, typed external artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResource {
    pub metadata: ObjectMeta,
    pub spec: PipelineResourceSpec,
}

impl_resource!(PipelineResource, ResourceKind::PipelineResource);

impl PipelineResource {
    pub fn new(metadata: ObjectMeta, resource_type: PipelineResourceType, params: Vec<Param>) -> Self {
        Self {
            metadata,
            spec: PipelineResourceSpec {
                resource_type,
                params,
            },
        }
    }

    /// Value of a resource parameter such as `url`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.spec
            .params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineParamsSpec {
    #[serde(default)]
    pub service_account: String,
}

/// Run-level configuration shared by all TaskRuns of a PipelineRun
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PipelineParamsSpec,
}

impl_resource!(PipelineParams, ResourceKind::PipelineParams);

impl PipelineParams {
    pub fn new(metadata: ObjectMeta, service_account: impl Into<String>) -> Self {
        Self {
            metadata,
            spec: PipelineParamsSpec {
                service_account: service_account.into(),
            },
        }
    }
}
