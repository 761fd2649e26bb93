//! Core domain models
//!
//! This module defines the objects the controller reads (Pipelines, Tasks,
//! PipelineResources, PipelineParams, PipelineRuns) and the TaskRuns it
//! creates, along with their shared metadata and status conditions.

pub mod meta;
pub mod config;
pub mod manifest;
pub mod pipeline;
pub mod task;
pub mod resource;
pub mod condition;
pub mod pipelinerun;
pub mod taskrun;

pub use meta::*;
pub use pipeline::*;
pub use task::*;
pub use resource::*;
pub use condition::{Condition, ConditionStatus, ConditionType};
pub use pipelinerun::*;
pub use taskrun::*;
