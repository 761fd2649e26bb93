//! Expands a PipelineTask into a TaskRun

use crate::core::{
    ObjectMeta, OwnerReference, Pipeline, PipelineResource, PipelineResourceRef, PipelineRun,
    PipelineTask, ResourceKind, SourceBinding, TaskRun, TaskRunInputs, TaskRunOutputs,
    TaskRunResourceVersion, TaskRunSpec, TaskRunStatus, API_VERSION, PIPELINE_LABEL_KEY,
    PIPELINE_RUN_LABEL_KEY,
};
use std::collections::BTreeMap;

/// Name of the TaskRun created for `task_name` within `run_name`
pub fn task_run_name(run_name: &str, task_name: &str) -> String {
    format!("{}-{}", run_name, task_name)
}

/// Build the TaskRun spec for one PipelineTask.
///
/// Params are copied verbatim; placeholder syntax is left for the execution
/// engine. Each binding becomes a resource-version entry that carries only the
/// resolved resource's identity.
pub fn expand(
    pipeline_task: &PipelineTask,
    service_account: &str,
    resources: &BTreeMap<String, PipelineResource>,
) -> TaskRunSpec {
    TaskRunSpec {
        service_account: service_account.to_string(),
        task_ref: pipeline_task.task_ref.clone(),
        inputs: TaskRunInputs {
            resources: pipeline_task
                .input_source_bindings
                .iter()
                .map(|b| resource_version(b, resources))
                .collect(),
            params: pipeline_task.params.clone(),
        },
        outputs: TaskRunOutputs {
            resources: pipeline_task
                .output_source_bindings
                .iter()
                .map(|b| resource_version(b, resources))
                .collect(),
        },
    }
}

fn resource_version(
    binding: &SourceBinding,
    resources: &BTreeMap<String, PipelineResource>,
) -> TaskRunResourceVersion {
    let name = resources
        .get(&binding.resource_ref.name)
        .map(|r| r.metadata.name.clone())
        .unwrap_or_else(|| binding.resource_ref.name.clone());

    TaskRunResourceVersion {
        resource_ref: PipelineResourceRef { name },
        name: binding.name.clone(),
    }
}

/// Owner reference that ties a child to its PipelineRun for cascading deletion
pub fn owner_reference(run: &PipelineRun) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: ResourceKind::PipelineRun.as_str().to_string(),
        name: run.metadata.name.clone(),
        uid: run.metadata.uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Wrap a spec into a TaskRun with its deterministic name, owner and labels
pub fn build_task_run(
    run: &PipelineRun,
    pipeline: &Pipeline,
    pipeline_task: &PipelineTask,
    spec: TaskRunSpec,
) -> TaskRun {
    let mut metadata = ObjectMeta::new(
        &run.metadata.namespace,
        task_run_name(&run.metadata.name, &pipeline_task.name),
    );
    metadata.owner_references.push(owner_reference(run));
    metadata
        .labels
        .insert(PIPELINE_LABEL_KEY.to_string(), pipeline.metadata.name.clone());
    metadata
        .labels
        .insert(PIPELINE_RUN_LABEL_KEY.to_string(), run.metadata.name.clone());

    TaskRun {
        metadata,
        spec,
        status: TaskRunStatus::default(),
    }
}
