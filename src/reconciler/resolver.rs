//! Resolves everything a PipelineRun references

use crate::core::{
    Pipeline, PipelineParams, PipelineResource, PipelineRun, PipelineTask, SourceBinding, Task,
};
use crate::persistence::Lister;
use crate::reconciler::error::{ReconcileError, ValidationError, ValidationKind};
use crate::reconciler::guarded;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A PipelineRun's Pipeline, params, Tasks and PipelineResources, all known to exist
#[derive(Debug, Clone)]
pub struct ResolvedPipelineRun {
    pub pipeline: Pipeline,
    pub params: Option<PipelineParams>,

    /// Keyed by PipelineTask name
    pub tasks: HashMap<String, Task>,

    /// Keyed by PipelineResource name
    pub resources: BTreeMap<String, PipelineResource>,
}

impl ResolvedPipelineRun {
    /// Service account for every TaskRun; empty without PipelineParams
    pub fn service_account(&self) -> &str {
        self.params
            .as_ref()
            .map(|p| p.spec.service_account.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Turn a not-found lookup into a terminal validation error
fn or_invalid<T>(
    result: Result<T, ReconcileError>,
    kind: ValidationKind,
    message: impl FnOnce() -> String,
) -> Result<T, ReconcileError> {
    match result {
        Err(err) if err.is_not_found() => Err(ValidationError::new(kind, message()).into()),
        other => other,
    }
}

/// Resolve the Pipeline, PipelineParams, Tasks and PipelineResources of a run.
///
/// Lookups happen in declaration order and the first problem found is
/// returned. Missing or mismatched references come back as
/// [`ReconcileError::Validation`]; any other lookup failure is transient.
pub async fn resolve(
    lister: &dyn Lister,
    run: &PipelineRun,
    cancel: &CancellationToken,
) -> Result<ResolvedPipelineRun, ReconcileError> {
    let namespace = run.metadata.namespace.as_str();
    let pipeline_name = run.spec.pipeline_ref.name.as_str();

    let pipeline = or_invalid(
        guarded(cancel, lister.get_pipeline(namespace, pipeline_name)).await,
        ValidationKind::PipelineNotFound,
        || format!("Pipeline {}/{} can't be found", namespace, pipeline_name),
    )?;

    if let Some(name) = pipeline.duplicate_task_name() {
        return Err(ValidationError::new(
            ValidationKind::InvalidPipeline,
            format!(
                "Pipeline {}/{} declares task {} more than once",
                namespace, pipeline_name, name
            ),
        )
        .into());
    }

    let params = match run.spec.params_name() {
        Some(params_name) => Some(or_invalid(
            guarded(cancel, lister.get_pipeline_params(namespace, params_name)).await,
            ValidationKind::ParamsNotFound,
            || format!("PipelineParams {}/{} can't be found", namespace, params_name),
        )?),
        None => None,
    };

    let mut tasks = HashMap::new();
    let mut resources: BTreeMap<String, PipelineResource> = BTreeMap::new();

    for pipeline_task in &pipeline.spec.tasks {
        let task_name = pipeline_task.task_ref.name.as_str();
        let task = or_invalid(
            guarded(cancel, lister.get_task(namespace, task_name)).await,
            ValidationKind::TaskNotFound,
            || {
                format!(
                    "Pipeline {}/{} task {} references Task {} which can't be found",
                    namespace, pipeline_name, pipeline_task.name, task_name
                )
            },
        )?;

        let bindings = pipeline_task
            .input_source_bindings
            .iter()
            .map(|b| (b, Direction::Input))
            .chain(
                pipeline_task
                    .output_source_bindings
                    .iter()
                    .map(|b| (b, Direction::Output)),
            );

        for (binding, direction) in bindings {
            let resource_name = binding.resource_ref.name.as_str();
            let resource = match resources.entry(resource_name.to_string()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let resource = or_invalid(
                        guarded(cancel, lister.get_pipeline_resource(namespace, resource_name)).await,
                        ValidationKind::ResourceNotFound,
                        || {
                            format!(
                                "Pipeline {}/{} task {} binds {} {} to PipelineResource {} which can't be found",
                                namespace, pipeline_name, pipeline_task.name, direction, binding.name, resource_name
                            )
                        },
                    )?;
                    entry.insert(resource)
                }
            };
            check_binding(pipeline_task, &task, binding, direction, resource)?;
        }

        tasks.insert(pipeline_task.name.clone(), task);
    }

    debug!(
        "Resolved PipelineRun {}: {} tasks, {} resources",
        run.metadata.key(),
        tasks.len(),
        resources.len()
    );

    Ok(ResolvedPipelineRun {
        pipeline,
        params,
        tasks,
        resources,
    })
}

/// The Task must declare the bound name on the same side, with a matching type
fn check_binding(
    pipeline_task: &PipelineTask,
    task: &Task,
    binding: &SourceBinding,
    direction: Direction,
    resource: &PipelineResource,
) -> Result<(), ValidationError> {
    let declared = match direction {
        Direction::Input => task.input_resource(&binding.name),
        Direction::Output => task.output_resource(&binding.name),
    };

    let Some(declared) = declared else {
        return Err(ValidationError::new(
            ValidationKind::UndeclaredResource,
            format!(
                "task {} binds {} resource {} which Task {} doesn't declare",
                pipeline_task.name, direction, binding.name, task.metadata.name
            ),
        ));
    };

    if declared.resource_type != resource.spec.resource_type {
        return Err(ValidationError::new(
            ValidationKind::ResourceTypeMismatch,
            format!(
                "task {} binds {} resource {} to PipelineResource {} of type {}, but Task {} expects {}",
                pipeline_task.name,
                direction,
                binding.name,
                resource.metadata.name,
                resource.spec.resource_type,
                task.metadata.name,
                declared.resource_type
            ),
        ));
    }

    Ok(())
}
