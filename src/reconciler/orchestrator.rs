//! Ensures every PipelineTask has its TaskRun

use crate::core::{PipelineRun, TaskRun};
use crate::persistence::{Lister, TaskRunCreator};
use crate::reconciler::error::{ReconcileError, ValidationError, ValidationKind};
use crate::reconciler::expander::{build_task_run, expand, task_run_name};
use crate::reconciler::guarded;
use crate::reconciler::resolver::ResolvedPipelineRun;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// TaskRun names touched by one pass, in pipeline order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureSummary {
    /// Created by this pass
    pub created: Vec<String>,

    /// Already present, or created concurrently by someone else
    pub existing: Vec<String>,
}

impl EnsureSummary {
    pub fn created_any(&self) -> bool {
        !self.created.is_empty()
    }
}

/// A TaskRun found under the derived name must be controlled by `run`
fn ensure_owned(run: &PipelineRun, task_run: &TaskRun) -> Result<(), ValidationError> {
    let owner = task_run.owning_run();
    if owner.as_ref() == Some(&run.metadata.key()) {
        return Ok(());
    }

    let holder = match owner {
        Some(owner) => format!("PipelineRun {}", owner),
        None => "no PipelineRun".to_string(),
    };
    Err(ValidationError::new(
        ValidationKind::TaskRunNameConflict,
        format!(
            "TaskRun {} already exists and is controlled by {}",
            task_run.metadata.key(),
            holder
        ),
    ))
}

/// Create the TaskRun of every PipelineTask that doesn't have one yet.
///
/// Tasks are visited in declared order and each is expanded and submitted on
/// its own; there is no gating between tasks. A create that loses a race
/// (`AlreadyExists`) counts as existing. A TaskRun under the derived name that
/// another run controls is a [`ValidationKind::TaskRunNameConflict`]. Any other
/// failure is returned so the caller can retry.
pub async fn ensure_task_runs(
    lister: &dyn Lister,
    creator: &dyn TaskRunCreator,
    run: &PipelineRun,
    resolved: &ResolvedPipelineRun,
    cancel: &CancellationToken,
) -> Result<EnsureSummary, ReconcileError> {
    let namespace = run.metadata.namespace.as_str();
    let mut summary = EnsureSummary::default();

    for pipeline_task in &resolved.pipeline.spec.tasks {
        let name = task_run_name(&run.metadata.name, &pipeline_task.name);

        match guarded(cancel, lister.get_task_run(namespace, &name)).await {
            Ok(existing) => {
                ensure_owned(run, &existing)?;
                summary.existing.push(name);
                continue;
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let spec = expand(pipeline_task, resolved.service_account(), &resolved.resources);
        let task_run = build_task_run(run, &resolved.pipeline, pipeline_task, spec);

        match guarded(cancel, creator.create_task_run(task_run)).await {
            Ok(_) => {
                info!("Created TaskRun {}/{}", namespace, name);
                summary.created.push(name);
            }
            Err(ReconcileError::Store(err)) if err.is_already_exists() => {
                let existing = guarded(cancel, lister.get_task_run(namespace, &name)).await?;
                ensure_owned(run, &existing)?;
                debug!("TaskRun {}/{} was created concurrently", namespace, name);
                summary.existing.push(name);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}
