//! Maps child TaskRun state onto the PipelineRun's `Succeeded` condition

use crate::core::condition::{REASON_FAILED, REASON_RUNNING, REASON_SUCCEEDED};
use crate::core::{Condition, ConditionStatus, Pipeline, PipelineRunTaskRunStatus, TaskRun};
use crate::reconciler::expander::task_run_name;
use std::collections::{BTreeMap, HashMap};

/// Compute the run condition from its existing children.
///
/// `expected` is the number of PipelineTasks; `task_runs` are the children
/// that exist, in pipeline order. Any failure wins, then full success, and
/// everything else is still running. This is a pure function of its inputs
/// and is recomputed from scratch on every reconcile.
pub fn compute_condition(expected: usize, task_runs: &[TaskRun]) -> Condition {
    if let Some(failed) = task_runs.iter().find(|t| t.has_failed()) {
        return Condition::succeeded(
            ConditionStatus::False,
            REASON_FAILED,
            format!("TaskRun {} has failed", failed.metadata.name),
        );
    }

    if task_runs.len() >= expected && task_runs.iter().all(|t| t.has_succeeded()) {
        return Condition::succeeded(
            ConditionStatus::True,
            REASON_SUCCEEDED,
            "All Tasks have completed executing",
        );
    }

    let done = task_runs.iter().filter(|t| t.is_done()).count();
    Condition::succeeded(
        ConditionStatus::Unknown,
        REASON_RUNNING,
        format!("Tasks Completed: {}/{}", done, expected),
    )
}

/// Keep only the children that belong to a PipelineTask, in pipeline order
pub fn children_in_order(pipeline: &Pipeline, run_name: &str, children: Vec<TaskRun>) -> Vec<TaskRun> {
    let mut by_name: HashMap<String, TaskRun> = children
        .into_iter()
        .map(|t| (t.metadata.name.clone(), t))
        .collect();

    pipeline
        .spec
        .tasks
        .iter()
        .filter_map(|pt| by_name.remove(&task_run_name(run_name, &pt.name)))
        .collect()
}

/// Per-TaskRun summary for the PipelineRun status
pub fn summarize(
    pipeline: &Pipeline,
    run_name: &str,
    task_runs: &[TaskRun],
) -> BTreeMap<String, PipelineRunTaskRunStatus> {
    pipeline
        .spec
        .tasks
        .iter()
        .filter_map(|pt| {
            let name = task_run_name(run_name, &pt.name);
            let task_run = task_runs.iter().find(|t| t.metadata.name == name)?;
            Some((
                name,
                PipelineRunTaskRunStatus {
                    pipeline_task_name: pt.name.clone(),
                    condition: task_run.status.succeeded().cloned(),
                },
            ))
        })
        .collect()
}
