//! Test: Child Aggregation - run condition follows its TaskRuns

use crate::helpers::*;
use pipeline_controller::core::condition::{REASON_FAILED, REASON_RUNNING, REASON_SUCCEEDED};
use pipeline_controller::core::manifest::Object;
use pipeline_controller::core::ConditionStatus;
use pipeline_controller::{InMemoryStore, Reconciler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const SECOND_TASK_RUN: &str = "test-pipeline-run-success-unit-test-2";

/// The success scenario with a second, independent PipelineTask
async fn two_task_store() -> (Arc<InMemoryStore>, Reconciler) {
    let mut objects = objects_from(SUCCESS_MANIFESTS);
    for object in objects.iter_mut() {
        if let Object::Pipeline(pipeline) = object {
            let mut second = pipeline.spec.tasks[0].clone();
            second.name = "unit-test-2".to_string();
            pipeline.spec.tasks.push(second);
        }
    }
    let store = Arc::new(InMemoryStore::with_objects(objects).await);
    let reconciler = Reconciler::from_store(store.clone());
    (store, reconciler)
}

/// Both TaskRuns are created on the first pass; no ordering between tasks
#[tokio::test]
async fn test_all_task_runs_created_at_once() {
    let (store, reconciler) = two_task_store().await;

    reconciler
        .reconcile(&CancellationToken::new(), SUCCESS_RUN_KEY)
        .await
        .unwrap();

    let names: Vec<_> = store
        .task_runs()
        .await
        .into_iter()
        .map(|t| t.metadata.name)
        .collect();
    assert_eq!(names, vec![SUCCESS_TASK_RUN, SECOND_TASK_RUN]);
}

#[tokio::test]
async fn test_partial_success_keeps_running() {
    let (store, reconciler) = two_task_store().await;
    let cancel = CancellationToken::new();

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    finish_task_run(&store, SUCCESS_TASK_RUN, ConditionStatus::True).await;
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();

    let condition =
        assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::Unknown, REASON_RUNNING).await;
    assert_eq!(condition.message, "Tasks Completed: 1/2");

    let run = stored_run(&store, SUCCESS_RUN_KEY).await;
    assert!(run.status.completion_time.is_none());
    assert_eq!(run.status.task_runs.len(), 2);
}

#[tokio::test]
async fn test_any_failure_fails_the_run() {
    let (store, reconciler) = two_task_store().await;
    let cancel = CancellationToken::new();

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    finish_task_run(&store, SECOND_TASK_RUN, ConditionStatus::False).await;
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();

    let condition =
        assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::False, REASON_FAILED).await;
    assert_eq!(
        condition.message,
        format!("TaskRun {} has failed", SECOND_TASK_RUN)
    );

    // The failure sticks even if the other child later succeeds
    finish_task_run(&store, SUCCESS_TASK_RUN, ConditionStatus::True).await;
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::False, REASON_FAILED).await;
}

#[tokio::test]
async fn test_all_succeeded() {
    let (store, reconciler) = two_task_store().await;
    let cancel = CancellationToken::new();

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    finish_task_run(&store, SUCCESS_TASK_RUN, ConditionStatus::True).await;
    finish_task_run(&store, SECOND_TASK_RUN, ConditionStatus::True).await;
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();

    assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::True, REASON_SUCCEEDED).await;
}
