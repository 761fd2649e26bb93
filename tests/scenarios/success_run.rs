//! Test: Success Run - a valid PipelineRun gets its TaskRun and finishes

use crate::helpers::*;
use pipeline_controller::core::condition::{REASON_RUNNING, REASON_SUCCEEDED};
use pipeline_controller::core::{
    ConditionStatus, Param, PipelineResourceRef, TaskRunResourceVersion, PIPELINE_LABEL_KEY,
    PIPELINE_RUN_LABEL_KEY,
};
use pipeline_controller::persistence::StoreAction;
use pipeline_controller::ReconcileEvent;
use tokio_util::sync::CancellationToken;

/// The first reconcile creates exactly the expected TaskRun
#[tokio::test]
async fn test_creates_expected_task_run() {
    let (store, reconciler) = store_with(SUCCESS_MANIFESTS).await;
    let events = EventLog::default();
    let reconciler = reconciler.with_event_handler(events.handler());

    reconciler
        .reconcile(&CancellationToken::new(), SUCCESS_RUN_KEY)
        .await
        .unwrap();

    let task_runs = store.task_runs().await;
    assert_eq!(task_runs.len(), 1);
    let task_run = &task_runs[0];
    let run = stored_run(&store, SUCCESS_RUN_KEY).await;

    assert_eq!(task_run.metadata.name, SUCCESS_TASK_RUN);
    assert_eq!(task_run.metadata.namespace, "foo");

    let owner = &task_run.metadata.owner_references[0];
    assert_eq!(owner.api_version, "pipeline.knative.dev/v1alpha1");
    assert_eq!(owner.kind, "PipelineRun");
    assert_eq!(owner.name, "test-pipeline-run-success");
    assert_eq!(owner.uid, run.metadata.uid);
    assert!(owner.uid.is_some());
    assert_eq!(owner.controller, Some(true));
    assert_eq!(owner.block_owner_deletion, Some(true));

    assert_eq!(
        task_run.metadata.labels.get(PIPELINE_LABEL_KEY).map(String::as_str),
        Some("test-pipeline")
    );
    assert_eq!(
        task_run.metadata.labels.get(PIPELINE_RUN_LABEL_KEY).map(String::as_str),
        Some("test-pipeline-run-success")
    );

    let spec = &task_run.spec;
    assert_eq!(spec.service_account, "test-sa");
    assert_eq!(spec.task_ref.name, "unit-test-task");
    assert_eq!(
        spec.inputs.params,
        vec![
            Param::new("foo", "somethingfun"),
            Param::new("bar", "somethingmorefun"),
            Param::new("templatedparam", "${inputs.workspace.revision}"),
        ]
    );
    assert_eq!(
        spec.inputs.resources,
        vec![TaskRunResourceVersion {
            resource_ref: PipelineResourceRef {
                name: "some-repo".to_string()
            },
            name: "workspace".to_string(),
        }]
    );
    assert_eq!(
        spec.outputs.resources,
        vec![TaskRunResourceVersion {
            resource_ref: PipelineResourceRef {
                name: "some-image".to_string()
            },
            name: "image-to-use".to_string(),
        }]
    );

    let condition =
        assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::Unknown, REASON_RUNNING).await;
    assert_eq!(condition.message, "Tasks Completed: 0/1");

    assert_eq!(events.created_task_runs(), vec![SUCCESS_TASK_RUN]);
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, ReconcileEvent::ConditionChanged { .. })));
}

/// Reconciling twice creates nothing new and leaves the status alone
#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let (store, reconciler) = store_with(SUCCESS_MANIFESTS).await;
    let cancel = CancellationToken::new();

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    let after_first = stored_run(&store, SUCCESS_RUN_KEY).await;
    store.clear_actions().await;

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();

    assert_eq!(store.task_runs().await.len(), 1);
    assert!(writes(&store).await.is_empty(), "second reconcile should not write");
    assert_eq!(stored_run(&store, SUCCESS_RUN_KEY).await, after_first);
}

/// The run follows its TaskRun to success and records timestamps
#[tokio::test]
async fn test_run_succeeds_when_task_run_succeeds() {
    let (store, reconciler) = store_with(SUCCESS_MANIFESTS).await;
    let cancel = CancellationToken::new();

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    let started = stored_run(&store, SUCCESS_RUN_KEY).await.status.start_time;
    assert!(started.is_some());

    finish_task_run(&store, SUCCESS_TASK_RUN, ConditionStatus::True).await;
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();

    let condition =
        assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::True, REASON_SUCCEEDED).await;
    assert_eq!(condition.message, "All Tasks have completed executing");

    let run = stored_run(&store, SUCCESS_RUN_KEY).await;
    assert_eq!(run.status.start_time, started);
    assert!(run.status.completion_time.is_some());
    let summary = &run.status.task_runs[SUCCESS_TASK_RUN];
    assert_eq!(summary.pipeline_task_name, "unit-test-1");
    assert_eq!(summary.condition.as_ref().map(|c| c.status), Some(ConditionStatus::True));

    // Finished runs are not touched again
    store.clear_actions().await;
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    assert_eq!(
        store.actions().await,
        vec![StoreAction::Get {
            kind: pipeline_controller::core::ResourceKind::PipelineRun,
            key: key(SUCCESS_RUN_KEY),
        }]
    );
}

/// A TaskRun that already exists (e.g. created before a crash) is adopted
#[tokio::test]
async fn test_existing_task_run_is_not_recreated() {
    let (store, reconciler) = store_with(SUCCESS_MANIFESTS).await;
    let cancel = CancellationToken::new();

    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    let first = store.task_runs().await;

    // Fresh reconciler, same store
    let again = pipeline_controller::Reconciler::from_store(store.clone());
    store.clear_actions().await;
    again.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();

    assert!(!store
        .actions()
        .await
        .iter()
        .any(|a| matches!(a, StoreAction::Create { .. })));
    assert_eq!(store.task_runs().await, first);
}
