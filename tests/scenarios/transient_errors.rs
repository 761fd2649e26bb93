//! Test: Transient Errors - store failures are returned for retry

use crate::helpers::*;
use pipeline_controller::core::condition::REASON_RUNNING;
use pipeline_controller::core::ConditionStatus;
use pipeline_controller::persistence::StoreError;
use pipeline_controller::{ReconcileError, Reconciler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_create_failure_propagates_without_status_write() {
    let (store, _) = store_with(SUCCESS_MANIFESTS).await;
    let creator = Arc::new(FlakyCreator::new(store.clone(), 1));
    let reconciler = Reconciler::new(store.clone(), creator.clone(), store.clone());
    let cancel = CancellationToken::new();

    let err = reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, ReconcileError::Store(StoreError::Unavailable(_))));
    assert!(writes(&store).await.is_empty());
    assert!(stored_run(&store, SUCCESS_RUN_KEY).await.status.conditions.is_empty());

    // The retry goes through
    reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap();
    assert_eq!(creator.calls(), 2);
    assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::Unknown, REASON_RUNNING).await;
}

#[tokio::test]
async fn test_status_write_failure_propagates() {
    let (store, _) = store_with(SUCCESS_MANIFESTS).await;
    let reconciler = Reconciler::new(store.clone(), store.clone(), Arc::new(UnavailableStatusWriter));

    let err = reconciler
        .reconcile(&CancellationToken::new(), SUCCESS_RUN_KEY)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // The child was created before the write failed; a retry adopts it
    assert_eq!(store.task_runs().await.len(), 1);
    assert!(stored_run(&store, SUCCESS_RUN_KEY).await.status.conditions.is_empty());
}

#[tokio::test]
async fn test_validation_status_write_failure_propagates() {
    let (store, _) = store_with(INVALID_MANIFESTS).await;
    let reconciler = Reconciler::new(store.clone(), store.clone(), Arc::new(UnavailableStatusWriter));

    let err = reconciler
        .reconcile(&CancellationToken::new(), "foo/invalid-pipeline")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(!stored_run(&store, "foo/invalid-pipeline").await.is_done());
}

#[tokio::test]
async fn test_stale_status_write_is_a_conflict() {
    let (store, _) = store_with(SUCCESS_MANIFESTS).await;
    let reconciler = Reconciler::new(
        store.clone(),
        store.clone(),
        Arc::new(RacingStatusWriter::new(store.clone())),
    );

    let err = reconciler
        .reconcile(&CancellationToken::new(), SUCCESS_RUN_KEY)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, ReconcileError::Store(ref e) if e.is_conflict()));
    assert!(stored_run(&store, SUCCESS_RUN_KEY).await.status.conditions.is_empty());

    // A plain retry against the store succeeds
    Reconciler::from_store(store.clone())
        .reconcile(&CancellationToken::new(), SUCCESS_RUN_KEY)
        .await
        .unwrap();
    assert_run_condition(&store, SUCCESS_RUN_KEY, ConditionStatus::Unknown, REASON_RUNNING).await;
}

#[tokio::test]
async fn test_cancelled_reconcile_writes_nothing() {
    let (store, reconciler) = store_with(SUCCESS_MANIFESTS).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = reconciler.reconcile(&cancel, SUCCESS_RUN_KEY).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Cancelled));
    assert!(store.actions().await.is_empty());
}
