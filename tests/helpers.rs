//! Test utility functions for pipeline-controller
#![allow(dead_code)]

use pipeline_controller::core::manifest::{self, Object};
use pipeline_controller::core::{Condition, ConditionStatus, ObjectKey, PipelineRun, TaskRun};
use pipeline_controller::persistence::{InMemoryStore, StatusWriter, StoreAction, StoreError, TaskRunCreator};
use pipeline_controller::reconciler::{ReconcileEvent, Reconciler};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SUCCESS_RUN_KEY: &str = "foo/test-pipeline-run-success";
pub const SUCCESS_TASK_RUN: &str = "test-pipeline-run-success-unit-test-1";

/// Everything `test-pipeline-run-success` references
pub const SUCCESS_MANIFESTS: &str = r#"
apiVersion: pipeline.knative.dev/v1alpha1
kind: Pipeline
metadata:
  name: test-pipeline
  namespace: foo
spec:
  tasks:
    - name: unit-test-1
      taskRef:
        name: unit-test-task
      params:
        - name: foo
          value: somethingfun
        - name: bar
          value: somethingmorefun
        - name: templatedparam
          value: "${inputs.workspace.revision}"
      inputSourceBindings:
        - name: workspace
          resourceRef:
            name: some-repo
      outputSourceBindings:
        - name: image-to-use
          resourceRef:
            name: some-image
---
apiVersion: pipeline.knative.dev/v1alpha1
kind: Task
metadata:
  name: unit-test-task
  namespace: foo
spec:
  inputs:
    resources:
      - name: workspace
        type: git
    params:
      - name: foo
      - name: bar
  outputs:
    resources:
      - name: image-to-use
        type: image
---
apiVersion: pipeline.knative.dev/v1alpha1
kind: PipelineParams
metadata:
  name: unit-test-pp
  namespace: foo
spec:
  serviceAccount: test-sa
---
apiVersion: pipeline.knative.dev/v1alpha1
kind: PipelineResource
metadata:
  name: some-repo
  namespace: foo
spec:
  type: git
  params:
    - name: url
      value: http://github.com/kristoff/reindeer
---
apiVersion: pipeline.knative.dev/v1alpha1
kind: PipelineResource
metadata:
  name: some-image
  namespace: foo
spec:
  type: image
  params:
    - name: url
      value: gcr.io/sven
---
apiVersion: pipeline.knative.dev/v1alpha1
kind: PipelineRun
metadata:
  name: test-pipeline-run-success
  namespace: foo
spec:
  pipelineRef:
    name: test-pipeline
  pipelineParamsRef:
    name: unit-test-pp
"#;

/// Runs whose references are broken in one way or another
pub const INVALID_MANIFESTS: &str = r#"
kind: Task
metadata:
  name: a-task-that-exists
  namespace: foo
---
kind: Pipeline
metadata:
  name: pipeline-missing-tasks
  namespace: foo
spec:
  tasks:
    - name: myspecialtask
      taskRef:
        name: sometask
---
kind: Pipeline
metadata:
  name: a-fine-pipeline
  namespace: foo
spec:
  tasks:
    - name: some-task
      taskRef:
        name: a-task-that-exists
---
kind: PipelineRun
metadata:
  name: pipelinerun-missing-tasks
  namespace: foo
spec:
  pipelineRef:
    name: pipeline-missing-tasks
---
kind: PipelineRun
metadata:
  name: invalid-pipeline
  namespace: foo
spec:
  pipelineRef:
    name: pipeline-not-exist
---
kind: PipelineRun
metadata:
  name: pipelinerun-params-dont-exist
  namespace: foo
spec:
  pipelineRef:
    name: a-fine-pipeline
  pipelineParamsRef:
    name: missing-params
"#;

pub fn objects_from(yaml: &str) -> Vec<Object> {
    manifest::from_yaml(yaml).expect("test manifests should parse")
}

/// Store seeded from manifests, with a reconciler backed by it
pub async fn store_with(yaml: &str) -> (Arc<InMemoryStore>, Reconciler) {
    let store = Arc::new(InMemoryStore::with_objects(objects_from(yaml)).await);
    let reconciler = Reconciler::from_store(store.clone());
    (store, reconciler)
}

pub fn key(s: &str) -> ObjectKey {
    ObjectKey::parse(s).expect("test keys should be valid")
}

pub async fn stored_run(store: &InMemoryStore, run_key: &str) -> PipelineRun {
    store
        .pipeline_run(&key(run_key))
        .await
        .unwrap_or_else(|| panic!("PipelineRun {} should exist", run_key))
}

/// Writes made through the store traits so far
pub async fn writes(store: &InMemoryStore) -> Vec<StoreAction> {
    store.actions().await.into_iter().filter(|a| a.is_write()).collect()
}

pub async fn finish_task_run(store: &InMemoryStore, name: &str, status: ConditionStatus) {
    let reason = match status {
        ConditionStatus::True => "Succeeded",
        ConditionStatus::False => "Failed",
        ConditionStatus::Unknown => "Running",
    };
    store
        .set_task_run_condition("foo", name, Condition::succeeded(status, reason, ""))
        .await
        .expect("TaskRun should exist");
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert the run's `Succeeded` condition has the given status and reason
pub async fn assert_run_condition(
    store: &InMemoryStore,
    run_key: &str,
    status: ConditionStatus,
    reason: &str,
) -> Condition {
    let run = stored_run(store, run_key).await;
    let condition = run
        .status
        .succeeded()
        .unwrap_or_else(|| panic!("{} has no Succeeded condition", run_key))
        .clone();

    assert_eq!(
        condition.status, status,
        "{} status: expected {}, got {} ({})",
        run_key, status, condition.status, condition.message
    );
    assert_eq!(condition.reason, reason, "{} reason", run_key);
    condition
}

pub async fn assert_no_task_runs(store: &InMemoryStore) {
    let task_runs = store.task_runs().await;
    assert!(
        task_runs.is_empty(),
        "expected no TaskRuns, found {:?}",
        task_runs.iter().map(|t| t.metadata.name.as_str()).collect::<Vec<_>>()
    );
}

// ============================================================================
// Event capture
// ============================================================================

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ReconcileEvent>>>,
}

impl EventLog {
    /// Handler to pass to `Reconciler::with_event_handler`
    pub fn handler(&self) -> impl Fn(ReconcileEvent) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event| events.lock().unwrap().push(event)
    }

    pub fn events(&self) -> Vec<ReconcileEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn created_task_runs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReconcileEvent::TaskRunCreated { task_run, .. } => Some(task_run),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Fault-injecting store wrappers
// ============================================================================

/// Fails the first `failures` creates, then delegates to the store
pub struct FlakyCreator {
    store: Arc<InMemoryStore>,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyCreator {
    pub fn new(store: Arc<InMemoryStore>, failures: usize) -> Self {
        Self {
            store,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRunCreator for FlakyCreator {
    async fn create_task_run(&self, task_run: TaskRun) -> Result<TaskRun, StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.store.create_task_run(task_run).await
    }
}

/// Status writer whose backend is down
pub struct UnavailableStatusWriter;

#[async_trait]
impl StatusWriter for UnavailableStatusWriter {
    async fn update_pipeline_run_status(&self, _run: &PipelineRun) -> Result<PipelineRun, StoreError> {
        Err(StoreError::Unavailable("status endpoint down".to_string()))
    }
}

/// Touches the run in the store before every status write, so the write
/// always carries a stale resource version
pub struct RacingStatusWriter {
    store: Arc<InMemoryStore>,
}

impl RacingStatusWriter {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusWriter for RacingStatusWriter {
    async fn update_pipeline_run_status(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError> {
        if let Some(current) = self.store.pipeline_run(&run.metadata.key()).await {
            self.store.apply(Object::PipelineRun(current)).await;
        }
        self.store.update_pipeline_run_status(run).await
    }
}
