//! In-memory object store

use crate::core::manifest::Object;
use crate::core::{
    Condition, ObjectKey, Pipeline, PipelineParams, PipelineResource, PipelineRun, Resource,
    ResourceKind, Task, TaskRun,
};
use crate::persistence::{Lister, Result, StatusWriter, StoreError, TaskRunCreator};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Default number of trait calls kept in the action log
pub const DEFAULT_ACTION_CAPACITY: usize = 1024;

/// Calls made through the store traits, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    Get { kind: ResourceKind, key: ObjectKey },
    List { kind: ResourceKind },
    Create { kind: ResourceKind, key: ObjectKey },
    UpdateStatus { kind: ResourceKind, key: ObjectKey },
}

impl StoreAction {
    /// Whether this action changed stored state
    pub fn is_write(&self) -> bool {
        matches!(self, StoreAction::Create { .. } | StoreAction::UpdateStatus { .. })
    }
}

#[derive(Default)]
struct Objects {
    pipelines: HashMap<ObjectKey, Pipeline>,
    pipeline_params: HashMap<ObjectKey, PipelineParams>,
    pipeline_resources: HashMap<ObjectKey, PipelineResource>,
    tasks: HashMap<ObjectKey, Task>,
    pipeline_runs: BTreeMap<ObjectKey, PipelineRun>,
    task_runs: HashMap<ObjectKey, TaskRun>,

    /// Owning PipelineRun -> names of its TaskRuns
    task_runs_by_run: HashMap<ObjectKey, BTreeSet<String>>,

    last_version: u64,
}

impl Objects {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    /// Assign uid and version, returning the key
    fn stamp<T: Resource>(&mut self, object: &mut T) -> ObjectKey {
        let version = self.next_version();
        let metadata = object.metadata_mut();
        if metadata.uid.is_none() {
            metadata.uid = Some(Uuid::new_v4());
        }
        metadata.resource_version = version;
        metadata.key()
    }

    fn index_task_run(&mut self, task_run: &TaskRun) -> Option<ObjectKey> {
        let owner = task_run.owning_run()?;
        self.task_runs_by_run
            .entry(owner.clone())
            .or_default()
            .insert(task_run.metadata.name.clone());
        Some(owner)
    }

    fn unindex_task_run(&mut self, owner: &ObjectKey, name: &str) {
        if let Some(names) = self.task_runs_by_run.get_mut(owner) {
            names.remove(name);
            if names.is_empty() {
                self.task_runs_by_run.remove(owner);
            }
        }
    }
}

fn lookup<T: Resource>(map: &HashMap<ObjectKey, T>, key: ObjectKey) -> Result<T> {
    match map.get(&key) {
        Some(object) => Ok(object.clone()),
        None => Err(StoreError::NotFound { kind: T::KIND, key }),
    }
}

/// Thread-safe in-memory backend for the store traits.
///
/// Keeps an explicit index of TaskRuns by owning PipelineRun and broadcasts the
/// key of every PipelineRun whose object or children changed.
pub struct InMemoryStore {
    objects: RwLock<Objects>,
    actions: Mutex<VecDeque<StoreAction>>,
    action_capacity: usize,
    changes: broadcast::Sender<ObjectKey>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            objects: RwLock::new(Objects::default()),
            actions: Mutex::new(VecDeque::new()),
            action_capacity: DEFAULT_ACTION_CAPACITY,
            changes,
        }
    }

    /// Create a store seeded with the given objects
    pub async fn with_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let store = Self::new();
        for object in objects {
            store.apply(object).await;
        }
        store
    }

    /// Keep at most `capacity` recent trait calls; zero turns the log off
    pub fn with_action_capacity(mut self, capacity: usize) -> Self {
        self.action_capacity = capacity;
        self
    }

    /// Receive keys of PipelineRuns that need another look
    pub fn subscribe(&self) -> broadcast::Receiver<ObjectKey> {
        self.changes.subscribe()
    }

    fn notify(&self, run: ObjectKey) {
        // No subscribers is fine
        let _ = self.changes.send(run);
    }

    async fn record(&self, action: StoreAction) {
        if self.action_capacity == 0 {
            return;
        }
        let mut actions = self.actions.lock().await;
        while actions.len() >= self.action_capacity {
            actions.pop_front();
        }
        actions.push_back(action);
    }

    /// Create or replace an object, returning its key
    pub async fn apply(&self, object: Object) -> ObjectKey {
        let mut objects = self.objects.write().await;
        let (key, changed_run) = match object {
            Object::Pipeline(mut o) => {
                let key = objects.stamp(&mut o);
                objects.pipelines.insert(key.clone(), o);
                (key, None)
            }
            Object::PipelineParams(mut o) => {
                let key = objects.stamp(&mut o);
                objects.pipeline_params.insert(key.clone(), o);
                (key, None)
            }
            Object::PipelineResource(mut o) => {
                let key = objects.stamp(&mut o);
                objects.pipeline_resources.insert(key.clone(), o);
                (key, None)
            }
            Object::Task(mut o) => {
                let key = objects.stamp(&mut o);
                objects.tasks.insert(key.clone(), o);
                (key, None)
            }
            Object::PipelineRun(mut o) => {
                let key = objects.stamp(&mut o);
                objects.pipeline_runs.insert(key.clone(), o);
                (key.clone(), Some(key))
            }
            Object::TaskRun(mut o) => {
                let key = objects.stamp(&mut o);
                let previous = objects.task_runs.get(&key).and_then(|t| t.owning_run());
                let owner = objects.index_task_run(&o);
                if let Some(previous) = previous.filter(|p| Some(p) != owner.as_ref()) {
                    objects.unindex_task_run(&previous, &key.name);
                }
                objects.task_runs.insert(key.clone(), o);
                (key, owner)
            }
        };
        drop(objects);

        debug!("Applied {}", key);
        if let Some(run) = changed_run {
            self.notify(run);
        }
        key
    }

    /// Record an execution outcome on a TaskRun, as the execution engine would
    pub async fn set_task_run_condition(
        &self,
        namespace: &str,
        name: &str,
        condition: Condition,
    ) -> Result<TaskRun> {
        let key = ObjectKey::new(namespace, name);
        let mut objects = self.objects.write().await;
        let version = objects.next_version();

        let task_run = objects
            .task_runs
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::TaskRun,
                key: key.clone(),
            })?;
        crate::core::condition::set_condition(&mut task_run.status.conditions, condition);
        task_run.metadata.resource_version = version;
        let updated = task_run.clone();
        drop(objects);

        if let Some(run) = updated.owning_run() {
            self.notify(run);
        }
        Ok(updated)
    }

    /// Snapshot of a PipelineRun without recording an action
    pub async fn pipeline_run(&self, key: &ObjectKey) -> Option<PipelineRun> {
        self.objects.read().await.pipeline_runs.get(key).cloned()
    }

    /// Snapshot of every TaskRun, ordered by key, without recording an action
    pub async fn task_runs(&self) -> Vec<TaskRun> {
        let objects = self.objects.read().await;
        let mut task_runs: Vec<TaskRun> = objects.task_runs.values().cloned().collect();
        task_runs.sort_by_key(|t| t.metadata.key());
        task_runs
    }

    /// Recent calls made through the store traits, oldest first
    pub async fn actions(&self) -> Vec<StoreAction> {
        self.actions.lock().await.iter().cloned().collect()
    }

    pub async fn clear_actions(&self) {
        self.actions.lock().await.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Lister for InMemoryStore {
    async fn get_pipeline_run(&self, key: &ObjectKey) -> Result<PipelineRun> {
        self.record(StoreAction::Get {
            kind: ResourceKind::PipelineRun,
            key: key.clone(),
        })
        .await;
        let objects = self.objects.read().await;
        objects
            .pipeline_runs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::PipelineRun,
                key: key.clone(),
            })
    }

    async fn get_pipeline(&self, namespace: &str, name: &str) -> Result<Pipeline> {
        let key = ObjectKey::new(namespace, name);
        self.record(StoreAction::Get {
            kind: ResourceKind::Pipeline,
            key: key.clone(),
        })
        .await;
        lookup(&self.objects.read().await.pipelines, key)
    }

    async fn get_pipeline_params(&self, namespace: &str, name: &str) -> Result<PipelineParams> {
        let key = ObjectKey::new(namespace, name);
        self.record(StoreAction::Get {
            kind: ResourceKind::PipelineParams,
            key: key.clone(),
        })
        .await;
        lookup(&self.objects.read().await.pipeline_params, key)
    }

    async fn get_pipeline_resource(&self, namespace: &str, name: &str) -> Result<PipelineResource> {
        let key = ObjectKey::new(namespace, name);
        self.record(StoreAction::Get {
            kind: ResourceKind::PipelineResource,
            key: key.clone(),
        })
        .await;
        lookup(&self.objects.read().await.pipeline_resources, key)
    }

    async fn get_task(&self, namespace: &str, name: &str) -> Result<Task> {
        let key = ObjectKey::new(namespace, name);
        self.record(StoreAction::Get {
            kind: ResourceKind::Task,
            key: key.clone(),
        })
        .await;
        lookup(&self.objects.read().await.tasks, key)
    }

    async fn get_task_run(&self, namespace: &str, name: &str) -> Result<TaskRun> {
        let key = ObjectKey::new(namespace, name);
        self.record(StoreAction::Get {
            kind: ResourceKind::TaskRun,
            key: key.clone(),
        })
        .await;
        lookup(&self.objects.read().await.task_runs, key)
    }

    async fn list_task_runs_for(&self, run: &ObjectKey) -> Result<Vec<TaskRun>> {
        self.record(StoreAction::List {
            kind: ResourceKind::TaskRun,
        })
        .await;
        let objects = self.objects.read().await;
        let Some(names) = objects.task_runs_by_run.get(run) else {
            return Ok(Vec::new());
        };
        Ok(names
            .iter()
            .filter_map(|name| {
                objects
                    .task_runs
                    .get(&ObjectKey::new(&run.namespace, name))
                    .cloned()
            })
            .collect())
    }

    async fn list_pipeline_runs(&self) -> Result<Vec<PipelineRun>> {
        self.record(StoreAction::List {
            kind: ResourceKind::PipelineRun,
        })
        .await;
        Ok(self
            .objects
            .read()
            .await
            .pipeline_runs
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl TaskRunCreator for InMemoryStore {
    async fn create_task_run(&self, mut task_run: TaskRun) -> Result<TaskRun> {
        let key = task_run.metadata.key();
        self.record(StoreAction::Create {
            kind: ResourceKind::TaskRun,
            key: key.clone(),
        })
        .await;

        let mut objects = self.objects.write().await;
        if objects.task_runs.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: ResourceKind::TaskRun,
                key,
            });
        }

        objects.stamp(&mut task_run);
        let owner = objects.index_task_run(&task_run);
        objects.task_runs.insert(key, task_run.clone());
        drop(objects);

        if let Some(run) = owner {
            self.notify(run);
        }
        Ok(task_run)
    }
}

#[async_trait::async_trait]
impl StatusWriter for InMemoryStore {
    async fn update_pipeline_run_status(&self, run: &PipelineRun) -> Result<PipelineRun> {
        let key = run.metadata.key();
        self.record(StoreAction::UpdateStatus {
            kind: ResourceKind::PipelineRun,
            key: key.clone(),
        })
        .await;

        let mut objects = self.objects.write().await;
        let version = objects.next_version();
        let stored = objects
            .pipeline_runs
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::PipelineRun,
                key: key.clone(),
            })?;

        if stored.metadata.resource_version != run.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: ResourceKind::PipelineRun,
                key,
                expected: run.metadata.resource_version,
                current: stored.metadata.resource_version,
            });
        }

        stored.status = run.status.clone();
        stored.metadata.resource_version = version;
        let updated = stored.clone();
        drop(objects);

        self.notify(key);
        Ok(updated)
    }
}
