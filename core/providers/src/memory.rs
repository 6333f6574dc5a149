//! In-memory providers for testing and dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use taskmirror_common::{Error, ReplicaFields, ReplicaRecord, Result, SourceTask};

use crate::provider::{ReplicaStore, TaskSource};

/// Builds the error returned by an injected failure.
type FailureFn = Arc<dyn Fn() -> Error + Send + Sync>;

/// In-memory task source.
///
/// Holds a snapshot of tasks that tests mutate between cycles.
pub struct MemoryTaskSource {
    tasks: Mutex<Vec<SourceTask>>,
    failure: Mutex<Option<FailureFn>>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl MemoryTaskSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Create a source holding `tasks`.
    pub fn with_tasks(tasks: Vec<SourceTask>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            failure: Mutex::new(None),
            fetch_delay: Mutex::new(None),
        }
    }

    /// Replace the whole snapshot.
    pub async fn set_tasks(&self, tasks: Vec<SourceTask>) {
        *self.tasks.lock().await = tasks;
    }

    /// Insert a task, replacing any task with the same id.
    pub async fn upsert(&self, task: SourceTask) {
        let mut tasks = self.tasks.lock().await;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
    }

    /// Make every fetch fail with the error built by `f`.
    pub async fn fail_with(&self, f: impl Fn() -> Error + Send + Sync + 'static) {
        *self.failure.lock().await = Some(Arc::new(f));
    }

    /// Delay every fetch, to keep a cycle in flight.
    pub async fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.lock().await = delay;
    }
}

impl Default for MemoryTaskSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskSource for MemoryTaskSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_all_tasks(&self) -> Result<Vec<SourceTask>> {
        let delay = *self.fetch_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failure.lock().await.as_ref() {
            return Err(failure());
        }

        Ok(self.tasks.lock().await.clone())
    }
}

/// A mutation observed by [`MemoryReplicaStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create { title: String },
    Update { id: String, title: String },
    Delete { id: String },
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: ReplicaRecord,
    trashed: bool,
}

#[derive(Default)]
struct StoreInner {
    records: Vec<StoredRecord>,
    calls: Vec<StoreCall>,
    fail_titles: Vec<String>,
    fail_fetch: bool,
}

/// In-memory replica store.
///
/// Records every mutation in a call log so tests can assert on the exact
/// operations a reconciliation cycle issued.
pub struct MemoryReplicaStore {
    inner: Mutex<StoreInner>,
}

impl MemoryReplicaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Seed a live record directly, bypassing the call log. Returns its id.
    pub async fn insert(&self, fields: ReplicaFields) -> String {
        let id = Uuid::new_v4().to_string();
        self.inner.lock().await.records.push(StoredRecord {
            record: ReplicaRecord::from_fields(id.clone(), fields),
            trashed: false,
        });
        id
    }

    /// Every mutation issued so far, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }

    /// Live records, in insertion order.
    pub async fn live_records(&self) -> Vec<ReplicaRecord> {
        self.inner
            .lock()
            .await
            .records
            .iter()
            .filter(|r| !r.trashed)
            .map(|r| r.record.clone())
            .collect()
    }

    /// Whether record `id` exists and is in the trash.
    pub async fn is_trashed(&self, id: &str) -> bool {
        self.inner
            .lock()
            .await
            .records
            .iter()
            .any(|r| r.record.id == id && r.trashed)
    }

    /// Physically remove a record, as if deleted outside taskmirror.
    pub async fn purge(&self, id: &str) {
        self.inner.lock().await.records.retain(|r| r.record.id != id);
    }

    /// Make create/update of tasks titled `title` fail with a provider error.
    pub async fn fail_writes_for(&self, title: impl Into<String>) {
        self.inner.lock().await.fail_titles.push(title.into());
    }

    /// Make `fetch_all` fail with a network error.
    pub async fn set_fail_fetch(&self, fail: bool) {
        self.inner.lock().await.fail_fetch = fail;
    }

    fn check_write(inner: &StoreInner, task: &SourceTask) -> Result<()> {
        if inner.fail_titles.iter().any(|t| t == &task.title) {
            return Err(Error::Provider(format!(
                "Injected write failure for '{}'",
                task.title
            )));
        }
        Ok(())
    }
}

impl Default for MemoryReplicaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicaStore for MemoryReplicaStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_all(&self) -> Result<Vec<ReplicaRecord>> {
        if self.inner.lock().await.fail_fetch {
            return Err(Error::Network("Injected fetch failure".to_string()));
        }
        Ok(self.live_records().await)
    }

    async fn create(&self, task: &SourceTask) -> Result<ReplicaRecord> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StoreCall::Create {
            title: task.title.clone(),
        });
        Self::check_write(&inner, task)?;

        let record = ReplicaRecord::from_fields(
            Uuid::new_v4().to_string(),
            ReplicaFields::from_task(task),
        );
        inner.records.push(StoredRecord {
            record: record.clone(),
            trashed: false,
        });

        Ok(record)
    }

    async fn update(&self, id: &str, task: &SourceTask) -> Result<ReplicaRecord> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StoreCall::Update {
            id: id.to_string(),
            title: task.title.clone(),
        });
        Self::check_write(&inner, task)?;

        let stored = inner
            .records
            .iter_mut()
            .find(|r| r.record.id == id && !r.trashed)
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", id)))?;

        stored.record = ReplicaRecord::from_fields(id, ReplicaFields::from_task(task));
        Ok(stored.record.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StoreCall::Delete { id: id.to_string() });

        let stored = inner
            .records
            .iter_mut()
            .find(|r| r.record.id == id)
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", id)))?;

        stored.trashed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_create_and_fetch() {
        let store = MemoryReplicaStore::new();
        let task = SourceTask::new("t1", "Buy milk", Utc::now()).with_list("Home");

        let created = store.create(&task).await.unwrap();
        let records = store.fetch_all().await.unwrap();

        assert_eq!(records, vec![created.clone()]);
        assert_eq!(created.fields(), ReplicaFields::from_task(&task));
    }

    #[tokio::test]
    async fn test_delete_hides_record_from_fetch() {
        let store = MemoryReplicaStore::new();
        let task = SourceTask::new("t1", "Old task", Utc::now());
        let created = store.create(&task).await.unwrap();

        store.delete(&created.id).await.unwrap();

        assert!(store.fetch_all().await.unwrap().is_empty());
        assert!(store.is_trashed(&created.id).await);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryReplicaStore::new();
        let task = SourceTask::new("t1", "Gone", Utc::now());

        let result = store.update("missing", &task).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryReplicaStore::new();
        store.fail_writes_for("Broken").await;

        let result = store
            .create(&SourceTask::new("t1", "Broken", Utc::now()))
            .await;
        assert!(matches!(result, Err(Error::Provider(_))));
        assert!(store.live_records().await.is_empty());
        assert_eq!(store.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_source_upsert_and_failure() {
        let source = MemoryTaskSource::new();
        source.upsert(SourceTask::new("t1", "A", Utc::now())).await;
        source.upsert(SourceTask::new("t1", "B", Utc::now())).await;

        let tasks = source.fetch_all_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "B");

        source
            .fail_with(|| Error::Authentication("expired".to_string()))
            .await;
        assert!(matches!(
            source.fetch_all_tasks().await,
            Err(Error::Authentication(_))
        ));
    }
}
