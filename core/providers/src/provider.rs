//! Provider trait definitions.

use async_trait::async_trait;

use taskmirror_common::{ReplicaRecord, Result, SourceTask};

/// Read-only access to the source task-list provider.
///
/// Implementations must handle their own authentication and token refresh.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Get the provider name (e.g., "gtasks", "memory").
    fn name(&self) -> &str;

    /// Fetch every task of every list, including hidden and soft-deleted ones.
    ///
    /// # Postconditions
    /// - Each task carries the title of its owning list
    /// - No pagination state is retained between calls
    ///
    /// # Errors
    /// - Authentication errors
    /// - Network/provider errors
    async fn fetch_all_tasks(&self) -> Result<Vec<SourceTask>>;
}

/// Read/write access to the replica store.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Get the provider name (e.g., "notion", "memory").
    fn name(&self) -> &str;

    /// Fetch all live (non-trashed) replica records.
    ///
    /// Records missing required fields are skipped and logged rather than
    /// failing the whole fetch.
    async fn fetch_all(&self) -> Result<Vec<ReplicaRecord>>;

    /// Create a record mapped from `task`.
    async fn create(&self, task: &SourceTask) -> Result<ReplicaRecord>;

    /// Overwrite every mapped field of record `id` from `task`.
    ///
    /// # Errors
    /// - `NotFound` if the record no longer exists
    async fn update(&self, id: &str, task: &SourceTask) -> Result<ReplicaRecord>;

    /// Move record `id` to the trash.
    ///
    /// Trashed records are excluded from subsequent `fetch_all` calls.
    async fn delete(&self, id: &str) -> Result<()>;
}
