//! Reconciler that mirrors the task source into the replica store.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use taskmirror_common::{Error, ReplicaRecord, Result, SourceTask};
use taskmirror_providers::{ReplicaStore, TaskSource};

use crate::plan::{plan, SyncOp, SyncPlan};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::scheduler::{SyncRequest, SyncScheduler, SyncSchedulerHandle};
use crate::state::{CycleGuard, SyncResult, SyncState};

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(180);

/// Configuration for the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Time between periodic cycles.
    pub interval: Duration,
    /// Maximum number of retries for transient provider errors.
    pub max_retries: u32,
    /// Fetch the two snapshots concurrently.
    pub fetch_concurrently: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_retries: 3,
            fetch_concurrently: true,
        }
    }
}

/// Reconciles a [`TaskSource`] into a [`ReplicaStore`], one cycle at a time.
pub struct Reconciler<S: TaskSource + ?Sized, T: ReplicaStore + ?Sized> {
    /// Where tasks are read from.
    source: Arc<S>,
    /// Where tasks are mirrored to.
    target: Arc<T>,
    /// Watermark and cycle bookkeeping.
    state: Arc<RwLock<SyncState>>,
    /// Held by the running cycle.
    cycle_slot: Arc<AtomicBool>,
    /// Retry executor.
    retry_executor: Arc<RetryExecutor>,
    /// Sync scheduler.
    scheduler: Option<SyncScheduler>,
    /// Configuration.
    config: SyncConfig,
}

impl<S: TaskSource + 'static, T: ReplicaStore + 'static> Reconciler<S, T> {
    /// Create a new reconciler owning both providers.
    pub fn new(source: S, target: T, config: SyncConfig) -> Self {
        Self::from_arc(Arc::new(source), Arc::new(target), config)
    }
}

impl<S: TaskSource + ?Sized + 'static, T: ReplicaStore + ?Sized + 'static> Reconciler<S, T> {
    /// Create a new reconciler from Arc-wrapped providers.
    pub fn from_arc(source: Arc<S>, target: Arc<T>, config: SyncConfig) -> Self {
        let retry_config = RetryConfig::new(config.max_retries);

        Self {
            source,
            target,
            state: Arc::new(RwLock::new(SyncState::new())),
            cycle_slot: Arc::new(AtomicBool::new(false)),
            retry_executor: Arc::new(RetryExecutor::new(retry_config)),
            scheduler: None,
            config,
        }
    }

    /// Initialize a periodic scheduler and return a handle for running it.
    pub fn init_scheduler(&mut self) -> SyncSchedulerHandle {
        let (scheduler, handle) = SyncScheduler::new(self.config.interval);
        self.scheduler = Some(scheduler);
        handle
    }

    /// Get the scheduler for requesting cycles.
    pub fn scheduler(&self) -> Option<&SyncScheduler> {
        self.scheduler.as_ref()
    }

    /// Get a reference to the sync state.
    pub fn state(&self) -> Arc<RwLock<SyncState>> {
        self.state.clone()
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a cycle is running right now.
    pub fn is_running(&self) -> bool {
        self.cycle_slot.load(Ordering::Acquire)
    }

    /// Run one reconciliation cycle.
    ///
    /// Returns [`Error::Busy`] without touching any provider if another
    /// cycle is still running. If either snapshot cannot be fetched the
    /// cycle aborts and the watermark stays where it was.
    pub async fn run(&self) -> Result<SyncResult> {
        let Some(_guard) = CycleGuard::try_acquire(&self.cycle_slot) else {
            debug!("Sync cycle already in progress");
            return Err(Error::Busy);
        };

        let result = self.run_cycle().await?;
        self.state.write().await.record_cycle(&result);
        Ok(result)
    }

    /// Compute the next cycle's plan without applying it or moving the watermark.
    pub async fn plan_cycle(&self) -> Result<SyncPlan> {
        let (tasks, records) = self.fetch_snapshots().await?;
        let watermark = self.state.read().await.last_poll_time;
        Ok(plan(&tasks, &records, watermark))
    }

    /// Process a sync request (for scheduler).
    pub async fn process_request(&self, request: SyncRequest) -> Result<SyncResult> {
        match request {
            SyncRequest::Full => self.run().await,
            SyncRequest::Shutdown => Ok(SyncResult::default()),
        }
    }

    async fn run_cycle(&self) -> Result<SyncResult> {
        let start = Instant::now();
        info!(
            "Starting sync cycle: {} -> {}",
            self.source.name(),
            self.target.name()
        );

        let (tasks, records) = self.fetch_snapshots().await?;
        debug!(
            "Fetched {} source tasks and {} replica records",
            tasks.len(),
            records.len()
        );

        let watermark = self.state.read().await.last_poll_time;
        let plan = plan(&tasks, &records, watermark);

        // Source edits landing after the fetch but before this point wait for a later cycle.
        let previous = self.state.write().await.advance_watermark(Utc::now());

        let mut result = SyncResult::default();
        for op in &plan.ops {
            match self.apply(op).await {
                Ok(()) => match op {
                    SyncOp::Create { .. } => result.created += 1,
                    SyncOp::Update { .. } => result.updated += 1,
                    SyncOp::Delete { .. } => result.deleted += 1,
                },
                Err(Error::NotFound(msg)) if !matches!(op, SyncOp::Create { .. }) => {
                    warn!("Skipping stale {}: {}", op, msg);
                    result.skipped_stale += 1;
                }
                Err(e) if e.is_fatal() => {
                    error!("Aborting sync cycle at {}: {}", op, e);
                    self.state.write().await.advance_watermark(previous);
                    return Err(e);
                }
                Err(e) => {
                    error!("Failed to {}: {}", op, e);
                    result.failed += 1;
                }
            }
        }

        result.duration = start.elapsed();
        info!(
            "Sync cycle completed in {:?}: {} created, {} updated, {} deleted, {} failed, {} stale",
            result.duration,
            result.created,
            result.updated,
            result.deleted,
            result.failed,
            result.skipped_stale
        );

        Ok(result)
    }

    async fn fetch_snapshots(&self) -> Result<(Vec<SourceTask>, Vec<ReplicaRecord>)> {
        let fetch_tasks = self
            .retry_executor
            .execute(|| self.source.fetch_all_tasks());
        let fetch_records = self.retry_executor.execute(|| self.target.fetch_all());

        if self.config.fetch_concurrently {
            tokio::try_join!(fetch_tasks, fetch_records)
        } else {
            Ok((fetch_tasks.await?, fetch_records.await?))
        }
    }

    async fn apply(&self, op: &SyncOp) -> Result<()> {
        match op {
            SyncOp::Create { task } => {
                let record = self
                    .retry_executor
                    .execute(|| self.target.create(task))
                    .await?;
                debug!("Created {} for '{}'", record.id, task.title);
            }
            SyncOp::Update { record_id, task } => {
                self.retry_executor
                    .execute(|| self.target.update(record_id, task))
                    .await?;
                debug!("Updated {} from '{}'", record_id, task.title);
            }
            SyncOp::Delete { record_id, title } => {
                self.retry_executor
                    .execute(|| self.target.delete(record_id))
                    .await?;
                debug!("Trashed {} '{}'", record_id, title);
            }
        }
        Ok(())
    }
}
