//! taskmirror sync engine
//!
//! This module reconciles a task source into a replica store, including:
//! - Pure planning of creates, updates and deletes joined on task title
//! - A reconciler owning the watermark and the single-cycle guard
//! - Retry strategy with exponential backoff for transient errors
//! - Periodic scheduling with coalesced triggers

pub mod engine;
pub mod plan;
pub mod retry;
pub mod scheduler;
pub mod state;

// Re-export main types
pub use engine::{Reconciler, SyncConfig, DEFAULT_INTERVAL};
pub use plan::{plan, SyncOp, SyncPlan};
pub use retry::{RetryConfig, RetryExecutor};
pub use scheduler::{SyncRequest, SyncScheduler, SyncSchedulerHandle};
pub use state::{CycleGuard, SyncResult, SyncState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // Verify all main types are accessible
        let config = SyncConfig::default();
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.max_retries, 3);
        assert!(config.fetch_concurrently);
        let _retry_config = RetryConfig::default();
        let _state = SyncState::new();
        assert!(SyncPlan::default().is_empty());
    }
}
