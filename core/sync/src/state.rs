//! Reconciler state: watermark and cycle bookkeeping.
//!
//! Nothing here is persisted. A restart resets the watermark to the epoch,
//! which makes the first cycle treat every source task as changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Mutations that failed and were not retried further.
    pub failed: usize,
    /// Mutations whose target record vanished before they ran.
    pub skipped_stale: usize,
    pub duration: Duration,
}

impl SyncResult {
    /// Number of mutations that took effect.
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Number of mutations attempted.
    pub fn attempted(&self) -> usize {
        self.applied() + self.failed + self.skipped_stale
    }
}

/// Mutable state shared by reconciliation cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    /// Tasks updated strictly after this instant are considered changed.
    pub last_poll_time: DateTime<Utc>,
    /// When the last successful cycle finished.
    pub last_completed: Option<DateTime<Utc>>,
    /// Result of the last successful cycle.
    pub last_result: Option<SyncResult>,
    /// Successful cycles since startup.
    pub cycles_completed: u64,
}

impl SyncState {
    /// Create the initial state with the watermark at the epoch.
    pub fn new() -> Self {
        Self {
            last_poll_time: DateTime::<Utc>::UNIX_EPOCH,
            last_completed: None,
            last_result: None,
            cycles_completed: 0,
        }
    }

    /// Record a successful cycle.
    pub fn record_cycle(&mut self, result: &SyncResult) {
        self.last_completed = Some(Utc::now());
        self.last_result = Some(result.clone());
        self.cycles_completed += 1;
    }

    /// Move the watermark, returning the previous value.
    pub fn advance_watermark(&mut self, to: DateTime<Utc>) -> DateTime<Utc> {
        std::mem::replace(&mut self.last_poll_time, to)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive claim on the cycle slot.
///
/// The slot is released when the guard drops, including when the cycle
/// future is cancelled or unwinds.
#[derive(Debug)]
pub struct CycleGuard {
    slot: Arc<AtomicBool>,
}

impl CycleGuard {
    /// Claim `slot`, or return None if a cycle already holds it.
    pub fn try_acquire(slot: &Arc<AtomicBool>) -> Option<Self> {
        slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { slot: slot.clone() })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}
