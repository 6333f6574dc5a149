//! Periodic sync scheduling.
//!
//! Every trigger goes through a single-slot channel, so at most one cycle
//! runs at a time and at most one more waits behind it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use taskmirror_common::{Error, Result};

use crate::state::SyncResult;

/// Sync request types.
#[derive(Debug)]
pub enum SyncRequest {
    /// Full reconciliation cycle.
    Full,
    /// Shutdown the scheduler.
    Shutdown,
}

type Responder = oneshot::Sender<Result<SyncResult>>;
type Envelope = (SyncRequest, Option<Responder>);

/// Scheduler for managing sync timing and requests.
pub struct SyncScheduler {
    /// Channel to send sync requests.
    request_tx: mpsc::Sender<Envelope>,
    /// Shutdown signal.
    shutdown: Arc<RwLock<bool>>,
}

impl SyncScheduler {
    /// Create a new scheduler that runs a cycle every `interval`.
    pub fn new(interval: Duration) -> (Self, SyncSchedulerHandle) {
        let (request_tx, request_rx) = mpsc::channel(1);
        let shutdown = Arc::new(RwLock::new(false));

        let scheduler = Self {
            request_tx,
            shutdown: shutdown.clone(),
        };

        let handle = SyncSchedulerHandle {
            interval,
            request_rx: Some(request_rx),
            shutdown,
            delay_first_tick: false,
        };

        (scheduler, handle)
    }

    /// Request a full cycle and wait for its result.
    pub async fn request_sync(&self) -> Result<SyncResult> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send((SyncRequest::Full, Some(response_tx)))
            .await
            .map_err(|_| Error::InvalidInput("Scheduler not running".to_string()))?;

        response_rx
            .await
            .map_err(|_| Error::InvalidInput("Failed to receive sync result".to_string()))?
    }

    /// Queue a full cycle without waiting for it.
    ///
    /// Returns false if a cycle is already pending, in which case this
    /// trigger is coalesced into it.
    pub fn trigger(&self) -> bool {
        match self.request_tx.try_send((SyncRequest::Full, None)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Sync already pending, trigger coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Sync trigger dropped: scheduler not running");
                false
            }
        }
    }

    /// Shutdown the scheduler.
    ///
    /// A cycle that is already running finishes first.
    pub async fn shutdown(&self) {
        let mut is_shutdown = self.shutdown.write().await;
        *is_shutdown = true;
        drop(is_shutdown);

        let _ = self.request_tx.send((SyncRequest::Shutdown, None)).await;
    }
}

/// Handle for the scheduler background task.
pub struct SyncSchedulerHandle {
    interval: Duration,
    request_rx: Option<mpsc::Receiver<Envelope>>,
    shutdown: Arc<RwLock<bool>>,
    delay_first_tick: bool,
}

impl SyncSchedulerHandle {
    /// Wait a full interval before the first periodic cycle, for callers
    /// that already ran one themselves.
    pub fn delay_first_tick(mut self) -> Self {
        self.delay_first_tick = true;
        self
    }

    /// Run the scheduler background task.
    ///
    /// This should be spawned in a tokio task. The `sync_fn` is called
    /// whenever a cycle is due. The first periodic cycle starts
    /// immediately (see [`Self::delay_first_tick`]) and ticks missed while
    /// a cycle runs are skipped.
    pub async fn run<F, Fut>(mut self, sync_fn: F)
    where
        F: Fn(SyncRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<SyncResult>> + Send,
    {
        let Some(mut request_rx) = self.request_rx.take() else {
            error!("Sync scheduler handle already consumed");
            return;
        };
        let mut ticker = Self::create_interval(self.interval, self.delay_first_tick);

        info!("Sync scheduler started (every {:?})", self.interval);

        loop {
            if *self.shutdown.read().await {
                info!("Sync scheduler shutting down");
                break;
            }

            tokio::select! {
                request = request_rx.recv() => {
                    match request {
                        Some((SyncRequest::Shutdown, _)) | None => {
                            info!("Received shutdown request");
                            break;
                        }
                        Some((request, responder)) => {
                            debug!("Processing sync request: {:?}", request);
                            let result = sync_fn(request).await;
                            match responder {
                                Some(response_tx) => {
                                    let _ = response_tx.send(result);
                                }
                                None => Self::log_result("Triggered", &result),
                            }
                        }
                    }
                }

                _ = ticker.tick() => {
                    debug!("Triggering periodic sync");
                    let result = sync_fn(SyncRequest::Full).await;
                    Self::log_result("Periodic", &result);
                }
            }
        }
    }

    fn log_result(kind: &str, result: &Result<SyncResult>) {
        match result {
            Ok(sync_result) => {
                info!(
                    "{} sync completed: {} created, {} updated, {} deleted, {} failed",
                    kind,
                    sync_result.created,
                    sync_result.updated,
                    sync_result.deleted,
                    sync_result.failed
                );
            }
            Err(Error::Busy) => {
                info!("{} sync skipped: previous cycle still running", kind);
            }
            Err(e) => {
                error!("{} sync failed: {}", kind, e);
            }
        }
    }

    fn create_interval(period: Duration, delayed: bool) -> Interval {
        let mut ticker = if delayed {
            interval_at(Instant::now() + period, period)
        } else {
            interval(period)
        };
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }
}
