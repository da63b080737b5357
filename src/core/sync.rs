//! Sync coordinator: the single consumer of the offline queue
//!
//! A pass:
//! 1. `BeginSync` through the store (refused when offline or already syncing)
//! 2. send the queued operations captured at the start, oldest first
//! 3. accepted → `OperationAcked`, rejected → `OperationDiscarded`
//! 4. first network/remote failure → `SyncFailed`, pass stops
//! 5. push progress and achievements, then `SyncSucceeded`
//!
//! Operations enqueued during a pass wait for the next one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::core::remote::{Ack, RemoteSync};
use crate::core::store::{Store, StoreEvent};
use crate::types::{Action, PendingOperation, Snapshot, SyncError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Nothing attempted: no connectivity
    Offline,
    /// Nothing attempted: another pass holds the syncing state
    AlreadySyncing,
    Completed,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub sent: Vec<u64>,
    pub discarded: Vec<u64>,
    pub remaining: usize,
    pub outcome: FlushOutcome,
}

impl FlushReport {
    fn skipped(outcome: FlushOutcome, remaining: usize) -> Self {
        Self { sent: Vec::new(), discarded: Vec::new(), remaining, outcome }
    }
}

/// Fails the pass on drop unless it settled on its own
struct PassGuard<'a> {
    store: &'a Store,
    settled: bool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("sync pass cancelled before it settled");
        let cancelled = Action::SyncFailed { id: None, error: "sync pass cancelled".to_string() };
        if let Err(e) = self.store.apply(cancelled) {
            warn!("could not record cancelled pass: {}", e);
        }
    }
}

pub struct SyncCoordinator {
    store: Arc<Store>,
    remote: Arc<dyn RemoteSync>,
    timeout: Duration,
}

impl SyncCoordinator {
    pub fn new(store: Arc<Store>, remote: Arc<dyn RemoteSync>, timeout: Duration) -> Self {
        Self { store, remote, timeout }
    }

    /// One pass over the queue. Dropping the returned future mid-pass
    /// records a failure so the next pass is not locked out.
    pub async fn flush(&self) -> FlushReport {
        let snapshot = match self.store.apply(Action::BeginSync) {
            Ok(s) => s,
            Err(ValidationError::SyncAlreadyInProgress) => {
                debug!("flush skipped: already syncing");
                return FlushReport::skipped(FlushOutcome::AlreadySyncing, self.queued());
            }
            Err(e) => {
                debug!("flush skipped: {}", e);
                return FlushReport::skipped(FlushOutcome::Offline, self.queued());
            }
        };

        let mut guard = PassGuard { store: self.store.as_ref(), settled: false };
        let report = self.pass(&snapshot).await;
        guard.settled = true;
        report
    }

    /// Everything after `BeginSync`; every return path settles the pass
    async fn pass(&self, snapshot: &Snapshot) -> FlushReport {
        let device = snapshot.user.device_id;
        let batch: Vec<PendingOperation> = snapshot.offline.queue.iter().cloned().collect();
        info!(ops = batch.len(), "sync pass started");

        let mut report = FlushReport::skipped(FlushOutcome::Completed, 0);
        for op in &batch {
            let result = self.call(self.remote.sync_sentences(&device, std::slice::from_ref(op))).await;
            let settled = match result {
                Ok(Ack::Accepted) => {
                    report.sent.push(op.id);
                    self.settle(Action::OperationAcked { id: op.id })
                }
                Ok(Ack::Rejected(reason)) => {
                    warn!(op = op.id, kind = %op.kind, "remote rejected operation, discarding: {}", reason);
                    report.discarded.push(op.id);
                    self.settle(Action::OperationDiscarded { id: op.id, reason })
                }
                Err(e) => Err(e),
            };
            if let Err(e) = settled {
                return self.fail(Some(op.id), e, report);
            }
        }

        let current = self.store.get_snapshot();
        if let Err(e) = self.push_summary(&device, &current).await {
            return self.fail(None, e, report);
        }

        if let Err(e) = self.settle(Action::SyncSucceeded) {
            return self.fail(None, e, report);
        }
        report.remaining = self.queued();
        info!(sent = report.sent.len(), discarded = report.discarded.len(), "sync pass completed");
        report
    }

    async fn push_summary(&self, device: &uuid::Uuid, snapshot: &Snapshot) -> Result<(), SyncError> {
        if let Ack::Rejected(reason) = self
            .call(self.remote.sync_progress(device, &snapshot.learning.progress))
            .await?
        {
            warn!("remote rejected progress: {}", reason);
        }

        let ids = snapshot.gamification.achievements.ids();
        if !ids.is_empty() {
            if let Ack::Rejected(reason) = self.call(self.remote.sync_achievements(device, &ids)).await? {
                warn!("remote rejected achievements: {}", reason);
            }
        }
        Ok(())
    }

    /// Flush on connectivity restored, on the interval, until shutdown
    pub async fn run(&self, interval: Option<Duration>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.store.events();
        let mut ticker = interval.map(tokio::time::interval);

        loop {
            let tick = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = tick => {
                    if !self.store.get_snapshot().offline.queue.is_empty() {
                        self.flush().await;
                    }
                }
                event = events.recv() => match event {
                    Ok(StoreEvent::ConnectivityRestored) => {
                        self.flush().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => debug!(skipped = n, "sync loop lagged"),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("sync loop stopped");
    }

    async fn call<F>(&self, fut: F) -> Result<Ack, SyncError>
    where
        F: Future<Output = Result<Ack, SyncError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    fn settle(&self, action: Action) -> Result<(), SyncError> {
        self.store
            .apply(action)
            .map(|_| ())
            .map_err(|e| SyncError::State(e.to_string()))
    }

    fn fail(&self, id: Option<u64>, error: SyncError, mut report: FlushReport) -> FlushReport {
        warn!(op = ?id, "sync pass failed: {}", error);
        if let Err(e) = self.store.apply(Action::SyncFailed { id, error: error.to_string() }) {
            warn!("could not record sync failure: {}", e);
        }
        report.remaining = self.queued();
        report.outcome = FlushOutcome::Failed { error: error.to_string() };
        report
    }

    fn queued(&self) -> usize {
        self.store.get_snapshot().offline.queue.len()
    }
}
