//! Effect runner: asynchronous follow-ups to commits
//!
//! Nothing here runs inside `dispatch`. The runner watches the store and
//! writes the persisted projection once commits go quiet for the debounce
//! window; it also closes the achievement modal after a delay. Results feed
//! back only through further dispatches.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::core::persistence::PersistenceAdapter;
use crate::core::store::{Store, StoreEvent};
use crate::types::{Action, Snapshot};

pub struct EffectRunner {
    store: Arc<Store>,
    persistence: Arc<PersistenceAdapter>,
    debounce: Duration,
    dismiss_after: Duration,
}

/// UI is ephemeral; a commit touching only it needs no write
fn needs_write(saved: &Snapshot, latest: &Snapshot) -> bool {
    !Arc::ptr_eq(&saved.user, &latest.user)
        || !Arc::ptr_eq(&saved.learning, &latest.learning)
        || !Arc::ptr_eq(&saved.gamification, &latest.gamification)
        || !Arc::ptr_eq(&saved.content, &latest.content)
        || !Arc::ptr_eq(&saved.offline, &latest.offline)
}

impl EffectRunner {
    pub fn new(
        store: Arc<Store>,
        persistence: Arc<PersistenceAdapter>,
        debounce: Duration,
        dismiss_after: Duration,
    ) -> Self {
        Self { store, persistence, debounce, dismiss_after }
    }

    /// Write the projection and queue now
    pub async fn persist_now(&self) {
        let snapshot = self.store.get_snapshot();
        if let Err(e) = self.persistence.persist(&snapshot).await {
            warn!(code = "P002_PERSIST", "persist failed: {}", e);
        }
    }

    /// Debounced persistence until shutdown; a final write happens on the way out
    pub async fn run_persistence(&self, mut shutdown: watch::Receiver<bool>) {
        let mut changes = self.store.watch();
        let mut saved = changes.borrow_and_update().clone();

        loop {
            tokio::select! {
                r = changes.changed() => if r.is_err() { break },
                _ = shutdown.changed() => break,
            }

            // Wait for a quiet period
            let mut stopping = false;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.debounce) => break,
                    r = changes.changed() => if r.is_err() { stopping = true; break },
                    _ = shutdown.changed() => { stopping = true; break },
                }
            }

            let latest = changes.borrow_and_update().clone();
            if needs_write(&saved, &latest) {
                self.write(&latest).await;
                saved = latest;
            }
            if stopping {
                break;
            }
        }

        let latest = self.store.get_snapshot();
        if needs_write(&saved, &latest) {
            self.write(&latest).await;
        }
        debug!("persistence loop stopped");
    }

    /// Close the achievement modal a while after each unlock
    pub async fn run_dismissal(&self, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.store.events();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(StoreEvent::AchievementUnlocked { .. }) => {
                        let store = Arc::clone(&self.store);
                        let delay = self.dismiss_after;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = store.dispatch(Action::DismissAchievement);
                        });
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn write(&self, snapshot: &Snapshot) {
        match self.persistence.persist(snapshot).await {
            Ok(()) => debug!(queued = snapshot.offline.queue.len(), "projection persisted"),
            Err(e) => warn!(code = "P002_PERSIST", "persist failed: {}", e),
        }
    }
}
