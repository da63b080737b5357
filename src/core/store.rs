//! Snapshot store
//!
//! One writer at a time. Callers take a ticket from the `WriterGate` and are
//! served strictly in ticket order, so concurrent dispatches commit in the
//! order they were submitted. Commits are published three ways:
//! - synchronous listeners (`subscribe`), called after the gate is released,
//!   in commit order
//! - a `watch` channel holding the latest snapshot (persistence, websocket)
//! - a `broadcast` of discrete `StoreEvent`s (achievements, connectivity)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{RECENT_ACHIEVEMENTS_LIMIT, UNDO_LIMIT};
use crate::core::history::{History, TrackedSlice};
use crate::core::reducer::{reduce, ReduceContext};
use crate::types::{Action, Snapshot, ValidationError};

/// Discrete happenings a commit can produce, each emitted exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    AchievementUnlocked { id: String },
    ConnectivityRestored,
}

pub type SubscriptionId = u64;

type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub undo_limit: usize,
    pub recent_achievements: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            undo_limit: UNDO_LIMIT,
            recent_achievements: RECENT_ACHIEVEMENTS_LIMIT,
        }
    }
}

// =============================================================================
// WRITER GATE
// =============================================================================

/// Ticket lock: FIFO admission of writers
struct WriterGate {
    next_ticket: AtomicU64,
    serving: Mutex<u64>,
    turn: Condvar,
}

struct GatePass<'a> {
    gate: &'a WriterGate,
}

impl WriterGate {
    fn new() -> Self {
        Self {
            next_ticket: AtomicU64::new(0),
            serving: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    fn enter(&self) -> GatePass<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let mut serving = lock(&self.serving);
        while *serving != ticket {
            serving = self.turn.wait(serving).unwrap_or_else(PoisonError::into_inner);
        }
        GatePass { gate: self }
    }
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        *lock(&self.gate.serving) += 1;
        self.gate.turn.notify_all();
    }
}

/// Commits waiting for listener delivery, oldest first
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Snapshot>,
    draining: bool,
}

/// Releases the outbox if a listener panics mid-drain
struct Draining<'a>(&'a Mutex<Outbox>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

/// A panicking listener must not wedge the store
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// STORE
// =============================================================================

pub struct Store {
    gate: WriterGate,
    current: RwLock<Snapshot>,
    history: Mutex<History<TrackedSlice>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_listener: AtomicU64,
    outbox: Mutex<Outbox>,
    changes: watch::Sender<Snapshot>,
    events: broadcast::Sender<StoreEvent>,
    options: StoreOptions,
}

impl Store {
    pub fn new(initial: Snapshot) -> Self {
        Self::with_options(initial, StoreOptions::default())
    }

    pub fn with_options(initial: Snapshot, options: StoreOptions) -> Self {
        let mut history = History::new(options.undo_limit);
        history.record(TrackedSlice::of(&initial));
        let (changes, _) = watch::channel(initial.clone());
        let (events, _) = broadcast::channel(64);

        Self {
            gate: WriterGate::new(),
            current: RwLock::new(initial),
            history: Mutex::new(history),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            outbox: Mutex::new(Outbox::default()),
            changes,
            events,
            options,
        }
    }

    /// Latest committed snapshot
    pub fn get_snapshot(&self) -> Snapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply one action. On rejection nothing is committed and nobody is notified.
    /// Sync bookkeeping is refused here; only the sync coordinator issues it.
    pub fn dispatch(&self, action: Action) -> Result<Snapshot, ValidationError> {
        if action.is_sync_bookkeeping() {
            warn!(action = action.name(), "reserved action refused");
            return Err(ValidationError::Reserved(action.name()));
        }
        self.apply(action)
    }

    /// Unchecked dispatch for the engine's own collaborators
    pub(crate) fn apply(&self, action: Action) -> Result<Snapshot, ValidationError> {
        let pass = self.gate.enter();
        let current = self.get_snapshot();
        let ctx = ReduceContext {
            now: Utc::now(),
            recent_limit: self.options.recent_achievements,
        };

        let transition = match reduce(&current, &action, &ctx) {
            Ok(t) => t,
            Err(e) => {
                debug!(action = action.name(), code = e.code(), "dispatch rejected: {}", e);
                return Err(e);
            }
        };

        let next = transition.snapshot;
        if TrackedSlice::changed(&current, &next) {
            lock(&self.history).record(TrackedSlice::of(&next));
        }
        self.commit(&next);

        for id in &transition.unlocked {
            info!(achievement = %id, "achievement unlocked");
            let _ = self.events.send(StoreEvent::AchievementUnlocked { id: id.clone() });
        }
        if transition.connectivity_restored {
            info!("connectivity restored");
            let _ = self.events.send(StoreEvent::ConnectivityRestored);
        }
        drop(pass);

        self.deliver();
        Ok(next)
    }

    /// Restore the previous tracked slice. The restore itself is not recorded.
    pub fn undo(&self) -> Option<Snapshot> {
        self.travel(|h| h.undo())
    }

    pub fn redo(&self) -> Option<Snapshot> {
        self.travel(|h| h.redo())
    }

    pub fn can_undo(&self) -> bool {
        lock(&self.history).can_undo()
    }

    pub fn can_redo(&self) -> bool {
        lock(&self.history).can_redo()
    }

    fn travel(&self, step: impl FnOnce(&mut History<TrackedSlice>) -> Option<TrackedSlice>) -> Option<Snapshot> {
        let pass = self.gate.enter();
        let slice = step(&mut lock(&self.history))?;
        let next = slice.restore_into(&self.get_snapshot());
        self.commit(&next);
        drop(pass);

        self.deliver();
        Some(next)
    }

    /// Register a listener called with every committed snapshot
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the id was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Receiver that always holds the latest committed snapshot
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.changes.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // Caller holds the gate, so the outbox receives commits in order
    fn commit(&self, next: &Snapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        self.changes.send_replace(next.clone());
        lock(&self.outbox).queue.push_back(next.clone());
    }

    /// Listeners run outside the gate so they may dispatch themselves. One
    /// caller at a time drains the outbox; the others leave their commit to it.
    fn deliver(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _draining = Draining(&self.outbox);

        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.notify(&next);
        }
    }

    fn notify(&self, snapshot: &Snapshot) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("options", &self.options)
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}
