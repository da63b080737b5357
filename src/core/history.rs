//! Temporal history: bounded undo/redo over the tracked slice
//!
//! Entries are full slice values, oldest first, with a cursor on the entry
//! that matches the live state. Recording after an undo drops the redo branch.
//! Past capacity, the oldest entry is discarded.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::types::{achievement_def, AchievementRecord, GamificationState, LearningState, Snapshot};

/// The versioned part of the snapshot. Other sections cannot end up in
/// history because this type has no place for them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSlice {
    pub learning: Arc<LearningState>,
    pub gamification: Arc<GamificationState>,
}

impl TrackedSlice {
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            learning: Arc::clone(&snapshot.learning),
            gamification: Arc::clone(&snapshot.gamification),
        }
    }

    /// True when `after` holds different slice sections than `before`
    pub fn changed(before: &Snapshot, after: &Snapshot) -> bool {
        !Arc::ptr_eq(&before.learning, &after.learning)
            || !Arc::ptr_eq(&before.gamification, &after.gamification)
    }

    /// Graft this slice onto a snapshot, keeping every other section.
    /// Achievements unlocked in the live state survive the restore along
    /// with their rewards, so time travel never makes one unlock twice.
    pub fn restore_into(&self, snapshot: &Snapshot) -> Snapshot {
        let gamification = match carry_unlocks(&self.gamification, &snapshot.gamification) {
            Some(merged) => Arc::new(merged),
            None => Arc::clone(&self.gamification),
        };
        Snapshot {
            learning: Arc::clone(&self.learning),
            gamification,
            ..snapshot.clone()
        }
    }
}

/// `restored` plus every record `live` holds that it lacks; `None` when
/// nothing is missing
fn carry_unlocks(restored: &GamificationState, live: &GamificationState) -> Option<GamificationState> {
    let missing: Vec<&AchievementRecord> = live
        .achievements
        .unlocked
        .iter()
        .filter(|r| !restored.achievements.contains(&r.id))
        .collect();
    if missing.is_empty() {
        return None;
    }

    let mut merged = restored.clone();
    for record in missing {
        merged.achievements.unlocked.push(record.clone());
        if let Some(def) = achievement_def(&record.id) {
            merged.score += def.points;
            merged.coins += def.coins;
            merged.gems += def.gems;
        }
    }
    merged.achievements.recent = live.achievements.recent.clone();
    Some(merged)
}

/// Fixed-capacity history with a cursor
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    cursor: usize,
    capacity: usize,
}

impl<T: Clone> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a new present. Anything ahead of the cursor is discarded.
    pub fn record(&mut self, entry: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back; returns the entry that becomes the present
    pub fn undo(&mut self) -> Option<T> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward again after an undo
    pub fn redo(&mut self) -> Option<T> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop everything and start over from `entry`
    pub fn reset(&mut self, entry: T) {
        self.entries.clear();
        self.cursor = 0;
        self.record(entry);
    }
}
