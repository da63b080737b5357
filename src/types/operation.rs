//! Pending operations and the offline queue
//!
//! The queue is an append-only FIFO log. Producers append through `enqueue`;
//! the sync coordinator is the single consumer and may only retire the head.

use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a queued mutation did locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    AddWord,
    RemoveWord,
    CompleteSentence,
    ProgressUpdate,
    AchievementUnlock,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AddWord => "add-word",
            OperationKind::RemoveWord => "remove-word",
            OperationKind::CompleteSentence => "complete-sentence",
            OperationKind::ProgressUpdate => "progress-update",
            OperationKind::AchievementUnlock => "achievement-unlock",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mutation awaiting remote confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Monotonic sequence number, unique per device
    pub id: u64,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Failed send attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl PendingOperation {
    /// Key the remote uses to make resends idempotent
    pub fn idempotency_key(&self, device_id: &Uuid) -> String {
        format!("{}:{}", device_id, self.id)
    }
}

/// FIFO log of pending operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueue {
    ops: VecDeque<PendingOperation>,
    next_id: u64,
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self {
            ops: VecDeque::new(),
            next_id: 1,
        }
    }
}

impl OfflineQueue {
    /// Append an operation; returns its id
    pub fn enqueue(
        &mut self,
        kind: OperationKind,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.ops.push_back(PendingOperation {
            id,
            kind,
            payload,
            created_at,
            attempts: 0,
            last_error: None,
        });
        id
    }

    /// Retire the head if it carries `id`. Anything else is refused so the
    /// log can never be reordered from the consumer side.
    pub fn retire_head(&mut self, id: u64) -> Option<PendingOperation> {
        match self.ops.front() {
            Some(head) if head.id == id => self.ops.pop_front(),
            _ => None,
        }
    }

    /// Note a failed send; the operation stays queued
    pub fn record_failure(&mut self, id: u64, error: &str) -> bool {
        match self.ops.iter_mut().find(|op| op.id == id) {
            Some(op) => {
                op.attempts += 1;
                op.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }

    pub fn front(&self) -> Option<&PendingOperation> {
        self.ops.front()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.ops.iter()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.ops.iter().map(|op| op.id).collect()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Id the next enqueued operation will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

/// Sync state machine: idle → syncing → {success, error}; error and success
/// may re-enter syncing on the next trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}
