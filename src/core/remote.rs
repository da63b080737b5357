//! Remote sync collaborator
//!
//! Every call must be safe to repeat: the remote is a consumer of idempotent
//! commands keyed by `"{device_id}:{operation_id}"`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::types::{PendingOperation, Progress, SyncError};

/// Remote verdict on a call that reached it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Accepted,
    /// Permanently inapplicable; resending would never succeed
    Rejected(String),
}

#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn sync_sentences(&self, device_id: &Uuid, ops: &[PendingOperation]) -> Result<Ack, SyncError>;
    async fn sync_progress(&self, device_id: &Uuid, progress: &Progress) -> Result<Ack, SyncError>;
    async fn sync_achievements(&self, device_id: &Uuid, ids: &[String]) -> Result<Ack, SyncError>;
}

/// JSON-over-HTTP remote
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct WireOperation<'a> {
    key: String,
    kind: &'static str,
    payload: &'a serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, idempotency_key: &str, body: serde_json::Value) -> Result<Ack, SyncError> {
        let url = format!("{}/sync/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(Ack::Accepted);
        }
        let message = response.text().await.unwrap_or_default();
        match status.as_u16() {
            409 | 422 => Ok(Ack::Rejected(message)),
            code => Err(SyncError::Remote { status: code, message }),
        }
    }
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn sync_sentences(&self, device_id: &Uuid, ops: &[PendingOperation]) -> Result<Ack, SyncError> {
        let wire: Vec<WireOperation<'_>> = ops
            .iter()
            .map(|op| WireOperation {
                key: op.idempotency_key(device_id),
                kind: op.kind.as_str(),
                payload: &op.payload,
                created_at: op.created_at,
            })
            .collect();
        let key = wire.iter().map(|w| w.key.as_str()).collect::<Vec<_>>().join(",");
        self.post("sentences", &key, json!({ "device_id": device_id, "operations": wire }))
            .await
    }

    async fn sync_progress(&self, device_id: &Uuid, progress: &Progress) -> Result<Ack, SyncError> {
        let key = format!("{}:progress:{}", device_id, progress.attempts);
        self.post("progress", &key, json!({ "device_id": device_id, "progress": progress }))
            .await
    }

    async fn sync_achievements(&self, device_id: &Uuid, ids: &[String]) -> Result<Ack, SyncError> {
        let key = format!("{}:achievements:{}", device_id, ids.len());
        self.post("achievements", &key, json!({ "device_id": device_id, "achievements": ids }))
            .await
    }
}
