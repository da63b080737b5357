//! Integration tests for persistence and rehydration
//!
//! Each test gets its own temporary data directory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use uuid::Uuid;

use sentence_engine::core::{
    Engine, EngineConfig, FileBackend, MemoryBackend, PersistenceAdapter, StaticContent,
    StorageBackend, Store, Written, KEY_PENDING, KEY_PROJECTION,
};
use sentence_engine::types::{Action, PartOfSpeech, PersistenceError, Snapshot, View};

/// Memory backend that can be switched off
#[derive(Default)]
struct FlakyBackend {
    down: AtomicBool,
    inner: MemoryBackend,
}

impl FlakyBackend {
    fn check(&self) -> Result<(), PersistenceError> {
        if self.down.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable { backend: "flaky", message: "disk full".to_string() })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.check()?;
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.inner.write(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.inner.delete(key).await
    }
}

fn played_store() -> Store {
    let store = Store::new(Snapshot::initial(Uuid::new_v4()));
    store
        .dispatch(Action::ContentLoaded { word_banks: None, patterns: Some(StaticContent::patterns()) })
        .unwrap();
    for (word, part) in [("The", PartOfSpeech::Article), ("cat", PartOfSpeech::Subject), ("sleeps", PartOfSpeech::Verb)] {
        store.dispatch(Action::AddWord { word: word.to_string(), part }).unwrap();
    }
    store.dispatch(Action::ValidateSentence).unwrap();
    store.dispatch(Action::ToggleFavorite { word: "cat".to_string() }).unwrap();
    store.dispatch(Action::SetActiveView { view: View::Dashboard }).unwrap();
    store
}

/// Progress, queue and device id survive a restart; UI does not
#[tokio::test]
async fn test_file_roundtrip_restores_projection_and_queue() {
    let dir = TempDir::new().unwrap();
    let store = played_store();
    let before = store.get_snapshot();

    let adapter = PersistenceAdapter::new(Arc::new(FileBackend::new(dir.path())));
    adapter.persist(&before).await.unwrap();
    assert!(dir.path().join("store-projection.json").exists());
    assert!(dir.path().join("pending-operations.json").exists());

    let reopened = PersistenceAdapter::new(Arc::new(FileBackend::new(dir.path())));
    let after = reopened.rehydrate(100).await;

    assert_eq!(after.user.device_id, before.user.device_id);
    assert_eq!(after.learning.progress, before.learning.progress);
    assert_eq!(after.gamification.score, before.gamification.score);
    assert_eq!(after.content.favorites, vec!["cat".to_string()]);
    assert_eq!(after.offline.queue, before.offline.queue);
    assert_eq!(after.ui.active_view, View::Builder);
}

#[tokio::test]
async fn test_corrupt_file_is_ignored_on_rehydrate() {
    let dir = TempDir::new().unwrap();
    let adapter = PersistenceAdapter::new(Arc::new(FileBackend::new(dir.path())));
    let original = played_store().get_snapshot();
    adapter.persist(&original).await.unwrap();

    let path = dir.path().join("store-projection.json");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("cat", "dog")).unwrap();

    let after = adapter.rehydrate(100).await;
    assert_ne!(after.user.device_id, original.user.device_id);
    assert_eq!(after.learning.progress.total_sentences, 0);
    // The queue lives in its own namespace and is still intact
    assert_eq!(after.offline.queue, original.offline.queue);
}

/// Writes land in the fallback while the primary is down and move back
/// once it recovers
#[tokio::test]
async fn test_fallback_while_primary_down() {
    let primary = Arc::new(FlakyBackend::default());
    let adapter = PersistenceAdapter::new(Arc::clone(&primary) as Arc<dyn StorageBackend>);
    let snapshot = played_store().get_snapshot();

    primary.down.store(true, Ordering::SeqCst);
    assert_eq!(adapter.save_json(KEY_PENDING, &snapshot.offline.queue).await.unwrap(), Written::Fallback);
    assert_eq!(adapter.fallback_len(), 1);
    let rehydrated = adapter.rehydrate(100).await;
    assert_eq!(rehydrated.offline.queue, snapshot.offline.queue);

    primary.down.store(false, Ordering::SeqCst);
    assert_eq!(adapter.save_json(KEY_PENDING, &snapshot.offline.queue).await.unwrap(), Written::Primary);
    assert_eq!(adapter.fallback_len(), 0);
    assert!(primary.inner.get(KEY_PENDING).is_some());
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let adapter = PersistenceAdapter::in_memory();
    assert!(matches!(
        adapter.save("../outside", "x").await,
        Err(PersistenceError::InvalidKey(_))
    ));
    assert!(adapter.load(KEY_PROJECTION).await.unwrap().is_none());
}

/// Engine restart against the same data dir picks up where it left off
#[tokio::test]
async fn test_engine_restart_rehydrates() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        data_dir: Some(dir.path().to_path_buf()),
        persist_debounce_ms: 10,
        sync_interval_secs: None,
        ..EngineConfig::default()
    };

    let engine = Engine::start(config.clone()).await;
    assert!(engine.store.get_snapshot().content.patterns_loaded);
    let device = engine.store.get_snapshot().user.device_id;
    engine
        .store
        .dispatch(Action::AddWord { word: "cat".to_string(), part: PartOfSpeech::Subject })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.shutdown().await;

    let engine = Engine::start(config).await;
    let snap = engine.store.get_snapshot();
    assert_eq!(snap.user.device_id, device);
    assert_eq!(snap.offline.queue.len(), 1);
    assert!(snap.content.patterns_loaded);
    // The sentence under construction is not part of the projection
    assert!(snap.learning.current_sentence.is_empty());
    engine.shutdown().await;
}
