//! Persistence adapter
//!
//! Key/value storage with a durable primary backend and a synchronous
//! in-memory fallback. Values are wrapped in a checksummed envelope.
//!
//! Three namespaces:
//! - `store-projection`: user, progress, adaptive model, gamification, content customizations
//! - `pending-operations`: the offline queue
//! - `content-cache`: loaded word banks/patterns and generated content
//!
//! UI state is never written.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::PERSIST_FORMAT_VERSION;
use crate::types::{
    AdaptiveModel, GamificationState, GeneratedContent, OfflineQueue, Pattern, PatternTable,
    PersistenceError, Progress, Snapshot, UserState, WordBankTable,
};

pub const KEY_PROJECTION: &str = "store-projection";
pub const KEY_PENDING: &str = "pending-operations";
pub const KEY_CONTENT: &str = "content-cache";

lazy_static! {
    static ref RE_KEY: Regex = Regex::new(r"^[a-z0-9][a-z0-9._-]{0,127}$").unwrap();
}

fn check_key(key: &str) -> Result<(), PersistenceError> {
    if RE_KEY.is_match(key) && !key.contains("..") {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}

// =============================================================================
// BACKENDS
// =============================================================================

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

/// One JSON file per key under a data directory; writes go through a
/// temp file and a rename so a crash never leaves a torn value.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        check_key(key)?;
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Synchronous in-process map. Serves as the fallback and as a primary in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        check_key(key)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn take(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        check_key(key)?;
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.put(key, value)
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        check_key(key)?;
        self.take(key);
        Ok(())
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Stored form of every value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    /// SHA-256 hex of `payload`
    pub checksum: String,
    pub payload: String,
}

impl Envelope {
    pub fn seal(payload: String) -> Self {
        Self {
            version: PERSIST_FORMAT_VERSION,
            checksum: checksum(&payload),
            payload,
        }
    }

    pub fn open(self, key: &str) -> Result<String, PersistenceError> {
        if self.version != PERSIST_FORMAT_VERSION || checksum(&self.payload) != self.checksum {
            return Err(PersistenceError::Corrupt(key.to_string()));
        }
        Ok(self.payload)
    }
}

fn checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Which backend accepted a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Primary,
    Fallback,
}

pub struct PersistenceAdapter {
    primary: Arc<dyn StorageBackend>,
    fallback: MemoryBackend,
}

impl PersistenceAdapter {
    pub fn new(primary: Arc<dyn StorageBackend>) -> Self {
        Self {
            primary,
            fallback: MemoryBackend::new(),
        }
    }

    /// Memory-only adapter (tests, no data dir configured)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Values written while the primary was failing
    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }

    /// Read a value. The fallback only ever holds writes newer than the
    /// primary's copy, so it is consulted first. A corrupt value reads as absent.
    pub async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        check_key(key)?;
        let raw = match self.fallback.get(key) {
            Some(raw) => Some(raw),
            None => match self.primary.read(key).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(backend = self.primary.name(), key, "read failed: {}", e);
                    None
                }
            },
        };

        let Some(raw) = raw else {
            return Ok(None);
        };
        let opened = serde_json::from_str::<Envelope>(&raw)
            .map_err(PersistenceError::from)
            .and_then(|env| env.open(key));
        match opened {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!(key, "discarding stored value: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, key: &str, value: &str) -> Result<Written, PersistenceError> {
        check_key(key)?;
        let sealed = serde_json::to_string(&Envelope::seal(value.to_string()))?;
        match self.primary.write(key, &sealed).await {
            Ok(()) => {
                self.fallback.take(key);
                debug!(backend = self.primary.name(), key, bytes = sealed.len(), "saved");
                Ok(Written::Primary)
            }
            Err(e) => {
                warn!(backend = self.primary.name(), key, "write failed, using fallback: {}", e);
                self.fallback.put(key, &sealed)?;
                Ok(Written::Fallback)
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        check_key(key)?;
        self.fallback.take(key);
        if let Err(e) = self.primary.delete(key).await {
            warn!(backend = self.primary.name(), key, "delete failed: {}", e);
        }
        Ok(())
    }

    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        match self.load(key).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<Written, PersistenceError> {
        let payload = serde_json::to_string(value)?;
        self.save(key, &payload).await
    }

    /// Write the projection and the queue
    pub async fn persist(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.save_json(KEY_PROJECTION, &Projection::of(snapshot)).await?;
        self.save_json(KEY_PENDING, &snapshot.offline.queue).await?;
        Ok(())
    }

    /// Rebuild a snapshot from whatever is stored. Missing or unreadable
    /// namespaces fall back to initial values; a fresh device id (with
    /// `initial_credits`) is minted only when no projection exists.
    pub async fn rehydrate(&self, initial_credits: u32) -> Snapshot {
        let projection = self.load_logged::<Projection>(KEY_PROJECTION).await;
        let queue = self.load_logged::<OfflineQueue>(KEY_PENDING).await;
        let cache = self.load_logged::<ContentCache>(KEY_CONTENT).await;

        let mut snapshot = match &projection {
            Some(p) => Snapshot::initial(p.user.device_id),
            None => Snapshot::initial(Uuid::new_v4()),
        };
        match projection {
            Some(p) => p.apply_to(&mut snapshot),
            None => Arc::make_mut(&mut snapshot.content).generated.credits = initial_credits,
        }
        if let Some(queue) = queue {
            Arc::make_mut(&mut snapshot.offline).queue = queue;
        }
        if let Some(cache) = cache {
            cache.apply_to(&mut snapshot);
        }
        snapshot
    }

    async fn load_logged<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.load_json(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, code = "P001_REHYDRATE", "ignoring stored value: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("primary", &self.primary.name())
            .field("fallback_entries", &self.fallback.len())
            .finish()
    }
}

// =============================================================================
// PERSISTED SHAPES
// =============================================================================

/// What survives a restart under `store-projection`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub user: UserState,
    pub current_pattern: String,
    pub progress: Progress,
    pub adaptive: AdaptiveModel,
    pub gamification: GamificationState,
    pub favorites: Vec<String>,
    pub custom_patterns: Vec<Pattern>,
    pub generation_credits: u32,
}

impl Projection {
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            user: (*snapshot.user).clone(),
            current_pattern: snapshot.learning.current_pattern.clone(),
            progress: snapshot.learning.progress.clone(),
            adaptive: snapshot.learning.adaptive,
            gamification: (*snapshot.gamification).clone(),
            favorites: snapshot.content.favorites.clone(),
            custom_patterns: snapshot.content.custom_patterns.clone(),
            generation_credits: snapshot.content.generated.credits,
        }
    }

    pub fn apply_to(self, snapshot: &mut Snapshot) {
        snapshot.user = Arc::new(self.user);
        let learning = Arc::make_mut(&mut snapshot.learning);
        learning.current_pattern = self.current_pattern;
        learning.progress = self.progress;
        learning.adaptive = self.adaptive;
        snapshot.gamification = Arc::new(self.gamification);
        let content = Arc::make_mut(&mut snapshot.content);
        content.favorites = self.favorites;
        content.custom_patterns = self.custom_patterns;
        content.generated.credits = self.generation_credits;
    }
}

/// Large content payloads, kept apart from the projection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentCache {
    pub word_banks: Option<WordBankTable>,
    pub patterns: Option<PatternTable>,
    pub generated: BTreeMap<String, GeneratedContent>,
}

impl ContentCache {
    pub fn of(snapshot: &Snapshot) -> Self {
        let content = &snapshot.content;
        Self {
            word_banks: content.word_banks_loaded.then(|| content.word_banks.clone()),
            patterns: content.patterns_loaded.then(|| content.patterns.clone()),
            generated: content.generated.entries.clone(),
        }
    }

    pub fn apply_to(self, snapshot: &mut Snapshot) {
        let content = Arc::make_mut(&mut snapshot.content);
        if let Some(banks) = self.word_banks {
            content.word_banks = banks;
            content.word_banks_loaded = true;
        }
        if let Some(patterns) = self.patterns {
            content.patterns = patterns;
            content.patterns_loaded = true;
        }
        content.generated.entries = self.generated;
    }
}
