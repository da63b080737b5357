//! Engine configuration: TOML file, then CLI overrides

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::core::store::StoreOptions;
use crate::types::ConfigError;
use crate::{
    ACHIEVEMENT_DISMISS_MS, GENERATION_CREDITS, PERSIST_DEBOUNCE_MS, RECENT_ACHIEVEMENTS_LIMIT,
    REMOTE_TIMEOUT_MS, SYNC_INTERVAL_SECS, UNDO_LIMIT,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for the file backend; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    pub undo_limit: usize,
    pub persist_debounce_ms: u64,
    /// Periodic flush; `None` flushes only on reconnect or on request
    pub sync_interval_secs: Option<u64>,
    pub remote_timeout_ms: u64,
    pub remote_url: Option<String>,
    pub achievement_dismiss_ms: u64,
    pub generation_credits: u32,
    pub recent_achievements: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            undo_limit: UNDO_LIMIT,
            persist_debounce_ms: PERSIST_DEBOUNCE_MS,
            sync_interval_secs: Some(SYNC_INTERVAL_SECS),
            remote_timeout_ms: REMOTE_TIMEOUT_MS,
            remote_url: None,
            achievement_dismiss_ms: ACHIEVEMENT_DISMISS_MS,
            generation_credits: GENERATION_CREDITS,
            recent_achievements: RECENT_ACHIEVEMENTS_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            undo_limit: self.undo_limit,
            recent_achievements: self.recent_achievements,
        }
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn achievement_dismiss(&self) -> Duration {
        Duration::from_millis(self.achievement_dismiss_ms)
    }

    /// A zero interval disables periodic flushing
    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
