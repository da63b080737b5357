//! Error taxonomy
//!
//! Only `ValidationError` is surfaced to the caller of `dispatch`. The others
//! are absorbed where they happen and show up in status fields and logs.

use thiserror::Error;

/// Rejection of an action before any mutation; the snapshot is untouched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("pattern '{0}' is not loaded")]
    UnknownPattern(String),

    #[error("no word with id {0} in the current sentence")]
    UnknownWord(u64),

    #[error("word must not be empty")]
    EmptyWord,

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("pattern '{0}' has an empty structure")]
    EmptyPattern(String),

    #[error("unknown achievement '{0}'")]
    UnknownAchievement(String),

    #[error("unknown challenge '{0}'")]
    UnknownChallenge(String),

    #[error("challenge '{0}' is already active")]
    ChallengeAlreadyActive(String),

    #[error("challenge '{0}' is not active")]
    ChallengeNotActive(String),

    #[error("no generation credits remaining")]
    NoCredits,

    #[error("no generation pending for '{0}'")]
    GenerationNotPending(String),

    #[error("cannot sync while offline")]
    Offline,

    #[error("a sync pass is already in progress")]
    SyncAlreadyInProgress,

    #[error("no sync pass is in progress")]
    NotSyncing,

    #[error("operation {0} is not at the head of the queue")]
    NotQueueHead(u64),

    #[error("malformed action: {0}")]
    Malformed(String),

    #[error("action '{0}' is reserved for the engine")]
    Reserved(&'static str),
}

impl ValidationError {
    /// Stable code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownPattern(_) => "V001_UNKNOWN_PATTERN",
            Self::UnknownWord(_) => "V002_UNKNOWN_WORD",
            Self::EmptyWord => "V003_EMPTY_WORD",
            Self::InvalidIdentifier(_) => "V004_INVALID_IDENTIFIER",
            Self::EmptyPattern(_) => "V005_EMPTY_PATTERN",
            Self::UnknownAchievement(_) => "V006_UNKNOWN_ACHIEVEMENT",
            Self::UnknownChallenge(_) => "V007_UNKNOWN_CHALLENGE",
            Self::ChallengeAlreadyActive(_) => "V008_CHALLENGE_ACTIVE",
            Self::ChallengeNotActive(_) => "V009_CHALLENGE_NOT_ACTIVE",
            Self::NoCredits => "V010_NO_CREDITS",
            Self::GenerationNotPending(_) => "V011_GENERATION_NOT_PENDING",
            Self::Offline => "V012_OFFLINE",
            Self::SyncAlreadyInProgress => "V013_SYNC_IN_PROGRESS",
            Self::NotSyncing => "V014_NOT_SYNCING",
            Self::NotQueueHead(_) => "V015_NOT_QUEUE_HEAD",
            Self::Malformed(_) => "V016_MALFORMED_ACTION",
            Self::Reserved(_) => "V017_RESERVED_ACTION",
        }
    }
}

/// Storage read/write failure; triggers the fallback backend
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage backend '{backend}' unavailable: {message}")]
    Unavailable { backend: &'static str, message: String },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("checksum mismatch for key '{0}'")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Network or remote failure; the operation stays queued
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote call timed out after {0} ms")]
    Timeout(u64),

    #[error("remote responded {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("local sync bookkeeping rejected: {0}")]
    State(String),
}

/// The content collaborator could not supply tables
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("content source failed: {0}")]
    Source(String),

    #[error("content unavailable: {0}")]
    Unavailable(String),
}

/// Configuration file could not be read or parsed
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Umbrella error for engine bootstrap
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
