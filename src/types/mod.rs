//! Core types for the sentence engine

mod content;
mod snapshot;
mod operation;
mod achievement;
mod action;
mod error;

pub use content::{
    PartOfSpeech, Pattern, PatternTable, WordBank, WordBankTable, GeneratedContent,
    generation_key, is_valid_identifier,
};
pub use snapshot::{
    Snapshot, UserState, UserProfile, Preferences, PreferencesPatch, OnboardingStatus,
    OnboardingResponses, LearningState, WordEntry, ArchivedSentence, Progress, AdaptiveModel,
    SessionMetrics, ValidationOutcome, GamificationState, AchievementLog, ChallengeProgress,
    Challenges, ContentState, GenerationCache, OfflineState, UiState, View, Feedback, FeedbackKind,
};
pub use operation::{OperationKind, PendingOperation, OfflineQueue, SyncStatus};
pub use achievement::{
    AchievementRecord, AchievementDef, ChallengeDef, ACHIEVEMENTS, CHALLENGES,
    achievement_def, challenge_def,
};
pub use action::Action;
pub use error::{
    ValidationError, PersistenceError, SyncError, ContentError, ConfigError, StoreError,
};
