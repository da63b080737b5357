//! Snapshot: the full immutable state tree at one instant
//!
//! Sections are shared behind `Arc`. A reducer clones the root, replaces only
//! the sections it touches, and hands back a new root; untouched sections stay
//! pointer-equal so subscribers can detect change with `Arc::ptr_eq`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{GENERATION_CREDITS, SKILL_MIN};
use crate::types::{
    AchievementRecord, GeneratedContent, OfflineQueue, PartOfSpeech, Pattern, PatternTable,
    SyncStatus, WordBankTable,
};

/// Complete application state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub user: Arc<UserState>,
    pub learning: Arc<LearningState>,
    pub gamification: Arc<GamificationState>,
    pub content: Arc<ContentState>,
    pub offline: Arc<OfflineState>,
    /// Ephemeral: never persisted, never versioned
    pub ui: Arc<UiState>,
}

impl Snapshot {
    /// Fresh state for a device
    pub fn initial(device_id: Uuid) -> Self {
        Self {
            user: Arc::new(UserState {
                device_id,
                ..UserState::default()
            }),
            ..Self::default()
        }
    }
}

// =============================================================================
// USER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserState {
    /// Stable per-install identifier, prefix of every remote idempotency key
    pub device_id: Uuid,
    pub profile: Option<UserProfile>,
    pub preferences: Preferences,
    pub onboarding: OnboardingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub age: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub sound_enabled: bool,
    pub haptic_enabled: bool,
    pub font_size: String,
    pub language: String,
    pub difficulty: String,
    pub animations: bool,
    pub read_aloud: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            sound_enabled: true,
            haptic_enabled: true,
            font_size: "medium".to_string(),
            language: "en".to_string(),
            difficulty: "adaptive".to_string(),
            animations: false,
            read_aloud: false,
        }
    }
}

/// Partial preference update; `None` fields are left as they are
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    pub theme: Option<String>,
    pub sound_enabled: Option<bool>,
    pub haptic_enabled: Option<bool>,
    pub font_size: Option<String>,
    pub language: Option<String>,
    pub difficulty: Option<String>,
    pub animations: Option<bool>,
    pub read_aloud: Option<bool>,
}

impl PreferencesPatch {
    pub fn apply_to(&self, prefs: &mut Preferences) {
        if let Some(v) = &self.theme {
            prefs.theme = v.clone();
        }
        if let Some(v) = self.sound_enabled {
            prefs.sound_enabled = v;
        }
        if let Some(v) = self.haptic_enabled {
            prefs.haptic_enabled = v;
        }
        if let Some(v) = &self.font_size {
            prefs.font_size = v.clone();
        }
        if let Some(v) = &self.language {
            prefs.language = v.clone();
        }
        if let Some(v) = &self.difficulty {
            prefs.difficulty = v.clone();
        }
        if let Some(v) = self.animations {
            prefs.animations = v;
        }
        if let Some(v) = self.read_aloud {
            prefs.read_aloud = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OnboardingStatus {
    pub completed: bool,
    pub responses: Option<OnboardingResponses>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Answers collected by the onboarding flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingResponses {
    pub age: u8,
    /// "beginner", "intermediate" or "advanced"
    pub skill_level: String,
    /// "visual", "auditory", ...
    pub learning_style: String,
}

// =============================================================================
// LEARNING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    /// Sentence under construction (oldest word first)
    pub current_sentence: Vec<WordEntry>,
    pub current_pattern: String,
    pub next_word_id: u64,
    pub session_started_at: Option<DateTime<Utc>>,
    pub session_sentences: Vec<ArchivedSentence>,
    pub progress: Progress,
    pub adaptive: AdaptiveModel,
    pub metrics: SessionMetrics,
    pub last_validation: Option<ValidationOutcome>,
}

impl Default for LearningState {
    fn default() -> Self {
        Self {
            current_sentence: Vec::new(),
            current_pattern: "simple".to_string(),
            next_word_id: 1,
            session_started_at: None,
            session_sentences: Vec::new(),
            progress: Progress::default(),
            adaptive: AdaptiveModel::default(),
            metrics: SessionMetrics::default(),
            last_validation: None,
        }
    }
}

impl LearningState {
    /// Part-of-speech sequence of the sentence under construction
    pub fn structure(&self) -> Vec<PartOfSpeech> {
        self.current_sentence.iter().map(|w| w.part).collect()
    }

    /// The sentence as plain text
    pub fn text(&self) -> String {
        self.current_sentence
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub id: u64,
    pub word: String,
    pub part: PartOfSpeech,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSentence {
    pub words: Vec<WordEntry>,
    pub pattern: String,
    pub archived_at: DateTime<Utc>,
}

/// Cumulative progress counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub level: u32,
    pub xp: u64,
    /// Successful validations
    pub total_sentences: u32,
    /// Every validation, successful or not
    pub attempts: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Running accuracy in percent
    pub accuracy: f64,
    pub mastered_patterns: Vec<String>,
    pub pattern_successes: BTreeMap<String, u32>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            total_sentences: 0,
            attempts: 0,
            current_streak: 0,
            best_streak: 0,
            accuracy: 100.0,
            mastered_patterns: Vec::new(),
            pattern_successes: BTreeMap::new(),
        }
    }
}

/// Skill estimate maintained by the adaptive model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveModel {
    /// In [SKILL_MIN, SKILL_MAX]
    pub skill_level: f64,
    /// In [CONFIDENCE_MIN, CONFIDENCE_MAX] once updated
    pub confidence: f64,
    /// Derived from confidence on every update
    pub learning_rate: f64,
}

impl Default for AdaptiveModel {
    fn default() -> Self {
        Self {
            skill_level: SKILL_MIN,
            confidence: 0.5,
            learning_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub words_per_minute: u32,
    pub vocabulary_size: usize,
}

/// Result of the last sentence validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub pattern: String,
    pub errors: Vec<String>,
}

// =============================================================================
// GAMIFICATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GamificationState {
    pub score: u64,
    pub coins: u64,
    pub gems: u64,
    pub achievements: AchievementLog,
    pub challenges: Challenges,
}

/// Append-only record of unlocked achievements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AchievementLog {
    pub unlocked: Vec<AchievementRecord>,
    /// Newest first, bounded
    pub recent: VecDeque<AchievementRecord>,
}

impl AchievementLog {
    pub fn contains(&self, id: &str) -> bool {
        self.unlocked.iter().any(|r| r.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.unlocked.iter().map(|r| r.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Challenges {
    pub active: Vec<ChallengeProgress>,
    pub completed: Vec<ChallengeProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    pub id: String,
    pub started_at: DateTime<Utc>,
    /// Percent, 0..=100
    pub progress: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// CONTENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentState {
    pub word_banks: WordBankTable,
    pub word_banks_loaded: bool,
    pub patterns: PatternTable,
    pub patterns_loaded: bool,
    pub favorites: Vec<String>,
    pub custom_patterns: Vec<Pattern>,
    pub generated: GenerationCache,
}

impl ContentState {
    /// Custom patterns shadow loaded ones with the same id
    pub fn pattern(&self, id: &str) -> Option<&Pattern> {
        self.custom_patterns
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.patterns.get(id))
    }
}

/// Generated content cache keyed by `generation_key(topic, level)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCache {
    pub entries: BTreeMap<String, GeneratedContent>,
    pub pending: Vec<String>,
    pub credits: u32,
}

impl Default for GenerationCache {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            pending: Vec::new(),
            credits: GENERATION_CREDITS,
        }
    }
}

// =============================================================================
// OFFLINE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineState {
    pub is_online: bool,
    pub queue: OfflineQueue,
    pub last_sync: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
}

impl Default for OfflineState {
    fn default() -> Self {
        Self {
            is_online: true,
            queue: OfflineQueue::default(),
            last_sync: None,
            sync_status: SyncStatus::Idle,
            last_error: None,
        }
    }
}

// =============================================================================
// UI
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiState {
    pub active_view: View,
    pub feedback: Option<Feedback>,
    pub achievement_modal: bool,
    pub celebrating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Builder,
    Dashboard,
    Achievements,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
    pub duration_ms: u64,
}

impl Feedback {
    pub fn new(kind: FeedbackKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Success,
    Error,
    Info,
    Warning,
}
