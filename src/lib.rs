//! Sentence Engine: client state and synchronization core of the Sentence Builder
//!
//! One reactive store owns the snapshot tree. Reducers are pure, the temporal
//! history versions the learning/gamification slice, and an offline queue is
//! drained against the remote service whenever connectivity returns.

pub mod core;
pub mod types;

// =============================================================================
// HISTORY
// =============================================================================

/// Maximum number of tracked-slice entries kept for undo/redo
pub const UNDO_LIMIT: usize = 50;

// =============================================================================
// ADAPTIVE MODEL
// =============================================================================

/// Likelihood of a correct answer given the learner has mastered the pattern
pub const LIKELIHOOD_SUCCESS: f64 = 0.8;

/// Likelihood used on a failed validation
pub const LIKELIHOOD_FAILURE: f64 = 0.2;

/// Confidence is never allowed to reach 0 or 1 (both would be absorbing)
pub const CONFIDENCE_MIN: f64 = 0.01;
pub const CONFIDENCE_MAX: f64 = 0.99;

/// Skill level bounds
pub const SKILL_MIN: f64 = 1.0;
pub const SKILL_MAX: f64 = 10.0;

/// Multiplicative skill adjustment per outcome
pub const SKILL_GROWTH: f64 = 1.05;
pub const SKILL_DECAY: f64 = 0.95;

// =============================================================================
// PROGRESS
// =============================================================================

/// Points awarded when a pattern does not declare its own value
pub const DEFAULT_PATTERN_POINTS: u32 = 10;

/// XP needed per level
pub const XP_PER_LEVEL: u64 = 100;

/// Successful validations of one pattern before it counts as mastered
pub const MASTERY_THRESHOLD: u32 = 5;

/// Size of the "recent achievements" list shown in the dashboard
pub const RECENT_ACHIEVEMENTS_LIMIT: usize = 10;

/// Credits available for generated content on a fresh profile
pub const GENERATION_CREDITS: u32 = 100;

// =============================================================================
// EFFECTS & SYNC
// =============================================================================

/// Debounce between a commit and the persistence write (milliseconds)
pub const PERSIST_DEBOUNCE_MS: u64 = 1000;

/// Remote call timeout (milliseconds); a timeout counts as a network error
pub const REMOTE_TIMEOUT_MS: u64 = 5000;

/// How long the achievement modal stays open (milliseconds)
pub const ACHIEVEMENT_DISMISS_MS: u64 = 5000;

/// Periodic flush interval (seconds)
pub const SYNC_INTERVAL_SECS: u64 = 30;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";

/// Version tag written into every persisted envelope
pub const PERSIST_FORMAT_VERSION: u32 = 1;
