//! Reducer: pure state transitions
//!
//! `reduce` never mutates its input. It clones the root (sections are shared),
//! copies-on-write only the sections an action touches, and either returns the
//! whole new snapshot or a `ValidationError` with nothing applied.

use std::collections::HashSet;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{DEFAULT_PATTERN_POINTS, MASTERY_THRESHOLD, RECENT_ACHIEVEMENTS_LIMIT, XP_PER_LEVEL};
use crate::core::achievements::{evaluate, unlock};
use crate::core::adaptive::update_adaptive;
use crate::types::{
    achievement_def, challenge_def, is_valid_identifier, Action, ChallengeProgress, LearningState,
    OnboardingResponses, OnboardingStatus, OperationKind, PartOfSpeech, Pattern, Preferences,
    Snapshot, SyncStatus, ValidationError, ValidationOutcome, WordEntry,
};

/// Inputs a reducer may read besides the snapshot and the action
#[derive(Debug, Clone, Copy)]
pub struct ReduceContext {
    pub now: DateTime<Utc>,
    pub recent_limit: usize,
}

impl ReduceContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, recent_limit: RECENT_ACHIEVEMENTS_LIMIT }
    }
}

/// A committed-to-be snapshot plus the side effects the store must announce
#[derive(Debug, Clone)]
pub struct Transition {
    pub snapshot: Snapshot,
    /// Achievements unlocked by this step, each reported exactly once
    pub unlocked: Vec<String>,
    /// The step moved the connectivity flag from offline to online
    pub connectivity_restored: bool,
}

/// Apply one action
pub fn reduce(
    state: &Snapshot,
    action: &Action,
    ctx: &ReduceContext,
) -> Result<Transition, ValidationError> {
    let mut next = state.clone();
    let mut unlocked = Vec::new();
    let mut connectivity_restored = false;

    match action {
        // ---------------------------------------------------------------------
        // User
        // ---------------------------------------------------------------------
        Action::SetProfile { profile } => {
            Arc::make_mut(&mut next.user).profile = Some(profile.clone());
        }
        Action::UpdatePreferences { patch } => {
            patch.apply_to(&mut Arc::make_mut(&mut next.user).preferences);
        }
        Action::CompleteOnboarding { responses } => {
            let user = Arc::make_mut(&mut next.user);
            personalize(&mut user.preferences, responses);
            user.onboarding = OnboardingStatus {
                completed: true,
                responses: Some(responses.clone()),
                completed_at: Some(ctx.now),
            };
        }

        // ---------------------------------------------------------------------
        // Learning
        // ---------------------------------------------------------------------
        Action::AddWord { word, part } => add_word(&mut next, word, *part, ctx)?,
        Action::RemoveWord { id } => remove_word(&mut next, *id, ctx)?,
        Action::SelectPattern { pattern } => {
            if next.content.pattern(pattern).is_none() {
                return Err(ValidationError::UnknownPattern(pattern.clone()));
            }
            Arc::make_mut(&mut next.learning).current_pattern = pattern.clone();
        }
        Action::ValidateSentence => {
            unlocked = validate_sentence(&mut next, ctx)?;
        }
        Action::ClearSentence => {
            if !next.learning.current_sentence.is_empty() {
                let learning = Arc::make_mut(&mut next.learning);
                archive_current(learning, ctx.now);
                refresh_metrics(learning, ctx.now);
            }
        }

        // ---------------------------------------------------------------------
        // Content customizations
        // ---------------------------------------------------------------------
        Action::ToggleFavorite { word } => {
            let word = word.trim();
            if word.is_empty() {
                return Err(ValidationError::EmptyWord);
            }
            let content = Arc::make_mut(&mut next.content);
            match content.favorites.iter().position(|w| w == word) {
                Some(pos) => {
                    content.favorites.remove(pos);
                }
                None => content.favorites.push(word.to_string()),
            }
        }
        Action::AddCustomPattern { pattern } => {
            check_pattern(pattern)?;
            let content = Arc::make_mut(&mut next.content);
            content.custom_patterns.retain(|p| p.id != pattern.id);
            content.custom_patterns.push(pattern.clone());
        }

        // ---------------------------------------------------------------------
        // Gamification
        // ---------------------------------------------------------------------
        Action::UnlockAchievement { id } => {
            if achievement_def(id).is_none() {
                return Err(ValidationError::UnknownAchievement(id.clone()));
            }
            unlocked = apply_unlocks(&mut next, &[id.clone()], ctx);
        }
        Action::StartChallenge { id } => {
            if challenge_def(id).is_none() {
                return Err(ValidationError::UnknownChallenge(id.clone()));
            }
            if next.gamification.challenges.active.iter().any(|c| c.id == *id) {
                return Err(ValidationError::ChallengeAlreadyActive(id.clone()));
            }
            Arc::make_mut(&mut next.gamification)
                .challenges
                .active
                .push(ChallengeProgress {
                    id: id.clone(),
                    started_at: ctx.now,
                    progress: 0,
                    completed_at: None,
                });
        }
        Action::UpdateChallengeProgress { id, progress } => {
            update_challenge(&mut next, id, *progress, ctx)?;
        }

        // ---------------------------------------------------------------------
        // Content collaborator results
        // ---------------------------------------------------------------------
        Action::ContentLoaded { word_banks, patterns } => {
            let content = Arc::make_mut(&mut next.content);
            if let Some(banks) = word_banks {
                content.word_banks = banks.clone();
                content.word_banks_loaded = true;
            }
            if let Some(table) = patterns {
                content.patterns = table.clone();
                content.patterns_loaded = true;
            }
        }
        Action::GenerationStarted { key } => {
            let generated = &next.content.generated;
            if !generated.entries.contains_key(key) && !generated.pending.contains(key) {
                if generated.credits == 0 {
                    return Err(ValidationError::NoCredits);
                }
                Arc::make_mut(&mut next.content).generated.pending.push(key.clone());
            }
        }
        Action::GenerationCompleted { key, content } => {
            if !next.content.generated.pending.contains(key) {
                return Err(ValidationError::GenerationNotPending(key.clone()));
            }
            let generated = &mut Arc::make_mut(&mut next.content).generated;
            generated.pending.retain(|k| k != key);
            generated.entries.insert(key.clone(), content.clone());
            generated.credits = generated.credits.saturating_sub(1);
        }
        Action::GenerationFailed { key } => {
            if !next.content.generated.pending.contains(key) {
                return Err(ValidationError::GenerationNotPending(key.clone()));
            }
            Arc::make_mut(&mut next.content).generated.pending.retain(|k| k != key);
        }

        // ---------------------------------------------------------------------
        // Connectivity and sync bookkeeping
        // ---------------------------------------------------------------------
        Action::SetOnline { online } => {
            let offline = Arc::make_mut(&mut next.offline);
            connectivity_restored = *online && !offline.is_online;
            offline.is_online = *online;
        }
        Action::BeginSync => {
            if !next.offline.is_online {
                return Err(ValidationError::Offline);
            }
            if next.offline.sync_status == SyncStatus::Syncing {
                return Err(ValidationError::SyncAlreadyInProgress);
            }
            let offline = Arc::make_mut(&mut next.offline);
            offline.sync_status = SyncStatus::Syncing;
            offline.last_error = None;
        }
        Action::OperationAcked { id } | Action::OperationDiscarded { id, .. } => {
            require_syncing(&next)?;
            Arc::make_mut(&mut next.offline)
                .queue
                .retire_head(*id)
                .ok_or(ValidationError::NotQueueHead(*id))?;
        }
        Action::SyncFailed { id, error } => {
            require_syncing(&next)?;
            let offline = Arc::make_mut(&mut next.offline);
            if let Some(id) = id {
                offline.queue.record_failure(*id, error);
            }
            offline.sync_status = SyncStatus::Error;
            offline.last_error = Some(error.clone());
        }
        Action::SyncSucceeded => {
            require_syncing(&next)?;
            let offline = Arc::make_mut(&mut next.offline);
            offline.sync_status = SyncStatus::Success;
            offline.last_sync = Some(ctx.now);
            offline.last_error = None;
        }

        // ---------------------------------------------------------------------
        // UI
        // ---------------------------------------------------------------------
        Action::SetActiveView { view } => {
            Arc::make_mut(&mut next.ui).active_view = *view;
        }
        Action::ShowFeedback { feedback } => {
            Arc::make_mut(&mut next.ui).feedback = Some(feedback.clone());
        }
        Action::DismissFeedback => {
            Arc::make_mut(&mut next.ui).feedback = None;
        }
        Action::DismissAchievement => {
            let ui = Arc::make_mut(&mut next.ui);
            ui.achievement_modal = false;
            ui.celebrating = false;
        }

        Action::Reset => {
            next = reset_snapshot(state);
        }
    }

    Ok(Transition { snapshot: next, unlocked, connectivity_restored })
}

/// Compare the typed word sequence against a pattern
pub fn validate_structure(structure: &[PartOfSpeech], pattern: &Pattern) -> ValidationOutcome {
    let expected = &pattern.structure;
    let valid = structure == expected.as_slice();
    let mut errors = Vec::new();

    if !valid {
        if structure.len() < expected.len() {
            errors.push(format!("Missing {} word(s)", expected.len() - structure.len()));
        } else if structure.len() > expected.len() {
            errors.push(format!(
                "Too many words ({} vs {})",
                structure.len(),
                expected.len()
            ));
        } else if let Some((i, (got, want))) = structure
            .iter()
            .zip(expected.iter())
            .enumerate()
            .find(|(_, (got, want))| got != want)
        {
            errors.push(format!("Position {}: Expected {}, got {}", i + 1, want, got));
        }
    }

    ValidationOutcome { valid, pattern: pattern.id.clone(), errors }
}

fn add_word(
    next: &mut Snapshot,
    word: &str,
    part: PartOfSpeech,
    ctx: &ReduceContext,
) -> Result<(), ValidationError> {
    let word = word.trim();
    if word.is_empty() {
        return Err(ValidationError::EmptyWord);
    }

    let learning = Arc::make_mut(&mut next.learning);
    let id = learning.next_word_id;
    learning.next_word_id += 1;
    learning.session_started_at.get_or_insert(ctx.now);
    learning.current_sentence.push(WordEntry {
        id,
        word: word.to_string(),
        part,
        added_at: ctx.now,
    });
    refresh_metrics(learning, ctx.now);

    Arc::make_mut(&mut next.offline).queue.enqueue(
        OperationKind::AddWord,
        json!({ "word_id": id, "word": word, "part": part }),
        ctx.now,
    );
    Ok(())
}

fn remove_word(next: &mut Snapshot, id: u64, ctx: &ReduceContext) -> Result<(), ValidationError> {
    let pos = next
        .learning
        .current_sentence
        .iter()
        .position(|w| w.id == id)
        .ok_or(ValidationError::UnknownWord(id))?;

    let learning = Arc::make_mut(&mut next.learning);
    learning.current_sentence.remove(pos);
    refresh_metrics(learning, ctx.now);

    Arc::make_mut(&mut next.offline).queue.enqueue(
        OperationKind::RemoveWord,
        json!({ "word_id": id }),
        ctx.now,
    );
    Ok(())
}

/// Validation path. Returns the achievements unlocked by this attempt.
fn validate_sentence(next: &mut Snapshot, ctx: &ReduceContext) -> Result<Vec<String>, ValidationError> {
    let pattern = next
        .content
        .pattern(&next.learning.current_pattern)
        .cloned()
        .ok_or_else(|| ValidationError::UnknownPattern(next.learning.current_pattern.clone()))?;
    let outcome = validate_structure(&next.learning.structure(), &pattern);
    let points = u64::from(if pattern.points == 0 { DEFAULT_PATTERN_POINTS } else { pattern.points });

    let learning = Arc::make_mut(&mut next.learning);
    learning.session_started_at.get_or_insert(ctx.now);
    learning.adaptive = update_adaptive(&learning.adaptive, outcome.valid);

    let progress = &mut learning.progress;
    progress.attempts += 1;
    let n = f64::from(progress.attempts);
    let correct = if outcome.valid { 1.0 } else { 0.0 };
    progress.accuracy = (progress.accuracy * (n - 1.0) + 100.0 * correct) / n;

    let mut completed = Vec::new();
    if outcome.valid {
        progress.total_sentences += 1;
        progress.current_streak += 1;
        progress.best_streak = progress.best_streak.max(progress.current_streak);
        progress.xp += points;
        progress.level = level_for(progress.xp);

        let successes = progress.pattern_successes.entry(pattern.id.clone()).or_insert(0);
        *successes += 1;
        if *successes >= MASTERY_THRESHOLD && !progress.mastered_patterns.contains(&pattern.id) {
            progress.mastered_patterns.push(pattern.id.clone());
        }

        completed = learning.current_sentence.clone();
        archive_current(learning, ctx.now);
        refresh_metrics(learning, ctx.now);
    } else {
        progress.current_streak = 0;
    }
    learning.last_validation = Some(outcome.clone());
    let progress_payload = json!(learning.progress);

    let offline = Arc::make_mut(&mut next.offline);
    if outcome.valid {
        Arc::make_mut(&mut next.gamification).score += points;
        let words: Vec<_> = completed
            .iter()
            .map(|w| json!({ "word": w.word, "part": w.part }))
            .collect();
        offline.queue.enqueue(
            OperationKind::CompleteSentence,
            json!({ "pattern": pattern.id, "words": words }),
            ctx.now,
        );
    }
    offline.queue.enqueue(OperationKind::ProgressUpdate, progress_payload, ctx.now);

    let ids: Vec<String> = evaluate(next).into_iter().map(String::from).collect();
    Ok(apply_unlocks(next, &ids, ctx))
}

/// Merge unlocks into the snapshot: record + reward, queue, and open the
/// achievement modal. Returns the ids that were actually new.
fn apply_unlocks(next: &mut Snapshot, ids: &[String], ctx: &ReduceContext) -> Vec<String> {
    let fresh: Vec<String> = ids
        .iter()
        .filter(|id| !next.gamification.achievements.contains(id))
        .cloned()
        .collect();
    if fresh.is_empty() {
        return fresh;
    }

    let gamification = Arc::make_mut(&mut next.gamification);
    for id in &fresh {
        unlock(gamification, id, ctx.now, ctx.recent_limit);
    }

    let offline = Arc::make_mut(&mut next.offline);
    for id in &fresh {
        offline
            .queue
            .enqueue(OperationKind::AchievementUnlock, json!({ "id": id }), ctx.now);
    }

    let ui = Arc::make_mut(&mut next.ui);
    ui.achievement_modal = true;
    ui.celebrating = true;
    fresh
}

fn update_challenge(
    next: &mut Snapshot,
    id: &str,
    progress: u32,
    ctx: &ReduceContext,
) -> Result<(), ValidationError> {
    let idx = next
        .gamification
        .challenges
        .active
        .iter()
        .position(|c| c.id == id)
        .ok_or_else(|| ValidationError::ChallengeNotActive(id.to_string()))?;
    let progress = progress.min(100);

    let gamification = Arc::make_mut(&mut next.gamification);
    if progress < 100 {
        gamification.challenges.active[idx].progress = progress;
        return Ok(());
    }

    let mut challenge = gamification.challenges.active.remove(idx);
    challenge.progress = 100;
    challenge.completed_at = Some(ctx.now);
    gamification.challenges.completed.push(challenge);

    if let Some(def) = challenge_def(id) {
        gamification.score += def.points;
        let learning = Arc::make_mut(&mut next.learning);
        learning.progress.xp += def.xp;
        learning.progress.level = level_for(learning.progress.xp);
    }
    Ok(())
}

fn check_pattern(pattern: &Pattern) -> Result<(), ValidationError> {
    if !is_valid_identifier(&pattern.id) {
        return Err(ValidationError::InvalidIdentifier(pattern.id.clone()));
    }
    if pattern.structure.is_empty() {
        return Err(ValidationError::EmptyPattern(pattern.id.clone()));
    }
    Ok(())
}

fn require_syncing(snapshot: &Snapshot) -> Result<(), ValidationError> {
    if snapshot.offline.sync_status == SyncStatus::Syncing {
        Ok(())
    } else {
        Err(ValidationError::NotSyncing)
    }
}

/// Move the sentence under construction into the session archive
fn archive_current(learning: &mut LearningState, now: DateTime<Utc>) {
    let words = std::mem::take(&mut learning.current_sentence);
    learning.session_sentences.push(crate::types::ArchivedSentence {
        words,
        pattern: learning.current_pattern.clone(),
        archived_at: now,
    });
}

/// Words per minute and vocabulary size over the archived session
fn refresh_metrics(learning: &mut LearningState, now: DateTime<Utc>) {
    let word_count: usize = learning.session_sentences.iter().map(|s| s.words.len()).sum();
    if let Some(start) = learning.session_started_at {
        let minutes = (now - start).num_milliseconds() as f64 / 60_000.0;
        if minutes > 0.0 {
            learning.metrics.words_per_minute = (word_count as f64 / minutes).round() as u32;
        }
    }

    let vocabulary: HashSet<String> = learning
        .session_sentences
        .iter()
        .flat_map(|s| s.words.iter())
        .map(|w| w.word.to_lowercase())
        .collect();
    learning.metrics.vocabulary_size = vocabulary.len();
}

fn level_for(xp: u64) -> u32 {
    1 + (xp / XP_PER_LEVEL) as u32
}

/// Preferences derived from onboarding answers
fn personalize(prefs: &mut Preferences, responses: &OnboardingResponses) {
    let (theme, font_size) = match responses.age {
        0..=8 => ("colorful", "large"),
        9..=12 => ("modern", "medium"),
        _ => ("professional", "small"),
    };
    prefs.theme = theme.to_string();
    prefs.font_size = font_size.to_string();

    prefs.difficulty = match responses.skill_level.as_str() {
        "beginner" => "fixed-easy",
        "intermediate" => "progressive",
        _ => "adaptive",
    }
    .to_string();

    match responses.learning_style.as_str() {
        "visual" => prefs.animations = true,
        "auditory" => {
            prefs.sound_enabled = true;
            prefs.read_aloud = true;
        }
        _ => {}
    }
}

/// Back to a fresh profile. Preferences, device id, loaded content and the
/// offline queue survive: unsynced work is never dropped.
fn reset_snapshot(state: &Snapshot) -> Snapshot {
    let mut fresh = Snapshot::initial(state.user.device_id);
    Arc::make_mut(&mut fresh.user).preferences = state.user.preferences.clone();
    fresh.content = Arc::clone(&state.content);
    fresh.offline = Arc::clone(&state.offline);
    fresh
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::types::{PatternTable, PreferencesPatch};
    use uuid::Uuid;

    use PartOfSpeech::{Article, Subject, Verb};

    fn simple_pattern() -> Pattern {
        Pattern {
            id: "simple".to_string(),
            name: "Simple Sentence".to_string(),
            structure: vec![Article, Subject, Verb],
            example: "The cat sleeps.".to_string(),
            points: 10,
        }
    }

    fn base() -> Snapshot {
        let mut snap = Snapshot::initial(Uuid::new_v4());
        let mut table = PatternTable::new();
        table.insert("simple".to_string(), simple_pattern());
        Arc::make_mut(&mut snap.content).patterns = table;
        snap
    }

    fn ctx() -> ReduceContext {
        ReduceContext::at(Utc::now())
    }

    fn apply(state: &Snapshot, action: Action) -> Snapshot {
        reduce(state, &action, &ctx()).unwrap().snapshot
    }

    fn with_words(state: &Snapshot, words: &[(&str, PartOfSpeech)]) -> Snapshot {
        words.iter().fold(state.clone(), |s, (w, p)| {
            apply(&s, Action::AddWord { word: w.to_string(), part: *p })
        })
    }

    #[test]
    fn test_validate_success() {
        let s = with_words(&base(), &[("The", Article), ("cat", Subject), ("sleeps", Verb)]);
        let t = reduce(&s, &Action::ValidateSentence, &ctx()).unwrap();
        let next = t.snapshot;

        assert_eq!(next.learning.progress.total_sentences, 1);
        assert_eq!(next.learning.progress.current_streak, 1);
        assert_eq!(next.learning.progress.xp, 10);
        assert_eq!(next.gamification.score, 10);
        assert!(next.learning.current_sentence.is_empty());
        assert_eq!(next.learning.session_sentences.len(), 1);
        assert!(next.learning.last_validation.as_ref().unwrap().valid);
        assert!(next.learning.adaptive.confidence > 0.5);
    }

    #[test]
    fn test_validate_failure_keeps_sentence() {
        let s = with_words(&base(), &[("The", Article), ("sleeps", Verb)]);
        let s = {
            let mut s = s;
            Arc::make_mut(&mut s.learning).progress.current_streak = 3;
            s
        };
        let next = apply(&s, Action::ValidateSentence);

        assert_eq!(next.learning.progress.current_streak, 0);
        assert_eq!(next.learning.progress.total_sentences, 0);
        assert_eq!(next.learning.current_sentence, s.learning.current_sentence);
        let outcome = next.learning.last_validation.clone().unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.errors, vec!["Missing 1 word(s)".to_string()]);
    }

    #[test]
    fn test_validation_error_messages() {
        let p = simple_pattern();
        let too_many = validate_structure(&[Article, Subject, Verb, Verb], &p);
        assert_eq!(too_many.errors, vec!["Too many words (4 vs 3)".to_string()]);

        let mismatch = validate_structure(&[Article, Verb, Subject], &p);
        assert_eq!(mismatch.errors, vec!["Position 2: Expected subject, got verb".to_string()]);

        assert!(validate_structure(&[Article, Subject, Verb], &p).valid);
    }

    #[test]
    fn test_accuracy_three_of_four() {
        let good = [("The", Article), ("cat", Subject), ("sleeps", Verb)];
        let mut s = base();
        for round in 0..4 {
            if round == 2 {
                s = with_words(&s, &[("cat", Subject)]);
                s = apply(&s, Action::ValidateSentence);
                s = apply(&s, Action::ClearSentence);
            } else {
                s = with_words(&s, &good);
                s = apply(&s, Action::ValidateSentence);
            }
        }
        assert_eq!(s.learning.progress.attempts, 4);
        assert!((s.learning.progress.accuracy - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_pattern_rejected() {
        let s = base();
        let err = reduce(&s, &Action::SelectPattern { pattern: "fancy".into() }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownPattern("fancy".into()));

        let mut orphan = s.clone();
        Arc::make_mut(&mut orphan.learning).current_pattern = "gone".to_string();
        let err = reduce(&orphan, &Action::ValidateSentence, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownPattern("gone".into()));
    }

    #[test]
    fn test_untouched_sections_are_shared() {
        let s = base();
        let next = apply(&s, Action::SetActiveView { view: crate::types::View::Dashboard });
        assert!(!Arc::ptr_eq(&s.ui, &next.ui));
        assert!(Arc::ptr_eq(&s.learning, &next.learning));
        assert!(Arc::ptr_eq(&s.gamification, &next.gamification));
        assert!(Arc::ptr_eq(&s.offline, &next.offline));
    }

    #[test]
    fn test_word_edits_enqueue_operations() {
        let s = with_words(&base(), &[("The", Article), ("cat", Subject)]);
        let first_id = s.learning.current_sentence[0].id;
        let s = apply(&s, Action::RemoveWord { id: first_id });

        let kinds: Vec<OperationKind> = s.offline.queue.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::AddWord, OperationKind::AddWord, OperationKind::RemoveWord]
        );
        assert_eq!(s.learning.current_sentence.len(), 1);

        let err = reduce(&s, &Action::RemoveWord { id: 999 }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownWord(999));
    }

    #[test]
    fn test_blank_word_rejected() {
        let err = reduce(&base(), &Action::AddWord { word: "  ".into(), part: Verb }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyWord);
    }

    #[test]
    fn test_successful_validation_enqueues_sentence_and_progress() {
        let s = with_words(&base(), &[("The", Article), ("cat", Subject), ("sleeps", Verb)]);
        let before = s.offline.queue.len();
        let next = apply(&s, Action::ValidateSentence);
        let tail: Vec<OperationKind> = next.offline.queue.iter().skip(before).map(|op| op.kind).collect();
        assert_eq!(tail, vec![OperationKind::CompleteSentence, OperationKind::ProgressUpdate]);
    }

    #[test]
    fn test_streak_five_unlocks_once() {
        let good = [("The", Article), ("cat", Subject), ("sleeps", Verb)];
        let mut s = base();
        let mut all_unlocked = Vec::new();
        for _ in 0..6 {
            s = with_words(&s, &good);
            let t = reduce(&s, &Action::ValidateSentence, &ctx()).unwrap();
            all_unlocked.extend(t.unlocked);
            s = t.snapshot;
        }
        assert_eq!(all_unlocked, vec!["streak_5".to_string()]);
        assert_eq!(s.gamification.score, 60 + 50);
        assert_eq!(s.gamification.coins, 10);
        assert!(s.ui.achievement_modal);
        assert_eq!(
            s.offline.queue.iter().filter(|op| op.kind == OperationKind::AchievementUnlock).count(),
            1
        );
    }

    #[test]
    fn test_manual_unlock_is_idempotent() {
        let s = apply(&base(), Action::UnlockAchievement { id: "first_10".into() });
        let t = reduce(&s, &Action::UnlockAchievement { id: "first_10".into() }, &ctx()).unwrap();
        assert!(t.unlocked.is_empty());
        assert_eq!(t.snapshot.gamification.score, 25);

        let err = reduce(&s, &Action::UnlockAchievement { id: "nope".into() }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownAchievement("nope".into()));
    }

    #[test]
    fn test_challenge_lifecycle() {
        let s = apply(&base(), Action::StartChallenge { id: "daily_easy".into() });
        let err = reduce(&s, &Action::StartChallenge { id: "daily_easy".into() }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::ChallengeAlreadyActive("daily_easy".into()));

        let s = apply(&s, Action::UpdateChallengeProgress { id: "daily_easy".into(), progress: 40 });
        assert_eq!(s.gamification.challenges.active[0].progress, 40);

        let s = apply(&s, Action::UpdateChallengeProgress { id: "daily_easy".into(), progress: 150 });
        assert!(s.gamification.challenges.active.is_empty());
        assert_eq!(s.gamification.challenges.completed[0].progress, 100);
        assert_eq!(s.gamification.score, 25);
        assert_eq!(s.learning.progress.xp, 50);

        let err = reduce(
            &s,
            &Action::UpdateChallengeProgress { id: "daily_easy".into(), progress: 10 },
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::ChallengeNotActive("daily_easy".into()));
    }

    #[test]
    fn test_onboarding_personalizes() {
        let s = apply(
            &base(),
            Action::CompleteOnboarding {
                responses: OnboardingResponses {
                    age: 7,
                    skill_level: "beginner".into(),
                    learning_style: "auditory".into(),
                },
            },
        );
        let prefs = &s.user.preferences;
        assert_eq!(prefs.theme, "colorful");
        assert_eq!(prefs.font_size, "large");
        assert_eq!(prefs.difficulty, "fixed-easy");
        assert!(prefs.read_aloud);
        assert!(s.user.onboarding.completed);
    }

    #[test]
    fn test_sync_bookkeeping_guards() {
        let s = with_words(&base(), &[("The", Article), ("cat", Subject)]);

        let err = reduce(&s, &Action::OperationAcked { id: 1 }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::NotSyncing);

        let syncing = apply(&s, Action::BeginSync);
        let err = reduce(&syncing, &Action::BeginSync, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::SyncAlreadyInProgress);

        let err = reduce(&syncing, &Action::OperationAcked { id: 2 }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::NotQueueHead(2));

        let acked = apply(&syncing, Action::OperationAcked { id: 1 });
        assert_eq!(acked.offline.queue.ids(), vec![2]);

        let failed = apply(&acked, Action::SyncFailed { id: Some(2), error: "boom".into() });
        assert_eq!(failed.offline.sync_status, SyncStatus::Error);
        assert_eq!(failed.offline.queue.front().unwrap().attempts, 1);

        // Error re-enters syncing on the next trigger
        let again = apply(&failed, Action::BeginSync);
        assert_eq!(again.offline.sync_status, SyncStatus::Syncing);
    }

    #[test]
    fn test_begin_sync_offline_rejected() {
        let s = apply(&base(), Action::SetOnline { online: false });
        let err = reduce(&s, &Action::BeginSync, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::Offline);

        let t = reduce(&s, &Action::SetOnline { online: true }, &ctx()).unwrap();
        assert!(t.connectivity_restored);
        let t = reduce(&t.snapshot, &Action::SetOnline { online: true }, &ctx()).unwrap();
        assert!(!t.connectivity_restored);
    }

    #[test]
    fn test_generation_credits() {
        let mut s = base();
        Arc::make_mut(&mut s.content).generated.credits = 1;
        let s = apply(&s, Action::GenerationStarted { key: "space-basic".into() });
        let s = apply(
            &s,
            Action::GenerationCompleted { key: "space-basic".into(), content: Default::default() },
        );
        assert_eq!(s.content.generated.credits, 0);
        assert!(s.content.generated.entries.contains_key("space-basic"));

        let err = reduce(&s, &Action::GenerationStarted { key: "ocean-basic".into() }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::NoCredits);

        // A cached key needs no credit
        assert!(reduce(&s, &Action::GenerationStarted { key: "space-basic".into() }, &ctx()).is_ok());
    }

    #[test]
    fn test_reset_preserves_preferences_and_queue() {
        let s = with_words(&base(), &[("The", Article)]);
        let s = apply(&s, Action::UpdatePreferences {
            patch: PreferencesPatch { theme: Some("dark".into()), ..Default::default() },
        });
        let reset = apply(&s, Action::Reset);
        assert_eq!(reset.user.preferences.theme, "dark");
        assert_eq!(reset.user.device_id, s.user.device_id);
        assert!(reset.learning.current_sentence.is_empty());
        assert_eq!(reset.offline.queue.len(), 1);
        assert!(Arc::ptr_eq(&reset.content, &s.content));
    }

    #[test]
    fn test_custom_pattern_validation() {
        let mut p = simple_pattern();
        p.id = "../bad".into();
        let err = reduce(&base(), &Action::AddCustomPattern { pattern: p }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidIdentifier("../bad".into()));

        let mut p = simple_pattern();
        p.id = "mine".into();
        p.structure.clear();
        let err = reduce(&base(), &Action::AddCustomPattern { pattern: p }, &ctx()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyPattern("mine".into()));
    }

    #[test]
    fn test_toggle_favorite() {
        let s = apply(&base(), Action::ToggleFavorite { word: "cat".into() });
        assert_eq!(s.content.favorites, vec!["cat".to_string()]);
        let s = apply(&s, Action::ToggleFavorite { word: "cat".into() });
        assert!(s.content.favorites.is_empty());
    }
}
