//! Integration tests for undo/redo through the store
//!
//! Only learning and gamification are versioned; the offline queue, content
//! and UI ride along untouched.

use pretty_assertions::assert_eq;
use uuid::Uuid;

use sentence_engine::core::{StaticContent, Store, StoreOptions};
use sentence_engine::types::{Action, OperationKind, PartOfSpeech, Snapshot, View};

fn store_with(options: StoreOptions) -> Store {
    let store = Store::with_options(Snapshot::initial(Uuid::new_v4()), options);
    store
        .dispatch(Action::ContentLoaded {
            word_banks: None,
            patterns: Some(StaticContent::patterns()),
        })
        .unwrap();
    store
}

fn add(store: &Store, word: &str, part: PartOfSpeech) -> Snapshot {
    store
        .dispatch(Action::AddWord { word: word.to_string(), part })
        .unwrap()
}

fn words(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .learning
        .current_sentence
        .iter()
        .map(|w| w.word.clone())
        .collect()
}

#[test]
fn test_fresh_store_has_nothing_to_undo() {
    let store = store_with(StoreOptions::default());
    assert!(!store.can_undo());
    assert!(!store.can_redo());
    assert!(store.undo().is_none());
    assert!(store.redo().is_none());
}

#[test]
fn test_undo_redo_walks_the_sentence() {
    let store = store_with(StoreOptions::default());
    add(&store, "The", PartOfSpeech::Article);
    add(&store, "cat", PartOfSpeech::Subject);
    add(&store, "sleeps", PartOfSpeech::Verb);

    assert_eq!(words(&store.undo().unwrap()), vec!["The", "cat"]);
    assert_eq!(words(&store.undo().unwrap()), vec!["The"]);
    assert!(store.can_redo());
    assert_eq!(words(&store.redo().unwrap()), vec!["The", "cat"]);
    assert_eq!(words(&store.get_snapshot()), vec!["The", "cat"]);
}

/// Undo restores the slice; queued operations are never taken back
#[test]
fn test_undo_keeps_offline_queue() {
    let store = store_with(StoreOptions::default());
    add(&store, "The", PartOfSpeech::Article);
    let queued = add(&store, "cat", PartOfSpeech::Subject).offline.queue.len();

    let restored = store.undo().unwrap();
    assert_eq!(words(&restored), vec!["The"]);
    assert_eq!(restored.offline.queue.len(), queued);
}

#[test]
fn test_ui_changes_are_not_versioned() {
    let store = store_with(StoreOptions::default());
    add(&store, "The", PartOfSpeech::Article);
    store.dispatch(Action::SetActiveView { view: View::Settings }).unwrap();

    // One undo takes back the word, not the view change
    let restored = store.undo().unwrap();
    assert!(restored.learning.current_sentence.is_empty());
    assert_eq!(restored.ui.active_view, View::Settings);
    assert!(!store.can_undo());
}

#[test]
fn test_new_action_after_undo_drops_redo_branch() {
    let store = store_with(StoreOptions::default());
    add(&store, "The", PartOfSpeech::Article);
    add(&store, "cat", PartOfSpeech::Subject);
    store.undo();

    add(&store, "dog", PartOfSpeech::Subject);
    assert!(!store.can_redo());
    assert_eq!(words(&store.get_snapshot()), vec!["The", "dog"]);
}

/// Past the limit the oldest entries fall away
#[test]
fn test_undo_limit_is_respected() {
    let store = store_with(StoreOptions { undo_limit: 3, ..StoreOptions::default() });
    for word in ["a", "b", "c", "d", "e"] {
        add(&store, word, PartOfSpeech::Subject);
    }

    let mut steps = 0;
    while store.undo().is_some() {
        steps += 1;
    }
    assert_eq!(steps, 2);
    assert_eq!(words(&store.get_snapshot()), vec!["a", "b", "c"]);
}

#[test]
fn test_undo_reverts_validation_rewards() {
    let store = store_with(StoreOptions::default());
    add(&store, "The", PartOfSpeech::Article);
    add(&store, "cat", PartOfSpeech::Subject);
    add(&store, "sleeps", PartOfSpeech::Verb);
    let validated = store.dispatch(Action::ValidateSentence).unwrap();
    assert_eq!(validated.gamification.score, 10);

    let restored = store.undo().unwrap();
    assert_eq!(restored.gamification.score, 0);
    assert_eq!(restored.learning.progress.total_sentences, 0);
    assert_eq!(words(&restored), vec!["The", "cat", "sleeps"]);
}

/// Stepping back past an unlock keeps the achievement, so it cannot be
/// awarded or queued a second time
#[test]
fn test_undo_past_unlock_does_not_retrigger() {
    let store = store_with(StoreOptions::default());
    let mut events = store.events();
    add(&store, "The", PartOfSpeech::Article);
    let unlocked = store
        .dispatch(Action::UnlockAchievement { id: "streak_5".to_string() })
        .unwrap();
    assert_eq!(unlocked.gamification.score, 50);

    let restored = store.undo().unwrap();
    assert!(restored.gamification.achievements.contains("streak_5"));
    assert_eq!(restored.gamification.score, 50);

    let again = store
        .dispatch(Action::UnlockAchievement { id: "streak_5".to_string() })
        .unwrap();
    assert_eq!(again.gamification.score, 50);
    assert_eq!(again.gamification.achievements.unlocked.len(), 1);
    let unlock_ops = again
        .offline
        .queue
        .iter()
        .filter(|op| op.kind == OperationKind::AchievementUnlock)
        .count();
    assert_eq!(unlock_ops, 1);

    assert!(events.try_recv().is_ok());
    assert!(events.try_recv().is_err(), "no second unlock event");
}
