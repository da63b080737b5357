//! Achievement evaluator
//!
//! `evaluate` is pure: it inspects a snapshot and lists ids whose rule holds
//! and that are not unlocked yet. Merging the result (record, reward, queue,
//! notification) is the reducer's job via `unlock`.

use chrono::{DateTime, Utc};

use crate::types::{achievement_def, AchievementRecord, GamificationState, Progress, Snapshot};

/// Threshold predicate over learning progress
struct AchievementRule {
    id: &'static str,
    holds: fn(&Progress) -> bool,
}

fn streak_5(p: &Progress) -> bool {
    p.current_streak >= 5
}

fn streak_10(p: &Progress) -> bool {
    p.current_streak >= 10
}

fn first_10(p: &Progress) -> bool {
    p.total_sentences >= 10
}

fn century(p: &Progress) -> bool {
    p.total_sentences >= 100
}

fn accuracy_master(p: &Progress) -> bool {
    p.accuracy >= 95.0 && p.attempts >= 20
}

const RULES: &[AchievementRule] = &[
    AchievementRule { id: "streak_5", holds: streak_5 },
    AchievementRule { id: "streak_10", holds: streak_10 },
    AchievementRule { id: "first_10", holds: first_10 },
    AchievementRule { id: "century", holds: century },
    AchievementRule { id: "accuracy_master", holds: accuracy_master },
];

/// Newly unlockable achievement ids, in rule order
pub fn evaluate(snapshot: &Snapshot) -> Vec<&'static str> {
    let progress = &snapshot.learning.progress;
    let log = &snapshot.gamification.achievements;
    RULES
        .iter()
        .filter(|rule| !log.contains(rule.id) && (rule.holds)(progress))
        .map(|rule| rule.id)
        .collect()
}

/// Record an unlock and apply its reward in one step.
/// Returns false (and changes nothing) when the id is already unlocked.
pub fn unlock(
    gamification: &mut GamificationState,
    id: &str,
    now: DateTime<Utc>,
    recent_limit: usize,
) -> bool {
    if gamification.achievements.contains(id) {
        return false;
    }

    let record = AchievementRecord { id: id.to_string(), unlocked_at: now };
    gamification.achievements.unlocked.push(record.clone());
    gamification.achievements.recent.push_front(record);
    gamification.achievements.recent.truncate(recent_limit);

    if let Some(def) = achievement_def(id) {
        gamification.score += def.points;
        gamification.coins += def.coins;
        gamification.gems += def.gems;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn snapshot_with(progress: Progress) -> Snapshot {
        let mut snap = Snapshot::initial(Uuid::new_v4());
        Arc::make_mut(&mut snap.learning).progress = progress;
        snap
    }

    #[test]
    fn test_nothing_on_fresh_profile() {
        assert!(evaluate(&Snapshot::initial(Uuid::new_v4())).is_empty());
    }

    #[test]
    fn test_streak_and_count_thresholds() {
        let snap = snapshot_with(Progress {
            current_streak: 10,
            total_sentences: 10,
            attempts: 12,
            accuracy: 83.0,
            ..Progress::default()
        });
        assert_eq!(evaluate(&snap), vec!["streak_5", "streak_10", "first_10"]);
    }

    #[test]
    fn test_accuracy_master_needs_twenty_attempts() {
        let snap = snapshot_with(Progress { accuracy: 100.0, attempts: 19, ..Progress::default() });
        assert!(!evaluate(&snap).contains(&"accuracy_master"));

        let snap = snapshot_with(Progress { accuracy: 95.0, attempts: 20, ..Progress::default() });
        assert!(evaluate(&snap).contains(&"accuracy_master"));
    }

    #[test]
    fn test_evaluate_after_apply_is_empty() {
        let mut snap = snapshot_with(Progress {
            current_streak: 5,
            total_sentences: 100,
            ..Progress::default()
        });
        let ids = evaluate(&snap);
        assert!(!ids.is_empty());

        let now = Utc::now();
        let g = Arc::make_mut(&mut snap.gamification);
        for id in &ids {
            assert!(unlock(g, id, now, 10));
        }
        assert!(evaluate(&snap).is_empty());
    }

    #[test]
    fn test_unlock_is_idempotent_and_rewards_once() {
        let mut g = GamificationState::default();
        let now = Utc::now();
        assert!(unlock(&mut g, "century", now, 10));
        assert!(!unlock(&mut g, "century", now, 10));
        assert_eq!(g.score, 500);
        assert_eq!(g.coins, 100);
        assert_eq!(g.gems, 5);
        assert_eq!(g.achievements.unlocked.len(), 1);
    }

    #[test]
    fn test_recent_list_is_bounded_newest_first() {
        let mut g = GamificationState::default();
        let now = Utc::now();
        for id in ["streak_5", "streak_10", "first_10"] {
            unlock(&mut g, id, now, 2);
        }
        let recent: Vec<&str> = g.achievements.recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(recent, vec!["first_10", "streak_10"]);
        assert_eq!(g.achievements.unlocked.len(), 3);
    }
}
