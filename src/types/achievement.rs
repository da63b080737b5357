//! Achievement and challenge definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unlocked achievement; never removed once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Static description and reward of an achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub points: u64,
    pub coins: u64,
    pub gems: u64,
}

/// Static description and reward of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeDef {
    pub id: &'static str,
    pub name: &'static str,
    pub points: u64,
    pub xp: u64,
}

pub const ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef { id: "streak_5", name: "On Fire!", points: 50, coins: 10, gems: 0 },
    AchievementDef { id: "streak_10", name: "Unstoppable!", points: 100, coins: 25, gems: 0 },
    AchievementDef { id: "first_10", name: "Getting Started", points: 25, coins: 5, gems: 0 },
    AchievementDef { id: "century", name: "Century Club", points: 500, coins: 100, gems: 5 },
    AchievementDef { id: "accuracy_master", name: "Precision Expert", points: 200, coins: 50, gems: 0 },
];

pub const CHALLENGES: &[ChallengeDef] = &[
    ChallengeDef { id: "daily_easy", name: "Daily Easy", points: 25, xp: 50 },
    ChallengeDef { id: "daily_medium", name: "Daily Medium", points: 50, xp: 100 },
    ChallengeDef { id: "daily_hard", name: "Daily Hard", points: 100, xp: 200 },
];

pub fn achievement_def(id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

pub fn challenge_def(id: &str) -> Option<&'static ChallengeDef> {
    CHALLENGES.iter().find(|c| c.id == id)
}
