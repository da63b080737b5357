//! Actions: the closed set of mutations the store accepts

use serde::{Deserialize, Serialize};

use crate::types::{
    Feedback, GeneratedContent, OnboardingResponses, PartOfSpeech, Pattern, PatternTable,
    PreferencesPatch, UserProfile, View, WordBankTable,
};

/// Every state transition goes through one of these variants.
/// Wire format: `{"type": "add_word", "word": "cat", "part": "subject"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    // User
    SetProfile { profile: UserProfile },
    UpdatePreferences { patch: PreferencesPatch },
    CompleteOnboarding { responses: OnboardingResponses },

    // Learning
    AddWord { word: String, part: PartOfSpeech },
    RemoveWord { id: u64 },
    SelectPattern { pattern: String },
    ValidateSentence,
    ClearSentence,

    // Content customizations
    ToggleFavorite { word: String },
    AddCustomPattern { pattern: Pattern },

    // Gamification
    UnlockAchievement { id: String },
    StartChallenge { id: String },
    UpdateChallengeProgress { id: String, progress: u32 },

    // Content collaborator results
    ContentLoaded {
        word_banks: Option<WordBankTable>,
        patterns: Option<PatternTable>,
    },
    GenerationStarted { key: String },
    GenerationCompleted { key: String, content: GeneratedContent },
    GenerationFailed { key: String },

    // Connectivity and sync bookkeeping
    SetOnline { online: bool },
    BeginSync,
    OperationAcked { id: u64 },
    OperationDiscarded { id: u64, reason: String },
    SyncFailed { id: Option<u64>, error: String },
    SyncSucceeded,

    // UI
    SetActiveView { view: View },
    ShowFeedback { feedback: Feedback },
    DismissFeedback,
    DismissAchievement,

    Reset,
}

impl Action {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetProfile { .. } => "set_profile",
            Action::UpdatePreferences { .. } => "update_preferences",
            Action::CompleteOnboarding { .. } => "complete_onboarding",
            Action::AddWord { .. } => "add_word",
            Action::RemoveWord { .. } => "remove_word",
            Action::SelectPattern { .. } => "select_pattern",
            Action::ValidateSentence => "validate_sentence",
            Action::ClearSentence => "clear_sentence",
            Action::ToggleFavorite { .. } => "toggle_favorite",
            Action::AddCustomPattern { .. } => "add_custom_pattern",
            Action::UnlockAchievement { .. } => "unlock_achievement",
            Action::StartChallenge { .. } => "start_challenge",
            Action::UpdateChallengeProgress { .. } => "update_challenge_progress",
            Action::ContentLoaded { .. } => "content_loaded",
            Action::GenerationStarted { .. } => "generation_started",
            Action::GenerationCompleted { .. } => "generation_completed",
            Action::GenerationFailed { .. } => "generation_failed",
            Action::SetOnline { .. } => "set_online",
            Action::BeginSync => "begin_sync",
            Action::OperationAcked { .. } => "operation_acked",
            Action::OperationDiscarded { .. } => "operation_discarded",
            Action::SyncFailed { .. } => "sync_failed",
            Action::SyncSucceeded => "sync_succeeded",
            Action::SetActiveView { .. } => "set_active_view",
            Action::ShowFeedback { .. } => "show_feedback",
            Action::DismissFeedback => "dismiss_feedback",
            Action::DismissAchievement => "dismiss_achievement",
            Action::Reset => "reset",
        }
    }

    /// Queue bookkeeping only the sync coordinator may issue
    pub fn is_sync_bookkeeping(&self) -> bool {
        matches!(
            self,
            Action::BeginSync
                | Action::OperationAcked { .. }
                | Action::OperationDiscarded { .. }
                | Action::SyncFailed { .. }
                | Action::SyncSucceeded
        )
    }

    /// Whether a UI client may send this over the API. Collaborator results
    /// and sync bookkeeping come from inside the engine only.
    pub fn is_ui_action(&self) -> bool {
        !self.is_sync_bookkeeping()
            && !matches!(
                self,
                Action::ContentLoaded { .. }
                    | Action::GenerationStarted { .. }
                    | Action::GenerationCompleted { .. }
                    | Action::GenerationFailed { .. }
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let action: Action =
            serde_json::from_str(r#"{"type":"add_word","word":"cat","part":"subject"}"#).unwrap();
        assert_eq!(
            action,
            Action::AddWord { word: "cat".to_string(), part: PartOfSpeech::Subject }
        );

        let unit: Action = serde_json::from_str(r#"{"type":"validate_sentence"}"#).unwrap();
        assert_eq!(unit, Action::ValidateSentence);
    }

    #[test]
    fn test_unknown_action_is_rejected_by_decoder() {
        let result: Result<Action, _> = serde_json::from_str(r#"{"type":"teleport"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_only_variants() {
        assert!(Action::BeginSync.is_sync_bookkeeping());
        assert!(!Action::BeginSync.is_ui_action());
        assert!(!Action::GenerationFailed { key: "space-basic".into() }.is_ui_action());
        assert!(!Action::ContentLoaded { word_banks: None, patterns: None }.is_sync_bookkeeping());
        assert!(Action::SetOnline { online: false }.is_ui_action());
        assert!(Action::ValidateSentence.is_ui_action());
    }

    #[test]
    fn test_name_matches_wire_tag() {
        let action = Action::SetOnline { online: true };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], action.name());
    }
}
