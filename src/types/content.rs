//! Content tables: parts of speech, sentence patterns, word banks

use std::collections::BTreeMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref RE_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,63}$").unwrap();
}

/// Grammatical role of a word in a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Article,
    Subject,
    Verb,
    Adjective,
    Object,
    Preposition,
    Place,
    Adverb,
    Conjunction,
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 9] = [
        PartOfSpeech::Article,
        PartOfSpeech::Subject,
        PartOfSpeech::Verb,
        PartOfSpeech::Adjective,
        PartOfSpeech::Object,
        PartOfSpeech::Preposition,
        PartOfSpeech::Place,
        PartOfSpeech::Adverb,
        PartOfSpeech::Conjunction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Article => "article",
            PartOfSpeech::Subject => "subject",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Object => "object",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Place => "place",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Conjunction => "conjunction",
        }
    }

    /// Case-insensitive lookup by tag name
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(tag))
    }
}

impl std::fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named ordered sequence of part-of-speech tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub structure: Vec<PartOfSpeech>,
    pub example: String,
    pub points: u32,
}

/// Patterns keyed by id
pub type PatternTable = BTreeMap<String, Pattern>;

/// Words available for each part of speech at one difficulty level
pub type WordBank = BTreeMap<PartOfSpeech, Vec<String>>;

/// Word banks keyed by difficulty level ("basic", "intermediate", ...)
pub type WordBankTable = BTreeMap<String, WordBank>;

/// Content produced by the generation collaborator for a topic/level pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub sentences: Vec<String>,
    pub words: BTreeMap<PartOfSpeech, Vec<String>>,
}

/// Cache key for generated content
pub fn generation_key(topic: &str, level: &str) -> String {
    format!("{}-{}", topic.trim().to_lowercase(), level.trim().to_lowercase())
}

/// Identifiers for patterns and custom content: a letter followed by
/// up to 63 letters, digits, `_` or `-`
pub fn is_valid_identifier(id: &str) -> bool {
    RE_IDENTIFIER.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_of_speech_parse_is_case_insensitive() {
        assert_eq!(PartOfSpeech::parse("Article"), Some(PartOfSpeech::Article));
        assert_eq!(PartOfSpeech::parse("VERB"), Some(PartOfSpeech::Verb));
        assert_eq!(PartOfSpeech::parse("noun"), None);
    }

    #[test]
    fn test_part_of_speech_serializes_lowercase() {
        let json = serde_json::to_string(&vec![PartOfSpeech::Subject, PartOfSpeech::Place]).unwrap();
        assert_eq!(json, r#"["subject","place"]"#);
    }

    #[test]
    fn test_generation_key_normalizes() {
        assert_eq!(generation_key(" Space ", "Basic"), "space-basic");
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_valid_identifier("simple"));
        assert!(is_valid_identifier("withAdjective"));
        assert!(is_valid_identifier("daily_easy"));
        assert!(!is_valid_identifier("9lives"));
        assert!(!is_valid_identifier("../etc"));
        assert!(!is_valid_identifier(""));
    }
}
