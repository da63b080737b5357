//! Content collaborator and loader
//!
//! `ContentSource` supplies word banks, patterns and generated content.
//! `StaticContent` is the built-in source. `ContentLoader` moves source results
//! into the store and the `content-cache` namespace; when the source fails it
//! keeps whatever is already cached.

use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::persistence::{ContentCache, PersistenceAdapter, KEY_CONTENT};
use crate::core::store::Store;
use crate::types::{
    generation_key, Action, ContentError, Feedback, FeedbackKind, GeneratedContent, PartOfSpeech,
    Pattern, PatternTable, StoreError, WordBank, WordBankTable,
};

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_word_banks(&self) -> Result<WordBankTable, ContentError>;
    async fn fetch_patterns(&self) -> Result<PatternTable, ContentError>;
    async fn generate_content(&self, topic: &str, level: &str) -> Result<GeneratedContent, ContentError>;
}

// =============================================================================
// BUILT-IN TABLES
// =============================================================================

/// Tables compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContent;

impl StaticContent {
    pub fn patterns() -> PatternTable {
        use PartOfSpeech::*;

        let table = [
            ("simple", "Simple Sentence", vec![Article, Subject, Verb], "The cat sleeps.", 10),
            (
                "withAdjective",
                "With Describing Word",
                vec![Article, Adjective, Subject, Verb],
                "The happy dog plays.",
                15,
            ),
            (
                "withObject",
                "Action + Thing",
                vec![Article, Subject, Verb, Article, Object],
                "The girl reads a book.",
                20,
            ),
            (
                "withAdverb",
                "How It Happens",
                vec![Article, Subject, Verb, Adverb],
                "The bird sings beautifully.",
                25,
            ),
            (
                "withPlace",
                "Where It Happens",
                vec![Article, Subject, Verb, Preposition, Article, Place],
                "The bird sings in the tree.",
                30,
            ),
            (
                "complete",
                "Full Sentence",
                vec![Article, Adjective, Subject, Verb, Article, Object, Preposition, Article, Place],
                "The happy girl reads a book in the garden.",
                40,
            ),
            (
                "compound",
                "Two Actions",
                vec![Article, Subject, Verb, Conjunction, Verb],
                "The student reads and writes.",
                35,
            ),
        ];

        table
            .into_iter()
            .map(|(id, name, structure, example, points)| {
                (
                    id.to_string(),
                    Pattern {
                        id: id.to_string(),
                        name: name.to_string(),
                        structure,
                        example: example.to_string(),
                        points,
                    },
                )
            })
            .collect()
    }

    pub fn word_banks() -> WordBankTable {
        use PartOfSpeech::*;

        let mut basic = WordBank::new();
        basic.insert(Article, words(&["The", "A", "An"]));
        basic.insert(Subject, words(&["cat", "dog", "girl", "boy", "bird", "teacher", "rabbit", "elephant"]));
        basic.insert(Verb, words(&["runs", "jumps", "eats", "sleeps", "plays", "reads", "sings", "walks"]));
        basic.insert(Adjective, words(&["happy", "big", "small", "red", "funny", "sleepy", "hungry", "quick"]));
        basic.insert(Object, words(&["ball", "book", "apple", "game", "song", "story", "food", "toy"]));
        basic.insert(Preposition, words(&["in", "on", "under", "with", "near", "behind", "above", "beside"]));
        basic.insert(Place, words(&["park", "house", "school", "garden", "tree", "bed", "table", "yard"]));

        let mut intermediate = WordBank::new();
        intermediate.insert(Article, words(&["The", "A", "An", "This", "That", "These", "Those"]));
        intermediate.insert(Subject, words(&["student", "scientist", "athlete", "musician", "family", "team"]));
        intermediate.insert(Verb, words(&["creates", "discovers", "explores", "practices", "performs", "studies"]));
        intermediate.insert(Adjective, words(&["creative", "curious", "talented", "dedicated", "careful", "brave"]));
        intermediate.insert(Object, words(&["experiment", "project", "instrument", "discovery", "solution"]));
        intermediate.insert(Preposition, words(&["through", "between", "during", "before", "after", "towards"]));
        intermediate.insert(Place, words(&["laboratory", "stadium", "theater", "museum", "library", "studio"]));
        intermediate.insert(Adverb, words(&["quickly", "carefully", "happily", "quietly", "slowly", "gracefully"]));
        intermediate.insert(Conjunction, words(&["and", "or", "but"]));

        let mut banks = WordBankTable::new();
        banks.insert("basic".to_string(), basic);
        banks.insert("intermediate".to_string(), intermediate);
        banks
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

#[async_trait]
impl ContentSource for StaticContent {
    async fn fetch_word_banks(&self) -> Result<WordBankTable, ContentError> {
        Ok(Self::word_banks())
    }

    async fn fetch_patterns(&self) -> Result<PatternTable, ContentError> {
        Ok(Self::patterns())
    }

    async fn generate_content(&self, topic: &str, _level: &str) -> Result<GeneratedContent, ContentError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ContentError::Source("topic must not be empty".to_string()));
        }
        let mut words = BTreeMap::new();
        words.insert(PartOfSpeech::Subject, vec![topic.to_string()]);
        words.insert(PartOfSpeech::Verb, vec!["explores".to_string(), "discovers".to_string()]);
        words.insert(PartOfSpeech::Adjective, vec!["amazing".to_string(), "wonderful".to_string()]);
        Ok(GeneratedContent {
            sentences: vec![
                format!("The {} is interesting", topic),
                format!("A {} can be fun", topic),
            ],
            words,
        })
    }
}

// =============================================================================
// LOADER
// =============================================================================

pub struct ContentLoader {
    store: Arc<Store>,
    source: Arc<dyn ContentSource>,
    persistence: Arc<PersistenceAdapter>,
    /// One generation request at a time; a caller that waited finds the
    /// earlier result in the cache
    generating: Mutex<()>,
}

impl ContentLoader {
    pub fn new(store: Arc<Store>, source: Arc<dyn ContentSource>, persistence: Arc<PersistenceAdapter>) -> Self {
        Self { store, source, persistence, generating: Mutex::new(()) }
    }

    /// Refresh word banks and patterns. Errors only when the source failed
    /// and nothing usable is cached.
    pub async fn load(&self) -> Result<(), ContentError> {
        let snapshot = self.store.get_snapshot();
        let cached = snapshot.content.patterns_loaded;
        if !snapshot.offline.is_online {
            return if cached {
                Ok(())
            } else {
                Err(ContentError::Unavailable("offline with no cached content".to_string()))
            };
        }

        let banks = self.source.fetch_word_banks().await;
        let patterns = self.source.fetch_patterns().await;
        let failure = match (&banks, &patterns) {
            (Err(e), _) | (_, Err(e)) => Some(e.clone()),
            _ => None,
        };

        let loaded = Action::ContentLoaded {
            word_banks: banks.ok(),
            patterns: patterns.ok(),
        };
        match self.store.dispatch(loaded) {
            Ok(snapshot) => self.save_cache(&snapshot).await,
            Err(e) => warn!("could not apply loaded content: {}", e),
        }

        let Some(error) = failure else {
            info!("content loaded");
            return Ok(());
        };
        warn!("content source failed: {}", error);
        self.feedback(FeedbackKind::Warning, "Using saved content");
        if self.store.get_snapshot().content.patterns_loaded {
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Generated content for a topic/level pair, from cache when possible
    pub async fn generate(&self, topic: &str, level: &str) -> Result<GeneratedContent, StoreError> {
        let _turn = self.generating.lock().await;
        let key = generation_key(topic, level);
        if let Some(hit) = self.store.get_snapshot().content.generated.entries.get(&key) {
            debug!(key = %key, "generated content served from cache");
            return Ok(hit.clone());
        }

        self.store.dispatch(Action::GenerationStarted { key: key.clone() })?;
        match self.source.generate_content(topic, level).await {
            Ok(content) => {
                let snapshot = self.store.dispatch(Action::GenerationCompleted {
                    key: key.clone(),
                    content: content.clone(),
                })?;
                self.save_cache(&snapshot).await;
                info!(key = %key, "content generated");
                Ok(content)
            }
            Err(e) => {
                warn!(key = %key, "generation failed: {}", e);
                self.store.dispatch(Action::GenerationFailed { key })?;
                self.feedback(FeedbackKind::Error, "Could not generate content");
                Err(e.into())
            }
        }
    }

    async fn save_cache(&self, snapshot: &crate::types::Snapshot) {
        if let Err(e) = self.persistence.save_json(KEY_CONTENT, &ContentCache::of(snapshot)).await {
            warn!("content cache not saved: {}", e);
        }
    }

    fn feedback(&self, kind: FeedbackKind, message: &str) {
        let _ = self.store.dispatch(Action::ShowFeedback {
            feedback: Feedback::new(kind, message),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_patterns_have_points_and_structure() {
        let patterns = StaticContent::patterns();
        assert_eq!(patterns["simple"].points, 10);
        assert_eq!(
            patterns["simple"].structure,
            vec![PartOfSpeech::Article, PartOfSpeech::Subject, PartOfSpeech::Verb]
        );
        assert!(patterns.values().all(|p| !p.structure.is_empty()));
        assert!(patterns.keys().all(|id| crate::types::is_valid_identifier(id)));
    }

    #[test]
    fn test_static_word_banks_cover_basic_parts() {
        let banks = StaticContent::word_banks();
        let basic = &banks["basic"];
        assert!(basic[&PartOfSpeech::Article].contains(&"The".to_string()));
        assert!(basic.contains_key(&PartOfSpeech::Place));
    }

    #[tokio::test]
    async fn test_static_generation() {
        let content = StaticContent.generate_content("space", "basic").await.unwrap();
        assert_eq!(content.sentences[0], "The space is interesting");
        assert!(StaticContent.generate_content("  ", "basic").await.is_err());
    }

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;
    use crate::GENERATION_CREDITS;
    use crate::types::Snapshot;

    #[derive(Default)]
    struct TestSource {
        fail_tables: bool,
        fail_generate: bool,
        delay: Duration,
        generated: AtomicUsize,
    }

    #[async_trait]
    impl ContentSource for TestSource {
        async fn fetch_word_banks(&self) -> Result<WordBankTable, ContentError> {
            if self.fail_tables {
                return Err(ContentError::Source("server down".to_string()));
            }
            Ok(StaticContent::word_banks())
        }

        async fn fetch_patterns(&self) -> Result<PatternTable, ContentError> {
            if self.fail_tables {
                return Err(ContentError::Source("server down".to_string()));
            }
            Ok(StaticContent::patterns())
        }

        async fn generate_content(&self, topic: &str, level: &str) -> Result<GeneratedContent, ContentError> {
            self.generated.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_generate {
                return Err(ContentError::Source("model offline".to_string()));
            }
            StaticContent.generate_content(topic, level).await
        }
    }

    fn loader(source: TestSource) -> (ContentLoader, Arc<Store>, Arc<TestSource>) {
        let store = Arc::new(Store::new(Snapshot::initial(Uuid::new_v4())));
        let source = Arc::new(source);
        let loader = ContentLoader::new(
            Arc::clone(&store),
            Arc::clone(&source) as Arc<dyn ContentSource>,
            Arc::new(PersistenceAdapter::in_memory()),
        );
        (loader, store, source)
    }

    #[tokio::test]
    async fn test_failing_source_keeps_cached_patterns() {
        let (loader, store, _) = loader(TestSource { fail_tables: true, ..TestSource::default() });
        store
            .dispatch(Action::ContentLoaded { word_banks: None, patterns: Some(StaticContent::patterns()) })
            .unwrap();

        assert_eq!(loader.load().await, Ok(()));
        let snap = store.get_snapshot();
        assert_eq!(snap.content.patterns, StaticContent::patterns());
        let feedback = snap.ui.feedback.clone().unwrap();
        assert_eq!(feedback.kind, FeedbackKind::Warning);
        assert_eq!(feedback.message, "Using saved content");
    }

    #[tokio::test]
    async fn test_failing_source_without_cache_errors() {
        let (loader, store, _) = loader(TestSource { fail_tables: true, ..TestSource::default() });
        assert_eq!(loader.load().await, Err(ContentError::Source("server down".to_string())));
        assert!(!store.get_snapshot().content.patterns_loaded);
    }

    #[tokio::test]
    async fn test_offline_with_empty_cache_is_unavailable() {
        let (loader, store, _) = loader(TestSource::default());
        store.dispatch(Action::SetOnline { online: false }).unwrap();

        assert!(matches!(loader.load().await, Err(ContentError::Unavailable(_))));
        // The store keeps working without content
        let snap = store
            .dispatch(Action::AddWord { word: "cat".to_string(), part: PartOfSpeech::Subject })
            .unwrap();
        assert_eq!(snap.learning.current_sentence.len(), 1);
        assert!(!snap.content.patterns_loaded);
    }

    #[tokio::test]
    async fn test_generate_cache_hit_costs_no_credit() {
        let (loader, store, source) = loader(TestSource::default());
        let first = loader.generate("space", "basic").await.unwrap();
        let second = loader.generate("space", "basic").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.generated.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_snapshot().content.generated.credits, GENERATION_CREDITS - 1);
    }

    #[tokio::test]
    async fn test_generate_failure_keeps_credits() {
        let (loader, store, _) = loader(TestSource { fail_generate: true, ..TestSource::default() });
        assert!(loader.generate("space", "basic").await.is_err());

        let snap = store.get_snapshot();
        assert!(snap.content.generated.pending.is_empty());
        assert!(snap.content.generated.entries.is_empty());
        assert_eq!(snap.content.generated.credits, GENERATION_CREDITS);
        assert_eq!(snap.ui.feedback.clone().unwrap().kind, FeedbackKind::Error);
    }

    #[tokio::test]
    async fn test_concurrent_generate_calls_source_once() {
        let (loader, store, source) = loader(TestSource {
            delay: Duration::from_millis(30),
            ..TestSource::default()
        });
        let (a, b) = tokio::join!(loader.generate("space", "basic"), loader.generate("space", "basic"));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.generated.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_snapshot().content.generated.credits, GENERATION_CREDITS - 1);
    }
}
