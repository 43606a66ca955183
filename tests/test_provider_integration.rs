//! End-to-end queries through `BlendingSuggestionsProvider`

use qsb::config::{SearchConfig, ShortcutsConfig};
use qsb::corpus::{ConfiguredCorpus, Corpora, Corpus, Source, StaticSource};
use qsb::error::{QsbError, Result};
use qsb::provider::BlendingSuggestionsProvider;
use qsb::shortcuts::{ShortcutRepository, SqliteShortcutRepository};
use qsb::suggestion::{Suggestion, SuggestionCursor};
use qsb::suggestions::SuggestionsEvent;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Handle;

fn settings() -> SearchConfig {
    SearchConfig {
        max_promoted: 8,
        max_promoted_corpora: 2,
        max_results_per_source: 10,
        max_shortcuts: 2,
    }
}

fn static_source(name: &str, texts: &[&str]) -> StaticSource {
    let entries = texts
        .iter()
        .map(|t| Suggestion::new(name, *t).with_data(format!("{name}:{t}")))
        .collect();
    StaticSource::new(name, entries)
}

fn corpus(name: &str, sources: Vec<Arc<dyn Source>>) -> Arc<dyn Corpus> {
    Arc::new(ConfiguredCorpus::new(name, true, false, sources))
}

fn static_corpus(name: &str, texts: &[&str]) -> Arc<dyn Corpus> {
    corpus(name, vec![Arc::new(static_source(name, texts))])
}

/// Source that always fails
struct BrokenSource;

impl Source for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    fn get_suggestions(&self, _query: &str, _max: usize) -> Result<Box<dyn SuggestionCursor>> {
        Err(QsbError::source_failure("broken", "backend unavailable"))
    }
}

/// Source that panics
struct PanickingSource;

impl Source for PanickingSource {
    fn name(&self) -> &str {
        "panicking"
    }

    fn get_suggestions(&self, _query: &str, _max: usize) -> Result<Box<dyn SuggestionCursor>> {
        panic!("source bug")
    }
}

/// Source that answers slowly
struct SlowSource {
    inner: StaticSource,
    delay: Duration,
    calls: AtomicUsize,
}

impl Source for SlowSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn query_threshold(&self) -> usize {
        self.inner.query_threshold()
    }

    fn get_suggestions(&self, query: &str, max: usize) -> Result<Box<dyn SuggestionCursor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.get_suggestions(query, max)
    }
}

#[tokio::test]
async fn test_single_corpus_query() {
    let corpora = Corpora::new(vec![
        static_corpus("apps", &["Calculator", "Calendar", "Camera", "Maps"]),
        static_corpus("contacts", &["Carl Sagan"]),
    ]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

    let suggestions = provider.get_suggestions("cal", Some("apps"), 8).unwrap();
    assert_eq!(suggestions.expected_corpora().unwrap(), ["apps".to_string()]);

    suggestions.wait_until_done().await.unwrap();
    let promoted = suggestions.get_promoted(provider.promoter(), 8).unwrap();
    let texts: Vec<_> = promoted.iter().map(|s| s.text1.as_str()).collect();
    assert_eq!(texts, vec!["Calculator", "Calendar"]);

    suggestions.release();
    provider.shutdown().await;
}

#[tokio::test]
async fn test_blended_query_across_corpora() {
    let corpora = Corpora::new(vec![
        static_corpus("apps", &["Calculator", "Calendar", "Camera"]),
        static_corpus("contacts", &["Carl Sagan", "Cathy"]),
        static_corpus("web", &["camera reviews", "cats"]),
    ]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

    let suggestions = provider.get_suggestions("ca", None, 5).unwrap();
    suggestions.wait_until_done().await.unwrap();
    assert_eq!(suggestions.result_count().unwrap(), 3);

    let promoted = suggestions.get_promoted(provider.promoter(), 5).unwrap();
    let sources: Vec<_> = promoted.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(sources, vec!["apps", "apps", "contacts", "contacts", "apps"]);

    provider.shutdown().await;
}

#[tokio::test]
async fn test_failing_sources_still_complete() {
    let corpora = Corpora::new(vec![
        corpus(
            "mixed",
            vec![
                Arc::new(BrokenSource),
                Arc::new(static_source("good", &["rust", "ruby"])),
            ],
        ),
        corpus("panics", vec![Arc::new(PanickingSource)]),
    ]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

    let suggestions = provider.get_suggestions("ru", None, 8).unwrap();
    suggestions.wait_until_done().await.unwrap();

    let mut results = suggestions.corpus_results().unwrap();
    results.sort_by(|a, b| a.corpus.cmp(&b.corpus));
    assert_eq!(results[0].corpus, "mixed");
    assert_eq!(results[0].count, 2);
    assert_eq!(results[1].corpus, "panics");
    assert_eq!(results[1].count, 0);

    // Failures are not remembered as empty prefixes
    assert_eq!(provider.strategy().zero_result_prefix("broken"), None);

    provider.shutdown().await;
}

#[tokio::test]
async fn test_threshold_gating() {
    let source = Arc::new(SlowSource {
        inner: static_source("web", &["rust book"]).with_query_threshold(3),
        delay: Duration::ZERO,
        calls: AtomicUsize::new(0),
    });
    let corpora = Corpora::new(vec![corpus("web", vec![source.clone() as Arc<dyn Source>])]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

    let short = provider.get_suggestions("ru", None, 8).unwrap();
    short.wait_until_done().await.unwrap();
    assert_eq!(short.corpus_results().unwrap()[0].count, 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    let long = provider.get_suggestions("rus", None, 8).unwrap();
    long.wait_until_done().await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(long.corpus_results().unwrap()[0].count, 1);

    provider.shutdown().await;
}

#[tokio::test]
async fn test_observers_see_every_corpus() {
    let corpora = Corpora::new(vec![
        static_corpus("apps", &["Maps"]),
        static_corpus("web", &["maps offline"]),
    ]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

    // Nothing is published until this task yields
    let suggestions = provider.get_suggestions("ma", None, 8).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    suggestions
        .register_observer(Arc::new(move |event: &SuggestionsEvent| {
            if let SuggestionsEvent::CorpusResultAdded { corpus, done } = event {
                sink.lock().unwrap().push((corpus.clone(), *done));
            }
        }))
        .unwrap();

    suggestions.wait_until_done().await.unwrap();
    provider.shutdown().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].1);
    assert!(seen[1].1);

    let mut corpora: Vec<_> = seen.iter().map(|(c, _)| c.as_str()).collect();
    corpora.sort();
    assert_eq!(corpora, vec!["apps", "web"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_release_before_completion() {
    let source = Arc::new(SlowSource {
        inner: static_source("slow", &["late answer"]),
        delay: Duration::from_millis(50),
        calls: AtomicUsize::new(0),
    });
    let corpora = Corpora::new(vec![corpus("slow", vec![source.clone() as Arc<dyn Source>])]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

    let suggestions = provider.get_suggestions("late", None, 8).unwrap();
    suggestions.release();
    assert!(suggestions.is_closed());

    // The late completion lands on a released aggregate without effect
    while provider.in_flight() > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    provider.shutdown().await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert!(suggestions.is_done().is_err());
}

#[tokio::test]
async fn test_clicks_become_shortcuts() {
    let temp = TempDir::new().unwrap();
    let repository = Arc::new(
        SqliteShortcutRepository::new(
            &temp.path().join("shortcuts.sqlite"),
            &ShortcutsConfig {
                enabled: true,
                max_stat_age_days: 30,
            },
            2,
        )
        .unwrap(),
    );

    let corpora = Corpora::new(vec![
        static_corpus("apps", &["Calculator", "Calendar"]),
        static_corpus("web", &["calendar sync help"]),
    ]);
    let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current())
        .with_shortcuts(repository.clone());

    let first = provider.get_suggestions("cal", None, 8).unwrap();
    first.wait_until_done().await.unwrap();
    assert!(first.has_shortcuts().unwrap());

    let promoted = first.get_promoted(provider.promoter(), 8).unwrap();
    assert!(promoted.iter().all(|s| !s.is_shortcut));
    let help = promoted
        .iter()
        .find(|s| s.text1 == "calendar sync help")
        .cloned()
        .unwrap();
    provider.report_click("calendar", &help).unwrap();
    first.release();

    // A shorter prefix of the clicked query now leads with the shortcut
    let second = provider.get_suggestions("ca", None, 8).unwrap();
    second.wait_until_done().await.unwrap();
    let promoted = second.get_promoted(provider.promoter(), 8).unwrap();

    let top = promoted.get(0).unwrap();
    assert!(top.is_shortcut);
    assert_eq!(top.text1, "calendar sync help");
    let copies = promoted
        .iter()
        .filter(|s| s.text1 == "calendar sync help")
        .count();
    assert_eq!(copies, 1);

    assert_eq!(repository.corpus_scores().unwrap().get("web"), Some(&1));
    provider.shutdown().await;
}
