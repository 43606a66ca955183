//! Blending suggestions provider
//!
//! Entry point for queries: picks and ranks the corpora to ask, attaches
//! shortcuts, fans the query out to one blocking task per corpus and returns
//! the [`Suggestions`] aggregate immediately. Results arrive later through
//! the publish context.

mod executor;

pub use executor::{PublishHandle, Publisher, QueryExecutor};

use crate::config::SearchConfig;
use crate::corpus::{Corpora, Corpus, CorpusRanker, CorpusResult, DefaultCorpusRanker, Source};
use crate::error::{QsbError, Result};
use crate::promotion::{record_at, Promoter, RankAwarePromoter, ShortcutPromoter};
use crate::shortcuts::ShortcutRepository;
use crate::strategy::ShouldQueryStrategy;
use crate::suggestion::{ListSuggestionCursor, Suggestion, SuggestionCursor};
use crate::suggestions::{Suggestions, SuggestionsSink};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;

/// Fans queries out to corpora and blends the results
pub struct BlendingSuggestionsProvider {
    corpora: Arc<Corpora>,
    ranker: Arc<dyn CorpusRanker>,
    strategy: Arc<ShouldQueryStrategy>,
    shortcuts: Option<Arc<dyn ShortcutRepository>>,
    promoter: Arc<dyn Promoter>,
    settings: SearchConfig,
    executor: QueryExecutor,
    publisher: Publisher,
}

impl BlendingSuggestionsProvider {
    /// Create a provider running its tasks on `runtime`
    pub fn new(corpora: Corpora, settings: SearchConfig, runtime: Handle) -> Self {
        let publisher = Publisher::new(&runtime);

        Self {
            corpora: Arc::new(corpora),
            ranker: Arc::new(DefaultCorpusRanker::without_usage()),
            strategy: Arc::new(ShouldQueryStrategy::new()),
            shortcuts: None,
            promoter: Arc::new(RankAwarePromoter::new()),
            settings,
            executor: QueryExecutor::new(runtime),
            publisher,
        }
    }

    /// Use click history for shortcuts and usage-based corpus ranking
    pub fn with_shortcuts(mut self, repository: Arc<dyn ShortcutRepository>) -> Self {
        self.ranker = Arc::new(DefaultCorpusRanker::new(repository.clone()));
        self.promoter = Arc::new(ShortcutPromoter::new(
            self.settings.max_shortcuts,
            Arc::new(RankAwarePromoter::new()),
        ));
        self.shortcuts = Some(repository);
        self
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn CorpusRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_promoter(mut self, promoter: Arc<dyn Promoter>) -> Self {
        self.promoter = promoter;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<ShouldQueryStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn corpora(&self) -> &Corpora {
        &self.corpora
    }

    /// Promoter matching this provider's shortcut setup
    pub fn promoter(&self) -> &Arc<dyn Promoter> {
        &self.promoter
    }

    pub fn strategy(&self) -> &ShouldQueryStrategy {
        &self.strategy
    }

    /// Enabled corpora in rank order
    pub fn ranked_corpora(&self) -> Vec<Arc<dyn Corpus>> {
        self.ranker.rank(&self.corpora.enabled())
    }

    /// Start a query and return its aggregate
    ///
    /// With `corpus` set only that corpus is queried, enabled or not.
    pub fn get_suggestions(
        &self,
        query: &str,
        corpus: Option<&str>,
        max_promoted: usize,
    ) -> Result<Suggestions> {
        let candidates = match corpus {
            Some(name) => vec![self.corpora.get(name)?],
            None => self.corpora.enabled(),
        };
        let ranked = self.ranker.rank(&candidates);

        let expected: Vec<String> = ranked.iter().map(|c| c.name().to_string()).collect();
        let promoted: HashSet<String> = expected
            .iter()
            .take(self.settings.max_promoted_corpora)
            .cloned()
            .collect();

        let suggestions = Suggestions::new(query, expected)
            .with_promoted_corpora(promoted)
            .with_max_promoted(max_promoted);

        tracing::debug!(
            "Query {} for {:?}: {} corpora",
            suggestions.id(),
            query,
            ranked.len()
        );

        self.attach_shortcuts(suggestions.sink(), query, &ranked);

        for corpus in ranked {
            self.query_corpus(corpus, query, suggestions.sink());
        }

        Ok(suggestions)
    }

    /// Look shortcuts up now and publish them like any other arrival
    fn attach_shortcuts(&self, sink: SuggestionsSink, query: &str, corpora: &[Arc<dyn Corpus>]) {
        let Some(repository) = &self.shortcuts else {
            return;
        };

        match repository.shortcuts_for_query(query, corpora) {
            Ok(shortcuts) => {
                self.publisher
                    .handle()
                    .post(move || sink.set_shortcuts(Box::new(shortcuts)));
            }
            Err(e) => tracing::warn!("Shortcut lookup failed for {:?}: {}", query, e),
        }
    }

    fn query_corpus(&self, corpus: Arc<dyn Corpus>, query: &str, sink: SuggestionsSink) {
        let sources: Vec<Arc<dyn Source>> = corpus
            .sources()
            .iter()
            .filter(|source| self.strategy.should_query(source.as_ref(), query))
            .cloned()
            .collect();

        if sources.is_empty() {
            tracing::debug!("No source of {} qualifies for {:?}", corpus.name(), query);
            let empty = CorpusResult::empty(corpus.name(), query);
            self.publisher
                .handle()
                .post(move || sink.add_corpus_result(empty));
            return;
        }

        let task = CorpusQuery {
            corpus: corpus.name().to_string(),
            query: query.to_string(),
            sources,
            max_results: self.settings.max_results_per_source,
            strategy: self.strategy.clone(),
        };
        let publish = self.publisher.handle();

        self.executor
            .execute(format!("{}:{}", task.corpus, sink.id()), move || {
                let result = task.run();
                publish.post(move || sink.add_corpus_result(result));
            });
    }

    /// Record a click on `suggestion` for `query`
    ///
    /// The owning corpus is found through the suggestion's source.
    pub fn report_click(&self, query: &str, suggestion: &Suggestion) -> Result<()> {
        let Some(repository) = &self.shortcuts else {
            tracing::debug!("Shortcuts disabled, not recording click");
            return Ok(());
        };

        let corpus = self
            .corpora
            .corpus_for_source(&suggestion.source)
            .ok_or_else(|| QsbError::UnknownCorpus {
                name: suggestion.source.clone(),
            })?;

        repository.report_click(corpus.name(), query, suggestion)
    }

    /// Number of corpus queries still running
    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    /// Wait for queued publications to be applied
    pub async fn shutdown(self) {
        tracing::debug!("Shutting down provider");
        self.publisher.shutdown().await;
    }
}

/// One corpus' share of a query, run on a blocking worker
struct CorpusQuery {
    corpus: String,
    query: String,
    sources: Vec<Arc<dyn Source>>,
    max_results: usize,
    strategy: Arc<ShouldQueryStrategy>,
}

impl CorpusQuery {
    fn run(self) -> CorpusResult {
        let start = Instant::now();
        let mut merged = ListSuggestionCursor::new(self.query.clone());

        for source in &self.sources {
            let answered = catch_unwind(AssertUnwindSafe(|| {
                source.get_suggestions(&self.query, self.max_results)
            }));

            match answered {
                Ok(Ok(mut cursor)) => {
                    if cursor.is_empty() {
                        self.strategy.on_zero_results(source.as_ref(), &self.query);
                    }
                    let count = cursor.count().min(self.max_results);
                    for position in 0..count {
                        if let Some(record) = record_at(cursor.as_mut(), position) {
                            merged.push(record);
                        }
                    }
                    cursor.close();
                }
                Ok(Err(e)) => {
                    tracing::warn!("Source {} failed for {:?}: {}", source.name(), self.query, e);
                }
                Err(_) => {
                    tracing::warn!("Source {} panicked for {:?}", source.name(), self.query);
                }
            }
        }

        let latency = start.elapsed();
        tracing::debug!(
            "Corpus {} produced {} suggestions in {:?}",
            self.corpus,
            merged.count(),
            latency
        );

        CorpusResult::new(self.corpus, self.query, Box::new(merged), latency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{ConfiguredCorpus, StaticSource};
    use crate::suggestions::SuggestionsEvent;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn settings() -> SearchConfig {
        SearchConfig {
            max_promoted: 8,
            max_promoted_corpora: 2,
            max_results_per_source: 10,
            max_shortcuts: 2,
        }
    }

    fn static_corpus(name: &str, texts: &[&str], threshold: usize) -> Arc<dyn Corpus> {
        let entries = texts
            .iter()
            .map(|t| Suggestion::new(name, *t).with_data(format!("{name}:{t}")))
            .collect();
        let source = StaticSource::new(name, entries).with_query_threshold(threshold);
        Arc::new(ConfiguredCorpus::new(name, true, false, vec![Arc::new(source)]))
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl Source for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn get_suggestions(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Box<dyn SuggestionCursor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ListSuggestionCursor::new("")))
        }
    }

    /// Serves the same shortcut for every query
    struct FixedShortcuts;

    impl ShortcutRepository for FixedShortcuts {
        fn shortcuts_for_query(
            &self,
            query: &str,
            _corpora: &[Arc<dyn Corpus>],
        ) -> Result<ListSuggestionCursor> {
            let shortcut = Suggestion::new("web", "rust book")
                .with_data("web:rust book")
                .as_shortcut();
            Ok(ListSuggestionCursor::from_suggestions(query, vec![shortcut]))
        }

        fn report_click(&self, _corpus: &str, _query: &str, _suggestion: &Suggestion) -> Result<()> {
            Ok(())
        }

        fn corpus_scores(&self) -> Result<HashMap<String, u64>> {
            Ok(HashMap::new())
        }

        fn clear_history(&self) -> Result<()> {
            Ok(())
        }
    }

    fn record_events(suggestions: &Suggestions) -> Arc<Mutex<Vec<SuggestionsEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        suggestions
            .register_observer(Arc::new(move |event: &SuggestionsEvent| {
                sink.lock().unwrap().push(event.clone());
            }))
            .unwrap();
        events
    }

    #[tokio::test]
    async fn test_gated_corpus_completes_without_task() {
        let corpora = Corpora::new(vec![static_corpus("web", &["rust"], 3)]);
        let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current());

        let suggestions = provider.get_suggestions("ru", None, 8).unwrap();
        assert_eq!(provider.in_flight(), 0);

        // Observers registered right away still see the empty result
        let events = record_events(&suggestions);
        suggestions.wait_until_done().await.unwrap();

        assert_eq!(suggestions.corpus_results().unwrap()[0].count, 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![SuggestionsEvent::CorpusResultAdded {
                corpus: "web".to_string(),
                done: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_observers_see_shortcut_attachment() {
        let corpora = Corpora::new(vec![static_corpus("web", &["rust book", "rustup"], 0)]);
        let provider = BlendingSuggestionsProvider::new(corpora, settings(), Handle::current())
            .with_shortcuts(Arc::new(FixedShortcuts));

        let suggestions = provider.get_suggestions("rust", None, 8).unwrap();
        let events = record_events(&suggestions);
        suggestions.wait_until_done().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&SuggestionsEvent::ShortcutsChanged));
        assert!(events.contains(&SuggestionsEvent::CorpusResultAdded {
            corpus: "web".to_string(),
            done: true,
        }));

        let promoted = suggestions.get_promoted(provider.promoter(), 8).unwrap();
        let texts: Vec<_> = promoted.iter().map(|s| s.text1.as_str()).collect();
        assert_eq!(texts, vec!["rust book", "rustup"]);
        assert!(promoted.get(0).unwrap().is_shortcut);
    }

    #[tokio::test]
    async fn test_zero_results_suppress_longer_queries() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let corpus: Arc<dyn Corpus> = Arc::new(ConfiguredCorpus::new(
            "counting",
            true,
            false,
            vec![source.clone() as Arc<dyn Source>],
        ));
        let provider =
            BlendingSuggestionsProvider::new(Corpora::new(vec![corpus]), settings(), Handle::current());

        let first = provider.get_suggestions("zz", None, 8).unwrap();
        first.wait_until_done().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            provider.strategy().zero_result_prefix("counting").as_deref(),
            Some("zz")
        );

        let second = provider.get_suggestions("zzz", None, 8).unwrap();
        second.wait_until_done().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_corpus_filter() {
        let provider = BlendingSuggestionsProvider::new(
            Corpora::new(vec![static_corpus("web", &["rust"], 0)]),
            settings(),
            Handle::current(),
        );

        let err = provider.get_suggestions("r", Some("videos"), 8).unwrap_err();
        assert!(matches!(err, QsbError::UnknownCorpus { .. }));
    }

    #[tokio::test]
    async fn test_report_click_without_repository_is_noop() {
        let provider = BlendingSuggestionsProvider::new(
            Corpora::new(vec![static_corpus("web", &["rust"], 0)]),
            settings(),
            Handle::current(),
        );

        let clicked = Suggestion::new("nowhere", "x");
        assert!(provider.report_click("x", &clicked).is_ok());
    }
}
