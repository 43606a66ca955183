use crate::config::SourceConfig;
use crate::error::Result;
use crate::suggestion::{ListSuggestionCursor, Suggestion, SuggestionCursor};

/// An individual backend that answers queries
///
/// `get_suggestions` may block; the provider always calls it from a blocking
/// worker. Errors are treated as zero results by the caller.
pub trait Source: Send + Sync {
    /// Unique source name
    fn name(&self) -> &str;

    /// Minimum query length (in characters) before this source is queried
    fn query_threshold(&self) -> usize {
        0
    }

    /// Bypass both the threshold and zero-result suppression
    fn query_after_zero_results(&self) -> bool {
        false
    }

    /// Answer `query` with at most `max_results` suggestions
    fn get_suggestions(&self, query: &str, max_results: usize)
        -> Result<Box<dyn SuggestionCursor>>;
}

/// Source answering from a fixed list of entries
///
/// An entry matches when its primary text, or any word in it, starts with the
/// query (case-insensitive). The empty query matches every entry.
pub struct StaticSource {
    name: String,
    query_threshold: usize,
    query_after_zero_results: bool,
    entries: Vec<Suggestion>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, entries: Vec<Suggestion>) -> Self {
        Self {
            name: name.into(),
            query_threshold: 0,
            query_after_zero_results: false,
            entries,
        }
    }

    pub fn with_query_threshold(mut self, threshold: usize) -> Self {
        self.query_threshold = threshold;
        self
    }

    pub fn with_query_after_zero_results(mut self, enabled: bool) -> Self {
        self.query_after_zero_results = enabled;
        self
    }

    /// Build from a `[[corpora.sources]]` config section
    pub fn from_config(config: &SourceConfig) -> Self {
        let entries = config
            .entries
            .iter()
            .map(|entry| entry.to_suggestion(&config.name))
            .collect();

        Self::new(config.name.clone(), entries)
            .with_query_threshold(config.query_threshold)
            .with_query_after_zero_results(config.query_after_zero_results)
    }

    fn matches(entry: &Suggestion, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let text = entry.text1.to_lowercase();
        text.starts_with(query) || text.split_whitespace().any(|word| word.starts_with(query))
    }
}

impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_threshold(&self) -> usize {
        self.query_threshold
    }

    fn query_after_zero_results(&self) -> bool {
        self.query_after_zero_results
    }

    fn get_suggestions(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Box<dyn SuggestionCursor>> {
        let normalized = query.trim().to_lowercase();
        let matched: Vec<Suggestion> = self
            .entries
            .iter()
            .filter(|entry| Self::matches(entry, &normalized))
            .take(max_results)
            .cloned()
            .collect();

        tracing::trace!(
            "Static source {} matched {} entries for {:?}",
            self.name,
            matched.len(),
            query
        );

        Ok(Box::new(ListSuggestionCursor::from_suggestions(
            query, matched,
        )))
    }
}
