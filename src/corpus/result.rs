use crate::error::Result;
use crate::suggestion::{ListSuggestionCursor, Suggestion, SuggestionCursor};
use std::sync::Arc;
use std::time::Duration;

/// Suggestions for one corpus, tagged with the query they answer
///
/// Wraps an inner cursor and overrides the user query with the corpus-level
/// query; record access is delegated unchanged.
pub struct CorpusResult {
    corpus: String,
    user_query: String,
    latency: Duration,
    inner: Box<dyn SuggestionCursor>,
}

impl CorpusResult {
    pub fn new(
        corpus: impl Into<String>,
        user_query: impl Into<String>,
        inner: Box<dyn SuggestionCursor>,
        latency: Duration,
    ) -> Self {
        Self {
            corpus: corpus.into(),
            user_query: user_query.into(),
            latency,
            inner,
        }
    }

    /// A result with no suggestions, used when every source was skipped
    pub fn empty(corpus: impl Into<String>, user_query: impl Into<String>) -> Self {
        let user_query = user_query.into();
        let inner = Box::new(ListSuggestionCursor::new(user_query.clone()));
        Self::new(corpus, user_query, inner, Duration::ZERO)
    }

    /// Name of the owning corpus
    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    /// Time from task start to result production
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl std::fmt::Debug for CorpusResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusResult")
            .field("corpus", &self.corpus)
            .field("user_query", &self.user_query)
            .field("count", &self.inner.count())
            .field("latency", &self.latency)
            .finish()
    }
}

impl SuggestionCursor for CorpusResult {
    fn user_query(&self) -> &str {
        &self.user_query
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn position(&self) -> Option<usize> {
        self.inner.position()
    }

    fn move_to(&mut self, position: usize) -> Result<()> {
        self.inner.move_to(position)
    }

    fn current(&self) -> Result<&Arc<Suggestion>> {
        self.inner.current()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_user_query_and_delegates() {
        let inner = ListSuggestionCursor::from_suggestions(
            "source-level",
            vec![Suggestion::new("web", "hello").with_data("h")],
        );
        let mut result = CorpusResult::new(
            "web",
            "hel",
            Box::new(inner),
            Duration::from_millis(12),
        );

        assert_eq!(result.user_query(), "hel");
        assert_eq!(result.corpus(), "web");
        assert_eq!(result.latency(), Duration::from_millis(12));

        result.move_to(0).unwrap();
        assert_eq!(result.text1().unwrap(), "hello");

        result.close();
        assert!(result.is_closed());
    }

    #[test]
    fn test_empty_result() {
        let result = CorpusResult::empty("apps", "q");
        assert!(result.is_empty());
        assert_eq!(result.latency(), Duration::ZERO);
    }
}
