use super::Corpus;
use crate::shortcuts::ShortcutRepository;
use std::collections::HashMap;
use std::sync::Arc;

/// Orders corpora for promotion and query scheduling
pub trait CorpusRanker: Send + Sync {
    /// Rank `corpora`. Total and deterministic for a fixed input set.
    fn rank(&self, corpora: &[Arc<dyn Corpus>]) -> Vec<Arc<dyn Corpus>>;
}

/// Usage-based ranking
///
/// Enabled-by-default corpora come first, then higher click scores, then
/// names in lexicographic order.
pub struct DefaultCorpusRanker {
    usage: Option<Arc<dyn ShortcutRepository>>,
}

impl DefaultCorpusRanker {
    /// Rank with click scores read from `usage`
    pub fn new(usage: Arc<dyn ShortcutRepository>) -> Self {
        Self { usage: Some(usage) }
    }

    /// Rank without usage data
    pub fn without_usage() -> Self {
        Self { usage: None }
    }

    fn scores(&self) -> HashMap<String, u64> {
        let Some(usage) = &self.usage else {
            return HashMap::new();
        };

        match usage.corpus_scores() {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!("Failed to read corpus scores, ranking without usage: {}", e);
                HashMap::new()
            }
        }
    }
}

impl CorpusRanker for DefaultCorpusRanker {
    fn rank(&self, corpora: &[Arc<dyn Corpus>]) -> Vec<Arc<dyn Corpus>> {
        let scores = self.scores();
        let score = |c: &Arc<dyn Corpus>| scores.get(c.name()).copied().unwrap_or(0);

        let mut ranked = corpora.to_vec();
        ranked.sort_by(|a, b| {
            b.is_enabled_by_default()
                .cmp(&a.is_enabled_by_default())
                .then_with(|| score(b).cmp(&score(a)))
                .then_with(|| a.name().cmp(b.name()))
        });

        tracing::trace!(
            "Ranked corpora: {:?}",
            ranked.iter().map(|c| c.name()).collect::<Vec<_>>()
        );
        ranked
    }
}

impl std::fmt::Debug for DefaultCorpusRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCorpusRanker")
            .field("usage", &self.usage.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ConfiguredCorpus;
    use crate::error::Result;
    use crate::suggestion::{ListSuggestionCursor, Suggestion};

    struct FixedScores(HashMap<String, u64>);

    impl ShortcutRepository for FixedScores {
        fn shortcuts_for_query(
            &self,
            query: &str,
            _corpora: &[Arc<dyn Corpus>],
        ) -> Result<ListSuggestionCursor> {
            Ok(ListSuggestionCursor::new(query))
        }

        fn report_click(&self, _corpus: &str, _query: &str, _suggestion: &Suggestion) -> Result<()> {
            Ok(())
        }

        fn corpus_scores(&self) -> Result<HashMap<String, u64>> {
            Ok(self.0.clone())
        }

        fn clear_history(&self) -> Result<()> {
            Ok(())
        }
    }

    fn corpus(name: &str, enabled_by_default: bool) -> Arc<dyn Corpus> {
        Arc::new(ConfiguredCorpus::new(name, enabled_by_default, false, vec![]))
    }

    fn names(ranked: &[Arc<dyn Corpus>]) -> Vec<&str> {
        ranked.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_ties_break_by_name() {
        let ranker = DefaultCorpusRanker::without_usage();
        let corpora = vec![corpus("web", true), corpus("apps", true), corpus("contacts", true)];
        assert_eq!(names(&ranker.rank(&corpora)), vec!["apps", "contacts", "web"]);
    }

    #[test]
    fn test_usage_then_default_enabled() {
        let scores = HashMap::from([("web".to_string(), 3), ("music".to_string(), 50)]);
        let ranker = DefaultCorpusRanker::new(Arc::new(FixedScores(scores)));
        let corpora = vec![
            corpus("apps", true),
            corpus("music", false),
            corpus("web", true),
        ];

        // music has the most clicks but is not enabled by default
        assert_eq!(names(&ranker.rank(&corpora)), vec!["web", "apps", "music"]);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let ranker = DefaultCorpusRanker::without_usage();
        let a = vec![corpus("b", true), corpus("a", true)];
        let b = vec![corpus("a", true), corpus("b", true)];
        assert_eq!(names(&ranker.rank(&a)), names(&ranker.rank(&b)));
    }
}
