//! Click history and shortcut lookup
//!
//! A shortcut is a suggestion the user clicked before. Clicking a suggestion
//! for a query makes it a shortcut for every prefix of that query; shortcut
//! lookups are synchronous and run on the caller's thread.

mod database;

pub use database::{ShortcutEntry, ShortcutStats, SqliteShortcutRepository};

use crate::corpus::Corpus;
use crate::error::Result;
use crate::suggestion::{ListSuggestionCursor, Suggestion};
use std::collections::HashMap;
use std::sync::Arc;

/// Storage for click history
pub trait ShortcutRepository: Send + Sync {
    /// Shortcuts for `query` whose corpus is among `corpora`
    ///
    /// Records are flagged as shortcuts and ordered most relevant first.
    fn shortcuts_for_query(
        &self,
        query: &str,
        corpora: &[Arc<dyn Corpus>],
    ) -> Result<ListSuggestionCursor>;

    /// Record that `suggestion` from `corpus` was clicked after typing `query`
    fn report_click(&self, corpus: &str, query: &str, suggestion: &Suggestion) -> Result<()>;

    /// Recent click counts per corpus, used for ranking
    fn corpus_scores(&self) -> Result<HashMap<String, u64>>;

    /// Forget all click history
    fn clear_history(&self) -> Result<()>;
}

/// Normalize a query for storage and prefix matching
pub(crate) fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}
