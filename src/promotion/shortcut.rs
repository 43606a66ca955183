use super::{record_at, Promoter};
use crate::corpus::CorpusResult;
use crate::suggestion::{ListSuggestionCursor, SuggestionCursor};
use std::collections::HashSet;
use std::sync::Arc;

/// Places shortcuts ahead of corpus results
///
/// Up to `max_shortcuts` shortcut records go first, then the remaining slots
/// are handed to the inner promoter, which still excludes every shortcut key.
pub struct ShortcutPromoter {
    max_shortcuts: usize,
    inner: Arc<dyn Promoter>,
}

impl ShortcutPromoter {
    pub fn new(max_shortcuts: usize, inner: Arc<dyn Promoter>) -> Self {
        Self {
            max_shortcuts,
            inner,
        }
    }
}

impl Promoter for ShortcutPromoter {
    fn promote(
        &self,
        shortcuts: Option<&mut dyn SuggestionCursor>,
        corpus_results: &mut [&mut CorpusResult],
        max_promoted: usize,
        out: &mut ListSuggestionCursor,
        promoted_corpora: &HashSet<String>,
    ) {
        let mut added = 0;

        let shortcuts = shortcuts.map(|cursor| {
            let limit = self.max_shortcuts.min(max_promoted);
            let mut placed: HashSet<String> = out.iter().map(|s| s.key()).collect();
            let mut position = 0;
            while added < limit {
                let Some(record) = record_at(cursor, position) else {
                    break;
                };
                position += 1;
                if placed.insert(record.key()) {
                    out.push(record);
                    added += 1;
                }
            }
            cursor
        });

        self.inner.promote(
            shortcuts,
            corpus_results,
            max_promoted - added,
            out,
            promoted_corpora,
        );
    }
}
