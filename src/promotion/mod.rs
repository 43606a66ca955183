//! Promotion: selecting the bounded, ranked subset shown first
//!
//! A [`Promoter`] picks records from per-corpus results (already in corpus
//! rank order) and an optional shortcut cursor, and appends them to an output
//! cursor.

mod rank_aware;
mod shortcut;

pub use rank_aware::RankAwarePromoter;
pub use shortcut::ShortcutPromoter;

use crate::corpus::CorpusResult;
use crate::suggestion::{ListSuggestionCursor, Suggestion, SuggestionCursor};
use std::collections::HashSet;
use std::sync::Arc;

/// Strategy for building the promoted list
pub trait Promoter: Send + Sync {
    /// Append at most `max_promoted` records to `out`
    ///
    /// `corpus_results` are visited in the given order. `promoted_corpora`
    /// names the corpora that get the larger first-pass share. A `None`
    /// shortcut cursor means no shortcuts and no exclusions.
    fn promote(
        &self,
        shortcuts: Option<&mut dyn SuggestionCursor>,
        corpus_results: &mut [&mut CorpusResult],
        max_promoted: usize,
        out: &mut ListSuggestionCursor,
        promoted_corpora: &HashSet<String>,
    );
}

/// Record at `position`, or `None` when past the end or unreadable
pub(crate) fn record_at(
    cursor: &mut dyn SuggestionCursor,
    position: usize,
) -> Option<Arc<Suggestion>> {
    if position >= cursor.count() {
        return None;
    }
    match cursor.move_to(position).and_then(|_| cursor.current().cloned()) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Skipping unreadable suggestion at {}: {}", position, e);
            None
        }
    }
}

/// Dedup keys of every record in `cursor`
pub(crate) fn cursor_keys(cursor: &mut dyn SuggestionCursor) -> HashSet<String> {
    (0..cursor.count())
        .filter_map(|i| record_at(cursor, i))
        .map(|s| s.key())
        .collect()
}
