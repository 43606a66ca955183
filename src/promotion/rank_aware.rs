use super::{cursor_keys, record_at, Promoter};
use crate::corpus::CorpusResult;
use crate::suggestion::{ListSuggestionCursor, SuggestionCursor};
use std::collections::HashSet;

/// Records taken from each promoted corpus in the first pass
pub const DEFAULT_PROMOTED_PER_CORPUS: usize = 2;

/// Blends ranked corpus results into a bounded promoted list
///
/// Three passes over the corpus results, all in rank order:
///
/// 1. each promoted corpus contributes up to `per_corpus` records;
/// 2. one re-scan over every corpus takes one more record from each;
/// 3. leftover slots are drained from the highest-ranked corpora first.
///
/// Records duplicating a shortcut, or a record already placed, are skipped
/// without consuming a slot.
#[derive(Debug, Clone)]
pub struct RankAwarePromoter {
    per_corpus: usize,
}

impl RankAwarePromoter {
    pub fn new() -> Self {
        Self::with_per_corpus(DEFAULT_PROMOTED_PER_CORPUS)
    }

    pub fn with_per_corpus(per_corpus: usize) -> Self {
        Self { per_corpus }
    }
}

impl Default for RankAwarePromoter {
    fn default() -> Self {
        Self::new()
    }
}

/// Selection state for one `promote` call
struct Selection<'a> {
    out: &'a mut ListSuggestionCursor,
    excluded: HashSet<String>,
    placed: HashSet<String>,
    added: usize,
    max: usize,
}

impl Selection<'_> {
    fn is_full(&self) -> bool {
        self.added >= self.max
    }

    /// Take up to `n` records from `result`, advancing `next`
    fn take(&mut self, result: &mut CorpusResult, next: &mut usize, n: usize) {
        let mut taken = 0;
        while taken < n && !self.is_full() {
            let Some(record) = record_at(result, *next) else {
                return;
            };
            *next += 1;

            let key = record.key();
            if self.excluded.contains(&key) || !self.placed.insert(key) {
                tracing::trace!("Skipping duplicate {:?} from {}", record.text1, result.corpus());
                continue;
            }

            self.out.push(record);
            self.added += 1;
            taken += 1;
        }
    }
}

impl Promoter for RankAwarePromoter {
    fn promote(
        &self,
        shortcuts: Option<&mut dyn SuggestionCursor>,
        corpus_results: &mut [&mut CorpusResult],
        max_promoted: usize,
        out: &mut ListSuggestionCursor,
        promoted_corpora: &HashSet<String>,
    ) {
        if max_promoted == 0 {
            return;
        }

        let excluded = shortcuts.map(cursor_keys).unwrap_or_default();
        let placed = out.iter().map(|s| s.key()).collect();
        let mut selection = Selection {
            out,
            excluded,
            placed,
            added: 0,
            max: max_promoted,
        };
        let mut next = vec![0usize; corpus_results.len()];

        // Pass 1: promoted corpora get the larger share
        for (result, pos) in corpus_results.iter_mut().zip(next.iter_mut()) {
            if promoted_corpora.contains(result.corpus()) {
                selection.take(result, pos, self.per_corpus);
            }
        }

        // Pass 2: one more from each, in rank order
        for (result, pos) in corpus_results.iter_mut().zip(next.iter_mut()) {
            selection.take(result, pos, 1);
        }

        // Pass 3: drain in rank order
        for (result, pos) in corpus_results.iter_mut().zip(next.iter_mut()) {
            selection.take(result, pos, usize::MAX);
        }

        tracing::trace!(
            "Promoted {} of at most {} suggestions from {} corpora",
            selection.added,
            max_promoted,
            corpus_results.len()
        );
    }
}
