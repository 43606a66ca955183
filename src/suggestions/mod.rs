//! The per-query result aggregate
//!
//! A [`Suggestions`] collects one [`CorpusResult`] per expected corpus as they
//! arrive, holds the shortcut cursor, and computes the promoted list on demand.
//! Handles are reference counted explicitly: every holder that called
//! [`Suggestions::acquire`] must call [`Suggestions::release`], and the last
//! release closes every cursor the aggregate owns.

mod observer;

pub use observer::{Observer, ObserverId, SuggestionsEvent};

use crate::corpus::CorpusResult;
use crate::error::{QsbError, Result};
use crate::promotion::Promoter;
use crate::suggestion::{ListSuggestionCursor, SuggestionCursor};
use observer::ObserverRegistry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Default cap on promoted suggestions
pub const DEFAULT_MAX_PROMOTED: usize = 8;

/// Summary of one published corpus result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusResultSummary {
    pub corpus: String,
    pub count: usize,
    pub latency: Duration,
}

/// Cached promoted cursor and the parameters that produced it
struct PromotedCache {
    promoter: Arc<dyn Promoter>,
    max_promoted: usize,
    cursor: ListSuggestionCursor,
}

struct State {
    /// Arrival order
    corpus_results: Vec<CorpusResult>,
    shortcuts: Option<Box<dyn SuggestionCursor>>,
    promoted_corpora: HashSet<String>,
    max_promoted: usize,
    promoted: Option<PromotedCache>,
    done: bool,
    closed: bool,
}

struct Shared {
    id: Uuid,
    query: String,
    /// Expected corpora in rank order
    expected: Vec<String>,
    state: Mutex<State>,
    observers: Mutex<ObserverRegistry>,
    holders: AtomicUsize,
    done_tx: watch::Sender<bool>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_state(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.lock_state();
        if state.closed {
            return Err(QsbError::illegal_state(format!(
                "suggestions for {:?} have been released",
                self.query
            )));
        }
        Ok(state)
    }

    fn ensure_open(&self) -> Result<()> {
        self.open_state().map(|_| ())
    }

    /// Every expected corpus has a result
    fn all_expected_reported(&self, state: &State) -> bool {
        self.expected.iter().all(|name| {
            state
                .corpus_results
                .iter()
                .any(|result| result.corpus() == name)
        })
    }

    fn notify(&self, event: &SuggestionsEvent) {
        let observers = self.lock_observers().snapshot();
        for observer in observers {
            observer(event);
        }
    }

    fn add_corpus_result(&self, mut result: CorpusResult) {
        let event = {
            let mut state = self.lock_state();
            if state.closed {
                tracing::trace!(
                    "Dropping late result from {} for released query {}",
                    result.corpus(),
                    self.id
                );
                result.close();
                return;
            }

            if state
                .corpus_results
                .iter()
                .any(|existing| existing.corpus() == result.corpus())
            {
                tracing::warn!(
                    "Ignoring second result from {} for query {}",
                    result.corpus(),
                    self.id
                );
                result.close();
                return;
            }

            if !self.expected.iter().any(|c| c == result.corpus()) {
                tracing::debug!("Result from unexpected corpus {}", result.corpus());
            }

            tracing::debug!(
                "Query {}: {} returned {} suggestions in {:?}",
                self.id,
                result.corpus(),
                result.count(),
                result.latency()
            );

            let corpus = result.corpus().to_string();
            state.corpus_results.push(result);
            state.promoted = None;

            if !state.done && self.all_expected_reported(&state) {
                state.done = true;
                self.done_tx.send_replace(true);
                tracing::debug!("Query {} done", self.id);
            }

            SuggestionsEvent::CorpusResultAdded {
                corpus,
                done: state.done,
            }
        };

        self.notify(&event);
    }

    fn set_shortcuts(&self, mut shortcuts: Box<dyn SuggestionCursor>) {
        {
            let mut state = self.lock_state();
            if state.closed {
                shortcuts.close();
                return;
            }
            if let Some(mut previous) = state.shortcuts.replace(shortcuts) {
                previous.close();
            }
            state.promoted = None;
        }

        self.notify(&SuggestionsEvent::ShortcutsChanged);
    }

    fn close(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        state.promoted = None;
        for result in state.corpus_results.iter_mut() {
            result.close();
        }
        if let Some(shortcuts) = state.shortcuts.as_mut() {
            shortcuts.close();
        }
        drop(state);

        self.lock_observers().clear();
        tracing::debug!("Released suggestions for query {}", self.id);
    }
}

/// Write side of an aggregate, held by in-flight query tasks
///
/// Does not count as a holder: once every holder has released the aggregate,
/// publishing through a sink is a silent no-op.
#[derive(Clone)]
pub struct SuggestionsSink {
    shared: Arc<Shared>,
}

impl SuggestionsSink {
    pub fn add_corpus_result(&self, result: CorpusResult) {
        self.shared.add_corpus_result(result);
    }

    pub fn set_shortcuts(&self, shortcuts: Box<dyn SuggestionCursor>) {
        self.shared.set_shortcuts(shortcuts);
    }

    /// Query id of the aggregate this sink publishes to
    pub fn id(&self) -> Uuid {
        self.shared.id
    }
}

/// A counted handle to the results of one in-flight query
pub struct Suggestions {
    shared: Arc<Shared>,
    released: AtomicBool,
}

impl Suggestions {
    /// Create an aggregate expecting one result per corpus in `expected_corpora`
    ///
    /// `expected_corpora` is in rank order; promoted suggestions are blended in
    /// that order. The returned handle is the first holder.
    pub fn new(query: impl Into<String>, expected_corpora: Vec<String>) -> Self {
        let done = expected_corpora.is_empty();
        let (done_tx, _) = watch::channel(done);

        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            query: query.into(),
            expected: expected_corpora,
            state: Mutex::new(State {
                corpus_results: Vec::new(),
                shortcuts: None,
                promoted_corpora: HashSet::new(),
                max_promoted: DEFAULT_MAX_PROMOTED,
                promoted: None,
                done,
                closed: false,
            }),
            observers: Mutex::new(ObserverRegistry::default()),
            holders: AtomicUsize::new(1),
            done_tx,
        });

        tracing::debug!(
            "Created suggestions {} for {:?}, expecting {} corpora",
            shared.id,
            shared.query,
            shared.expected.len()
        );

        Self {
            shared,
            released: AtomicBool::new(false),
        }
    }

    /// Corpora that get the larger share in promotion
    pub fn with_promoted_corpora(self, promoted_corpora: HashSet<String>) -> Self {
        self.shared.lock_state().promoted_corpora = promoted_corpora;
        self
    }

    /// Promotion cap requested by the caller
    pub fn with_max_promoted(self, max_promoted: usize) -> Self {
        self.shared.lock_state().max_promoted = max_promoted;
        self
    }

    /// Unique id, used to correlate log lines
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn query(&self) -> Result<&str> {
        self.shared.ensure_open()?;
        Ok(&self.shared.query)
    }

    /// Expected corpora in rank order
    pub fn expected_corpora(&self) -> Result<&[String]> {
        self.shared.ensure_open()?;
        Ok(&self.shared.expected)
    }

    pub fn expected_result_count(&self) -> Result<usize> {
        self.shared.ensure_open()?;
        Ok(self.shared.expected.len())
    }

    /// Number of corpus results received so far
    pub fn result_count(&self) -> Result<usize> {
        Ok(self.shared.open_state()?.corpus_results.len())
    }

    pub fn is_done(&self) -> Result<bool> {
        Ok(self.shared.open_state()?.done)
    }

    pub fn max_promoted(&self) -> Result<usize> {
        Ok(self.shared.open_state()?.max_promoted)
    }

    pub fn promoted_corpora(&self) -> Result<HashSet<String>> {
        Ok(self.shared.open_state()?.promoted_corpora.clone())
    }

    pub fn has_shortcuts(&self) -> Result<bool> {
        Ok(self.shared.open_state()?.shortcuts.is_some())
    }

    /// Published corpus results in arrival order
    pub fn corpus_results(&self) -> Result<Vec<CorpusResultSummary>> {
        let state = self.shared.open_state()?;
        Ok(state
            .corpus_results
            .iter()
            .map(|r| CorpusResultSummary {
                corpus: r.corpus().to_string(),
                count: r.count(),
                latency: r.latency(),
            })
            .collect())
    }

    /// Write handle for query tasks
    pub fn sink(&self) -> SuggestionsSink {
        SuggestionsSink {
            shared: self.shared.clone(),
        }
    }

    /// Publish a corpus result; the first result per corpus is final
    pub fn add_corpus_result(&self, result: CorpusResult) {
        self.shared.add_corpus_result(result);
    }

    /// Attach the shortcut cursor, replacing and closing any previous one
    pub fn set_shortcuts(&self, shortcuts: Box<dyn SuggestionCursor>) {
        self.shared.set_shortcuts(shortcuts);
    }

    /// Promoted suggestions for the current state
    ///
    /// Cached until the next mutation; repeated calls with the same promoter
    /// instance (`Arc::ptr_eq`) and limit return the cached list. Each call
    /// returns its own cursor.
    pub fn get_promoted(
        &self,
        promoter: &Arc<dyn Promoter>,
        max_promoted: usize,
    ) -> Result<ListSuggestionCursor> {
        let mut state = self.shared.open_state()?;

        if let Some(cache) = &state.promoted {
            if Arc::ptr_eq(&cache.promoter, promoter) && cache.max_promoted == max_promoted {
                return Ok(cache.cursor.clone());
            }
        }

        let expected = &self.shared.expected;
        let State {
            corpus_results,
            shortcuts,
            promoted_corpora,
            ..
        } = &mut *state;

        // Stable sort: corpora missing from the ranking keep arrival order
        let mut ranked: Vec<&mut CorpusResult> = corpus_results.iter_mut().collect();
        ranked.sort_by_key(|r| {
            expected
                .iter()
                .position(|name| name == r.corpus())
                .unwrap_or(usize::MAX)
        });

        let mut out = ListSuggestionCursor::new(self.shared.query.clone());
        promoter.promote(
            shortcuts
                .as_mut()
                .map(|s| &mut **s as &mut dyn SuggestionCursor),
            &mut ranked,
            max_promoted,
            &mut out,
            promoted_corpora,
        );

        tracing::trace!(
            "Query {}: promoted {} suggestions",
            self.shared.id,
            out.count()
        );

        state.promoted = Some(PromotedCache {
            promoter: promoter.clone(),
            max_promoted,
            cursor: out.clone(),
        });
        Ok(out)
    }

    /// Resolves once every expected corpus has reported
    ///
    /// Results from corpora outside the expected set do not count.
    pub async fn wait_until_done(&self) -> Result<()> {
        let mut done_rx = {
            self.shared.ensure_open()?;
            self.shared.done_tx.subscribe()
        };

        done_rx
            .wait_for(|done| *done)
            .await
            .map(|_| ())
            .map_err(|_| QsbError::illegal_state("suggestions dropped while waiting"))
    }

    /// Subscribe to change notifications
    pub fn register_observer(&self, observer: Observer) -> Result<ObserverId> {
        self.shared.ensure_open()?;
        Ok(self.shared.lock_observers().register(observer))
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.shared.lock_observers().unregister(id)
    }

    /// Take another counted handle
    pub fn acquire(&self) -> Result<Suggestions> {
        self.shared.ensure_open()?;
        self.shared.holders.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            shared: self.shared.clone(),
            released: AtomicBool::new(false),
        })
    }

    /// Give up this handle. Idempotent per handle.
    ///
    /// Releasing the last handle closes every corpus result and the shortcut
    /// cursor; later reads through any handle fail with `IllegalState`.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.shared.holders.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.close();
        }
    }

    /// Whether the aggregate has been fully released
    pub fn is_closed(&self) -> bool {
        self.shared.lock_state().closed
    }
}

impl std::fmt::Debug for Suggestions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suggestions")
            .field("id", &self.shared.id)
            .field("query", &self.shared.query)
            .field("expected", &self.shared.expected)
            .finish()
    }
}
