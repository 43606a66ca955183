//! Per-source query gating
//!
//! Decides whether a source is worth querying for a query string, using the
//! source's minimum query length and a memory of queries that previously
//! returned nothing.

use crate::corpus::Source;
use ahash::{HashMap, HashMapExt};
use std::sync::Mutex;

/// Stateful gate shared by every query issued through a provider
///
/// For each source it remembers the shortest query that produced zero results.
/// Any later query extending that prefix is suppressed until the user edits
/// the query back to something strictly shorter.
#[derive(Debug, Default)]
pub struct ShouldQueryStrategy {
    /// Source name -> shortest zero-result query
    empty_prefixes: Mutex<HashMap<String, String>>,
}

impl ShouldQueryStrategy {
    pub fn new() -> Self {
        Self {
            empty_prefixes: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `source` should be queried for `query`
    pub fn should_query(&self, source: &dyn Source, query: &str) -> bool {
        if source.query_after_zero_results() {
            return true;
        }

        if query.chars().count() < source.query_threshold() {
            tracing::trace!(
                "Skipping {}: query {:?} below threshold {}",
                source.name(),
                query,
                source.query_threshold()
            );
            return false;
        }

        let prefixes = self.lock();
        match prefixes.get(source.name()) {
            Some(prefix) if query.starts_with(prefix.as_str()) => {
                tracing::trace!(
                    "Skipping {}: {:?} returned no results before",
                    source.name(),
                    prefix
                );
                false
            }
            _ => true,
        }
    }

    /// Record that `query` produced no results from `source`
    pub fn on_zero_results(&self, source: &dyn Source, query: &str) {
        if source.query_after_zero_results() || query.is_empty() {
            return;
        }

        let mut prefixes = self.lock();
        match prefixes.get_mut(source.name()) {
            // Already covered by a shorter zero-result prefix
            Some(prefix) if query.starts_with(prefix.as_str()) => {}
            Some(prefix) => {
                tracing::debug!(
                    "Zero results from {} for {:?}, replacing {:?}",
                    source.name(),
                    query,
                    prefix
                );
                *prefix = query.to_string();
            }
            None => {
                tracing::debug!("Zero results from {} for {:?}", source.name(), query);
                prefixes.insert(source.name().to_string(), query.to_string());
            }
        }
    }

    /// The recorded zero-result prefix for `source_name`, if any
    pub fn zero_result_prefix(&self, source_name: &str) -> Option<String> {
        self.lock().get(source_name).cloned()
    }

    /// Forget the history of one source
    pub fn clear_source(&self, source_name: &str) {
        self.lock().remove(source_name);
    }

    /// Forget all zero-result history
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.empty_prefixes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
