use super::{Suggestion, SuggestionCursor};
use crate::error::{QsbError, Result};
use std::sync::Arc;

/// Cursor backed by a list of shared suggestion records
///
/// Built once by appending references, then handed out for reading. Cloning
/// shares the records but gives the clone its own position.
#[derive(Debug, Clone, Default)]
pub struct ListSuggestionCursor {
    user_query: String,
    suggestions: Vec<Arc<Suggestion>>,
    position: Option<usize>,
    closed: bool,
}

impl ListSuggestionCursor {
    /// Create an empty cursor for `user_query`
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Self::default()
        }
    }

    /// Create a cursor owning `suggestions`
    pub fn from_suggestions(
        user_query: impl Into<String>,
        suggestions: impl IntoIterator<Item = Suggestion>,
    ) -> Self {
        let mut cursor = Self::new(user_query);
        cursor.extend(suggestions.into_iter().map(Arc::new));
        cursor
    }

    /// Append a record
    pub fn push(&mut self, suggestion: Arc<Suggestion>) {
        self.suggestions.push(suggestion);
    }

    pub fn extend(&mut self, suggestions: impl IntoIterator<Item = Arc<Suggestion>>) {
        self.suggestions.extend(suggestions);
    }

    /// Iterate records without touching the position
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Suggestion>> {
        self.suggestions.iter()
    }

    /// Record at `position` without touching the cursor position
    pub fn get(&self, position: usize) -> Option<&Arc<Suggestion>> {
        self.suggestions.get(position)
    }
}

impl SuggestionCursor for ListSuggestionCursor {
    fn user_query(&self) -> &str {
        &self.user_query
    }

    fn count(&self) -> usize {
        self.suggestions.len()
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn move_to(&mut self, position: usize) -> Result<()> {
        if self.closed {
            return Err(QsbError::illegal_state("cursor is closed"));
        }
        if position >= self.suggestions.len() {
            return Err(QsbError::OutOfRange {
                position,
                count: self.suggestions.len(),
            });
        }
        self.position = Some(position);
        Ok(())
    }

    fn current(&self) -> Result<&Arc<Suggestion>> {
        if self.closed {
            return Err(QsbError::illegal_state("cursor is closed"));
        }
        self.position
            .and_then(|p| self.suggestions.get(p))
            .ok_or_else(|| QsbError::illegal_state("cursor is not positioned"))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
