use super::{Suggestion, SuggestionAction};
use crate::error::Result;
use std::sync::Arc;

/// Positionable, read-only view over an ordered sequence of suggestions
///
/// Position is explicit cursor state: call [`move_to`](Self::move_to) before
/// reading fields. Field accessors fail with `IllegalState` when the cursor is
/// closed or has not been positioned yet. Positions are unsigned, and
/// `move_to` rejects anything at or past [`count`](Self::count) with
/// `OutOfRange` instead of clamping.
pub trait SuggestionCursor: Send {
    /// The user query these suggestions answer
    fn user_query(&self) -> &str;

    /// Number of records
    fn count(&self) -> usize;

    /// Current position, if the cursor has been positioned
    fn position(&self) -> Option<usize>;

    /// Move to `position`
    fn move_to(&mut self, position: usize) -> Result<()>;

    /// Record at the current position
    fn current(&self) -> Result<&Arc<Suggestion>>;

    /// Release resources. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn source_name(&self) -> Result<&str> {
        Ok(&self.current()?.source)
    }

    fn text1(&self) -> Result<&str> {
        Ok(&self.current()?.text1)
    }

    fn text2(&self) -> Result<Option<&str>> {
        Ok(self.current()?.text2.as_deref())
    }

    fn icon1(&self) -> Result<Option<&str>> {
        Ok(self.current()?.icon1.as_deref())
    }

    fn icon2(&self) -> Result<Option<&str>> {
        Ok(self.current()?.icon2.as_deref())
    }

    fn action(&self) -> Result<&SuggestionAction> {
        Ok(&self.current()?.action)
    }

    fn shortcut_id(&self) -> Result<Option<&str>> {
        Ok(self.current()?.shortcut_id.as_deref())
    }

    fn format(&self) -> Result<Option<&str>> {
        Ok(self.current()?.format.as_deref())
    }

    fn is_shortcut(&self) -> Result<bool> {
        Ok(self.current()?.is_shortcut)
    }

    fn key(&self) -> Result<String> {
        Ok(self.current()?.key())
    }
}
