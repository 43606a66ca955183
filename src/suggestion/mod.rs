//! Suggestion records and the cursors that expose them
//!
//! A [`Suggestion`] is one immutable candidate answer. Cursors hand out shared
//! references (`Arc<Suggestion>`) so wrapping, merging and promoting never copy
//! records.

mod cursor;
mod list;

pub use cursor::SuggestionCursor;
pub use list::ListSuggestionCursor;

use serde::{Deserialize, Serialize};

/// Shortcut id marking a suggestion that must never be stored as a shortcut
pub const NEVER_MAKE_SHORTCUT: &str = "_-1";

/// How to launch or act on a suggestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl SuggestionAction {
    /// Stable dedup key: `action#data#query`, missing fields rendered empty
    pub fn key(&self) -> String {
        format!(
            "{}#{}#{}",
            self.action.as_deref().unwrap_or_default(),
            self.data.as_deref().unwrap_or_default(),
            self.query.as_deref().unwrap_or_default()
        )
    }
}

/// A single suggestion produced by a source or read back from shortcut history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Name of the source that produced this suggestion
    pub source: String,

    /// Primary display text
    pub text1: String,

    /// Secondary display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text2: Option<String>,

    /// Icon references, resolved by the presentation layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon2: Option<String>,

    /// Action descriptor
    #[serde(default)]
    pub action: SuggestionAction,

    /// Shortcut identifier used to refresh a stored shortcut
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_id: Option<String>,

    /// Display format tag (e.g. "html")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// True when the suggestion comes from shortcut/history storage
    #[serde(default)]
    pub is_shortcut: bool,
}

impl Suggestion {
    /// Create a suggestion with only a source and a primary text
    pub fn new(source: impl Into<String>, text1: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text1: text1.into(),
            text2: None,
            icon1: None,
            icon2: None,
            action: SuggestionAction::default(),
            shortcut_id: None,
            format: None,
            is_shortcut: false,
        }
    }

    pub fn with_text2(mut self, text2: impl Into<String>) -> Self {
        self.text2 = Some(text2.into());
        self
    }

    pub fn with_icons(mut self, icon1: Option<String>, icon2: Option<String>) -> Self {
        self.icon1 = icon1;
        self.icon2 = icon2;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action.action = Some(action.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.action.data = Some(data.into());
        self
    }

    pub fn with_extra_data(mut self, extra_data: impl Into<String>) -> Self {
        self.action.extra_data = Some(extra_data.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.action.query = Some(query.into());
        self
    }

    pub fn with_shortcut_id(mut self, shortcut_id: impl Into<String>) -> Self {
        self.shortcut_id = Some(shortcut_id.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Mark as coming from shortcut history
    pub fn as_shortcut(mut self) -> Self {
        self.is_shortcut = true;
        self
    }

    /// Stable dedup key derived from the action descriptor
    pub fn key(&self) -> String {
        self.action.key()
    }

    /// Whether this suggestion may be stored as a shortcut
    pub fn is_shortcut_candidate(&self) -> bool {
        self.shortcut_id.as_deref() != Some(NEVER_MAKE_SHORTCUT)
    }
}
