use std::sync::Arc;

/// Handle returned by `register_observer`, used to unregister
pub type ObserverId = u64;

/// Change notification fired by a `Suggestions` aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionsEvent {
    /// A corpus reported its result; `done` is true once all expected corpora have
    CorpusResultAdded { corpus: String, done: bool },
    /// The shortcut cursor was attached or replaced
    ShortcutsChanged,
}

/// Observer callback, invoked synchronously on the mutating context
pub type Observer = Arc<dyn Fn(&SuggestionsEvent) + Send + Sync>;

/// Explicit per-aggregate observer registry
#[derive(Default)]
pub(super) struct ObserverRegistry {
    next_id: ObserverId,
    observers: Vec<(ObserverId, Observer)>,
}

impl ObserverRegistry {
    pub(super) fn register(&mut self, observer: Observer) -> ObserverId {
        self.next_id += 1;
        self.observers.push((self.next_id, observer));
        self.next_id
    }

    pub(super) fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Callbacks to invoke, cloned so they can run without the registry lock
    pub(super) fn snapshot(&self) -> Vec<Observer> {
        self.observers.iter().map(|(_, o)| o.clone()).collect()
    }

    pub(super) fn clear(&mut self) {
        self.observers.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.observers.len()
    }
}
