//! Handle registries
//!
//! Identifier-keyed maps of the producers and consumers a session owns.
//! Used for lookup, removal and bulk teardown only.

use std::future::Future;

use dashmap::DashMap;
use tracing::warn;

pub struct Registry<T> {
    entries: DashMap<String, T>,
}

impl<T: Clone> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, id: impl Into<String>, value: T) -> Option<T> {
        self.entries.insert(id.into(), value)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<T> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.entries.remove(id).map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Owned copy of the current entries. Closing an entry removes it from
    /// the map, so teardown walks this copy rather than the map itself.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    /// First entry matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.entries
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a close routine raised by an engine observer on the current runtime.
pub(crate) fn spawn_detached<F>(what: &'static str, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => warn!(task = what, "No tokio runtime, engine-initiated close dropped"),
    }
}
