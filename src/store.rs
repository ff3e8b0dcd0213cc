//! Persistence boundary. The engine never touches physical storage; callers
//! implement [`StateStore`] over their database, file system, or cache and
//! move exported state strings through it.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Key-value storage for exported learner state.
pub trait StateStore {
    fn load(&self, learner_id: &str) -> Result<Option<String>, StoreError>;
    fn save(&mut self, learner_id: &str, state: &str) -> Result<(), StoreError>;
}

/// In-memory reference implementation, useful in tests and single-process
/// embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, learner_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(learner_id).cloned())
    }

    fn save(&mut self, learner_id: &str, state: &str) -> Result<(), StoreError> {
        self.entries.insert(learner_id.to_string(), state.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load("u1").unwrap(), None);
        store.save("u1", "{\"version\":1}").unwrap();
        assert_eq!(store.load("u1").unwrap().as_deref(), Some("{\"version\":1}"));
        assert_eq!(store.len(), 1);
    }
}
