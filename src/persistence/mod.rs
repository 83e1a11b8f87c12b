//! Session-scoped state persistence boundary.
//!
//! State machines stay storage-agnostic: they serialize themselves to
//! JSON blobs and hand them to a [`StateStore`] after every transition,
//! and read them back once at startup to rehydrate. The memory backend
//! models tab-session storage; the SQLite backend is the durable scope.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

#[cfg(feature = "sqlite-persistence")]
pub mod sqlite;


#[cfg(feature = "sqlite-persistence")]
pub use sqlite::{SqliteConfig, SqlitePath, SqliteStateStore};

/// Storage key for the diagnostic-assessment state blob.
pub const DIAGNOSTIC_STATE_KEY: &str = "diagnostic.assessment";

/// Storage key for the assigned-teacher persona selection.
pub const PERSONA_STATE_KEY: &str = "persona.assignment";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Scoped key/value storage for serialized client state.
pub trait StateStore: Send + Sync {
    fn put(&self, key: &str, blob: &str) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

/// Removes every session-scoped key. Invoked on logout, so diagnostic
/// progress and persona assignment disappear together.
pub fn clear_session_state(store: &dyn StateStore) -> Result<(), StorageError> {
    store.remove(DIAGNOSTIC_STATE_KEY)?;
    store.remove(PERSONA_STATE_KEY)?;
    Ok(())
}

/// In-process backend with tab-session lifetime.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl StateStore for MemoryStateStore {
    fn put(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;

    #[test]
    fn put_get_remove_round_trip() {
        let store = MemoryStateStore::default();
        store.put("k", "{\"a\":1}").expect("put should succeed");
        assert_eq!(
            store.get("k").expect("get should succeed").as_deref(),
            Some("{\"a\":1}")
        );

        store.remove("k").expect("remove should succeed");
        assert_eq!(store.get("k").expect("get should succeed"), None);
    }

    #[test]
    fn clear_session_state_removes_both_keys() {
        let store = MemoryStateStore::default();
        store.put(DIAGNOSTIC_STATE_KEY, "{}").expect("put diagnostic");
        store.put(PERSONA_STATE_KEY, "{}").expect("put persona");
        store.put("unrelated", "{}").expect("put unrelated");

        clear_session_state(&store).expect("clear should succeed");

        assert_eq!(store.get(DIAGNOSTIC_STATE_KEY).expect("get"), None);
        assert_eq!(store.get(PERSONA_STATE_KEY).expect("get"), None);
        assert!(store.get("unrelated").expect("get").is_some());
    }
}
