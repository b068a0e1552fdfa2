//! The storage primitive behind [`Preferences`](crate::Preferences).

use crate::error::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// A key-value backend addressed by `(namespace, key)`.
///
/// Each call is atomic for the single key it touches. Nothing is promised
/// across keys; callers that maintain cross-key invariants order their writes.
pub trait PreferenceBackend: Send + Sync {
    /// Reads a value, `None` if the key was never written or was removed.
    fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn put(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()>;

    /// Removes a value. Removing a missing key is not an error.
    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()>;
}

/// In-memory backend. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryPreferences {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across all namespaces.
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceBackend for MemoryPreferences {
    fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> StorageResult<()> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
