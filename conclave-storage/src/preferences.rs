//! Namespaced, typed view over a [`PreferenceBackend`].

use crate::backend::PreferenceBackend;
use crate::error::{StorageError, StorageResult};
use std::fmt;
use std::sync::Arc;

/// A handle onto one namespace of a preference backend.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct Preferences {
    backend: Arc<dyn PreferenceBackend>,
    namespace: String,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    /// Scopes `backend` to `namespace`.
    pub fn new(backend: Arc<dyn PreferenceBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// The namespace all keys are stored under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Reads a string value.
    pub fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        self.backend.get(&self.namespace, key)
    }

    /// Reads a string value, falling back to `default` when unset.
    pub fn get_string_or(&self, key: &str, default: &str) -> StorageResult<String> {
        Ok(self
            .get_string(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Writes a string value.
    pub fn put_string(&self, key: &str, value: &str) -> StorageResult<()> {
        self.backend.put(&self.namespace, key, value)
    }

    /// Reads an unsigned integer, falling back to `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidData`] if the stored text is not a `u32`.
    pub fn get_u32_or(&self, key: &str, default: u32) -> StorageResult<u32> {
        match self.get_string(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                StorageError::InvalidData(format!(
                    "{}/{key}: expected an unsigned integer, found {raw:?}",
                    self.namespace
                ))
            }),
        }
    }

    /// Writes an unsigned integer.
    pub fn put_u32(&self, key: &str, value: u32) -> StorageResult<()> {
        self.put_string(key, &value.to_string())
    }

    /// Removes a key from this namespace.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.backend.remove(&self.namespace, key)
    }
}
