//! Persisted key-value preferences for Conclave.
//!
//! Stores small string values grouped by namespace. The entitlement gate keeps
//! its first-run marker, trial counter and status here.
//!
//! # Architecture
//!
//! - [`PreferenceBackend`] is the storage primitive: atomic get/put/remove of a
//!   single `(namespace, key)` value
//! - [`MemoryPreferences`] keeps values in process memory (tests, ephemeral hosts)
//! - [`SqlitePreferences`] persists values in a SQLite file
//! - [`Preferences`] is a namespaced handle with typed accessors

mod backend;
mod error;
mod preferences;
mod sqlite;

pub use backend::{MemoryPreferences, PreferenceBackend};
pub use error::{StorageError, StorageResult};
pub use preferences::Preferences;
pub use sqlite::SqlitePreferences;

/// Default location of the preference database: `<data dir>/conclave/preferences.db`.
///
/// Returns `None` when the platform has no notion of a per-user data directory.
#[must_use]
pub fn default_database_path() -> Option<std::path::PathBuf> {
    dirs::data_dir().map(|dir| dir.join("conclave").join("preferences.db"))
}
