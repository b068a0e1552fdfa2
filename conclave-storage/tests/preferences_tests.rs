use conclave_storage::{
    MemoryPreferences, PreferenceBackend, Preferences, SqlitePreferences, StorageError,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn memory_prefs(namespace: &str) -> Preferences {
    Preferences::new(Arc::new(MemoryPreferences::new()), namespace)
}

// ── MemoryPreferences ───────────────────────────────────────────

#[test]
fn memory_get_missing_is_none() {
    let backend = MemoryPreferences::new();
    assert_eq!(backend.get("ns", "missing").unwrap(), None);
    assert!(backend.is_empty());
}

#[test]
fn memory_put_then_get() {
    let backend = MemoryPreferences::new();
    backend.put("ns", "k", "v").unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), Some("v".to_string()));
    assert_eq!(backend.len(), 1);
}

#[test]
fn memory_put_overwrites() {
    let backend = MemoryPreferences::new();
    backend.put("ns", "k", "one").unwrap();
    backend.put("ns", "k", "two").unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), Some("two".to_string()));
    assert_eq!(backend.len(), 1);
}

#[test]
fn memory_namespaces_are_isolated() {
    let backend = MemoryPreferences::new();
    backend.put("a", "k", "from-a").unwrap();
    backend.put("b", "k", "from-b").unwrap();
    assert_eq!(backend.get("a", "k").unwrap(), Some("from-a".to_string()));
    assert_eq!(backend.get("b", "k").unwrap(), Some("from-b".to_string()));
}

#[test]
fn memory_remove_missing_is_ok() {
    let backend = MemoryPreferences::new();
    backend.remove("ns", "nothing").unwrap();
    backend.put("ns", "k", "v").unwrap();
    backend.remove("ns", "k").unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), None);
}

// ── SqlitePreferences ───────────────────────────────────────────

#[test]
fn sqlite_in_memory_roundtrip() {
    let backend = SqlitePreferences::open_in_memory().unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), None);
    backend.put("ns", "k", "v").unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), Some("v".to_string()));
    backend.put("ns", "k", "w").unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), Some("w".to_string()));
    backend.remove("ns", "k").unwrap();
    assert_eq!(backend.get("ns", "k").unwrap(), None);
}

#[test]
fn sqlite_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.db");

    {
        let backend = SqlitePreferences::open(&path).unwrap();
        backend.put("conclave", "status", "PENDING").unwrap();
    }

    let reopened = SqlitePreferences::open(&path).unwrap();
    assert_eq!(
        reopened.get("conclave", "status").unwrap(),
        Some("PENDING".to_string())
    );
}

#[test]
fn sqlite_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("prefs.db");
    let backend = SqlitePreferences::open(&path).unwrap();
    backend.put("ns", "k", "v").unwrap();
    assert!(path.exists());
}

#[test]
fn sqlite_clones_share_connection() {
    let backend = SqlitePreferences::open_in_memory().unwrap();
    let clone = backend.clone();
    backend.put("ns", "k", "shared").unwrap();
    assert_eq!(clone.get("ns", "k").unwrap(), Some("shared".to_string()));
}

// ── Preferences handle ──────────────────────────────────────────

#[test]
fn preferences_namespace() {
    let prefs = memory_prefs("conclave");
    assert_eq!(prefs.namespace(), "conclave");
}

#[test]
fn preferences_string_default() {
    let prefs = memory_prefs("ns");
    assert_eq!(prefs.get_string_or("missing", "fallback").unwrap(), "fallback");
    prefs.put_string("present", "value").unwrap();
    assert_eq!(prefs.get_string_or("present", "fallback").unwrap(), "value");
}

#[test]
fn preferences_u32_default_and_roundtrip() {
    let prefs = memory_prefs("ns");
    assert_eq!(prefs.get_u32_or("count", 7).unwrap(), 7);
    prefs.put_u32("count", 3).unwrap();
    assert_eq!(prefs.get_u32_or("count", 7).unwrap(), 3);
    prefs.put_u32("count", 0).unwrap();
    assert_eq!(prefs.get_u32_or("count", 7).unwrap(), 0);
}

#[test]
fn preferences_u32_rejects_garbage() {
    let prefs = memory_prefs("ns");
    prefs.put_string("count", "minus one").unwrap();
    let err = prefs.get_u32_or("count", 1).unwrap_err();
    assert!(matches!(err, StorageError::InvalidData(_)));
    assert!(format!("{err}").contains("ns/count"));
}

#[test]
fn preferences_u32_rejects_negative() {
    let prefs = memory_prefs("ns");
    prefs.put_string("count", "-1").unwrap();
    assert!(prefs.get_u32_or("count", 1).is_err());
}

#[test]
fn preferences_share_backend_across_namespaces() {
    let backend: Arc<dyn PreferenceBackend> = Arc::new(MemoryPreferences::new());
    let a = Preferences::new(backend.clone(), "a");
    let b = Preferences::new(backend.clone(), "b");
    a.put_string("k", "1").unwrap();
    assert_eq!(b.get_string("k").unwrap(), None);
    assert_eq!(backend.get("a", "k").unwrap(), Some("1".to_string()));
}

#[test]
fn preferences_remove() {
    let prefs = memory_prefs("ns");
    prefs.put_string("k", "v").unwrap();
    prefs.remove("k").unwrap();
    assert_eq!(prefs.get_string("k").unwrap(), None);
}

#[test]
fn preferences_debug_shows_namespace() {
    let prefs = memory_prefs("conclave");
    assert!(format!("{prefs:?}").contains("conclave"));
}

#[test]
fn default_database_path_is_under_conclave() {
    if let Some(path) = conclave_storage::default_database_path() {
        assert!(path.ends_with("conclave/preferences.db"));
    }
}

#[test]
fn error_display() {
    let err = StorageError::InvalidData("bad".into());
    assert!(format!("{err}").contains("invalid data"));
    assert!(format!("{}", StorageError::Poisoned).contains("poisoned"));
}
