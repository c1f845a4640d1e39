//! Session store capability.
//!
//! The guard and accessor never touch ambient global state; they read and
//! write through an injected [`SessionStore`]. Two implementations are
//! provided: an in-memory store for deterministic tests and a file-backed
//! store that survives process restarts, one file per key under a session
//! directory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use super::principal::Principal;

/// Well-known key under which the serialized principal lives.
pub const USER_KEY: &str = "user";

/// Read and decode the stored principal.
///
/// A value that fails to deserialize reads as absent; the serde error is
/// logged at debug level and nothing else observable differs.
pub fn stored_principal(store: &dyn SessionStore) -> Option<Principal> {
    let raw = store.get(USER_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(error = %e, "stored principal failed to decode, treating as absent");
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key: {0}")]
    InvalidKey(String),
    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value contract backing a session.
///
/// Reads are single-shot snapshots; a read failure is indistinguishable from
/// absence on purpose, so callers above never branch on store errors when
/// deciding access.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store used as the deterministic test double and for tooling
/// that has no durable session (single process, no restarts).
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Durable store: one file per key under `root`.
///
/// Keys are plain tokens ("user", "csrf", ...); anything that could escape
/// the session directory is rejected.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove the entire session directory. Missing directory is fine.
    pub fn destroy(&self) -> Result<(), StoreError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let ok = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = match self.key_path(key) {
            Ok(p) => p,
            Err(e) => {
                debug!(key, error = %e, "session store read with invalid key");
                return None;
            }
        };
        match std::fs::read_to_string(&path) {
            Ok(v) => Some(v),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                debug!(key, error = %e, "session store read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get(USER_KEY), None);
        store.set(USER_KEY, "{}").unwrap();
        assert_eq!(store.get(USER_KEY).as_deref(), Some("{}"));
        store.remove(USER_KEY).unwrap();
        assert_eq!(store.get(USER_KEY), None);
        // removing again is a no-op
        store.remove(USER_KEY).unwrap();
    }

    #[test]
    fn file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("sess-1");
        {
            let store = FileSessionStore::new(&root);
            store.set(USER_KEY, "payload").unwrap();
        }
        let reopened = FileSessionStore::new(&root);
        assert_eq!(reopened.get(USER_KEY).as_deref(), Some("payload"));
        reopened.destroy().unwrap();
        assert_eq!(reopened.get(USER_KEY), None);
        // destroy is idempotent
        reopened.destroy().unwrap();
    }

    #[test]
    fn file_store_rejects_traversal_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().join("sess-2"));
        assert!(store.set("../escape", "x").is_err());
        assert!(store.set("", "x").is_err());
        assert_eq!(store.get("../escape"), None);
    }
}
