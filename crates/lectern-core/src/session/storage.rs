//! Injected key-value storage behind the session manager.
//!
//! The session mirrors three string-keyed slots (`user`, `token`, `credits`)
//! into whichever backend it was constructed with, so the manager is testable
//! without touching the real filesystem or keychain.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use keyring::Entry;
use thiserror::Error;

/// Persisted slot for the authenticated username.
pub const USER_KEY: &str = "user";

/// Persisted slot for the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Persisted slot for the cached credit balance.
pub const CREDITS_KEY: &str = "credits";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// String-keyed persistent storage. Reads and writes are synchronous.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process store with no persistence. The test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock_entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock_entries().remove(key);
        Ok(())
    }
}

/// JSON map written through to a single file, created with restricted
/// permissions (0600) on unix.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store backed by the given file, loading any existing contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            file.write_all(contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        std::fs::write(&self.path, contents)?;

        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock_entries();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.lock_entries();
        entries.remove(key);
        self.flush(&entries)
    }
}

/// One OS-keychain entry per key, under a fixed service name.
#[derive(Debug)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl StorageBackend for KeyringStore {
    fn get(&self, key: &str) -> Option<String> {
        let entry = Entry::new(&self.service, key).ok()?;
        entry.get_password().ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        // Removing an absent key is not an error.
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(USER_KEY), None);

        store.set(USER_KEY, "alice").unwrap();
        assert_eq!(store.get(USER_KEY).as_deref(), Some("alice"));

        store.remove(USER_KEY).unwrap();
        assert_eq!(store.get(USER_KEY), None);
        // Removing again is a no-op.
        store.remove(USER_KEY).unwrap();
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path).unwrap();
        store.set(USER_KEY, "bob").unwrap();
        store.set(TOKEN_KEY, "t2").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(USER_KEY).as_deref(), Some("bob"));
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("t2"));

        reopened.remove(TOKEN_KEY).unwrap();
        drop(reopened);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY), None);
        assert_eq!(reopened.get(USER_KEY).as_deref(), Some("bob"));
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("session.json");

        let store = FileStore::open(&path).unwrap();
        store.set(CREDITS_KEY, "5").unwrap();
        assert!(path.exists());
    }
}
