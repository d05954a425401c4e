//! Session state management.
//!
//! This module provides:
//! - `SessionManager`: the single authoritative holder of authentication
//!   state, with observer notification and a boolean failure boundary
//! - `StorageBackend`: the injected key-value store the session mirrors
//!   into, with memory, file, and OS-keychain implementations
//!
//! Session state survives restarts through the storage backend and is
//! reconciled at startup via `SessionManager::check_auth`.

pub mod manager;
pub mod storage;

pub use manager::{SessionManager, Subscription};
pub use storage::{
    FileStore, KeyringStore, MemoryStore, StorageBackend, StorageError, CREDITS_KEY, TOKEN_KEY,
    USER_KEY,
};
