//! Durable key-value storage for the client session.
//!
//! This module provides:
//! - `Storage`: the synchronous get/set/delete contract the session store persists through
//! - `FileStorage`: one file per key inside a directory (survives restarts)
//! - `MemoryStorage`: a shared in-process map, used by tests and ephemeral clients
//!
//! Storage is scoped to one client installation. Several stores may share it,
//! each re-reading it on demand; no change notification is provided.

pub mod file;
pub mod memory;

use thiserror::Error;

pub use file::FileStorage;
pub use memory::MemoryStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Stored value under {key:?} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Synchronous key-value store for string values.
pub trait Storage {
    /// Read the value under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }
}

/// Keys are limited to characters that are safe as file names on every platform.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
