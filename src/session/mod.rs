//! Session persistence and state.
//!
//! Provides the `KeyValueStore` trait for pluggable durable storage, an
//! in-memory backend for tests and ephemeral runs, a JSON file backend that
//! survives restarts, and the `SessionStore` that owns the live session.

pub mod file;
pub mod memory;
pub mod store;

use crate::config::Config;
use crate::error::StorageError;

/// Storage key holding the JSON-serialized `UserIdentity`.
pub const IDENTITY_KEY: &str = "session.identity";
/// Storage key holding the opaque bearer token.
pub const TOKEN_KEY: &str = "session.token";

/// Minimal durable key-value storage.
///
/// Implementations must be `Send + Sync`; the session store shares them with
/// its background reconciliation task.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Write a value, replacing any previous one.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str)
    -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

/// Type-erased store selected by configuration.
///
/// `KeyValueStore` uses RPITIT and is not object-safe, so this enum
/// dispatches manually.
pub enum AnyStore {
    Memory(memory::MemoryStore),
    File(file::FileStore),
}

impl AnyStore {
    pub fn from_config(config: &Config) -> Self {
        if config.storage_backend == "memory" {
            tracing::info!("Using in-memory session storage");
            AnyStore::Memory(memory::MemoryStore::new())
        } else {
            let store = file::FileStore::new(&config.storage_path);
            tracing::info!(path = %store.path().display(), "Using file session storage");
            AnyStore::File(store)
        }
    }
}

impl KeyValueStore for AnyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            AnyStore::Memory(s) => s.get(key).await,
            AnyStore::File(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            AnyStore::Memory(s) => s.set(key, value).await,
            AnyStore::File(s) => s.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self {
            AnyStore::Memory(s) => s.remove(key).await,
            AnyStore::File(s) => s.remove(key).await,
        }
    }
}

impl<T: KeyValueStore> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}

/// Normalize a raw stored value.
///
/// Missing, blank, and the literal strings `"undefined"` / `"null"` (left
/// behind by careless serialization) all mean "no value".
pub fn normalize_stored(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    match raw.trim() {
        "" | "undefined" | "null" => None,
        _ => Some(raw),
    }
}
