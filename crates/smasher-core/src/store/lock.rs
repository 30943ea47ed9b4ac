//! Per-key locking for whole-value read-modify-write
//!
//! Each stored key holds an entire collection, so every mutation is "read
//! all, change, write all". Without coordination two overlapping updates
//! race and the later write silently discards the earlier one. A
//! [`Transaction`] holds the key's lock from the read until it is dropped,
//! which serializes updates made through the same [`KeyLocks`].
//!
//! Writers that bypass the lock (or use a different `KeyLocks`) still get
//! last-writer-wins behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::KeyValueStore;
use crate::error::Result;

/// Registry of async locks, one per store key
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Exclusive read-modify-write session on one store key
pub struct Transaction<'a> {
    store: &'a dyn KeyValueStore,
    key: &'a str,
    _guard: OwnedMutexGuard<()>,
}

impl<'a> Transaction<'a> {
    /// Lock `key` and start a transaction on it
    pub async fn begin(store: &'a dyn KeyValueStore, locks: &KeyLocks, key: &'a str) -> Self {
        let guard = locks.lock(key).await;
        Self {
            store,
            key,
            _guard: guard,
        }
    }

    /// Read and decode the current value, or `T::default()` if the key is unset
    pub async fn read<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        read_value(self.store, self.key).await
    }

    /// Encode and store `value`, replacing whatever was there
    pub async fn write<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.store.set(self.key, value).await?;
        Ok(())
    }

    /// Remove the key entirely
    pub async fn remove(&self) -> Result<()> {
        self.store.remove(self.key).await?;
        Ok(())
    }
}

/// Unlocked read of a typed value
pub(crate) async fn read_value<T>(store: &dyn KeyValueStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(T::default()),
    }
}
