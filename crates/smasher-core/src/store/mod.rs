//! Key-value store layer
//!
//! Everything Link Smasher persists lives under a handful of string keys,
//! each holding one JSON value that is read and written as a whole:
//!
//! - `links`: the full link collection (JSON array)
//! - `shortcuts`: the shortcut override map (JSON object)
//!
//! Backends implement [`KeyValueStore`]. Callers that read-modify-write a key
//! go through a [`Transaction`], which holds the per-key lock from
//! [`KeyLocks`] for the duration of the update.

mod error;
mod file;
mod lock;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use lock::{KeyLocks, Transaction};
pub(crate) use lock::read_value;
pub use memory::MemoryStore;

/// Store keys
pub mod keys {
    pub const LINKS: &str = "links";
    pub const SHORTCUTS: &str = "shortcuts";
}

/// Async persistent store keyed by string
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}
