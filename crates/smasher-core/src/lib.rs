//! Link Smasher Core Library
//!
//! This crate provides the core of Link Smasher, a bookmark manager that
//! keeps one saved link per URL and drives its surfaces with keyboard
//! shortcuts.
//!
//! # Architecture
//!
//! - **Key-value store**: every collection lives under one key and is read
//!   and written whole; per-key transactions serialize read-modify-write
//! - **Notifier**: change messages are broadcast so other open surfaces can
//!   refresh
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(FileStore::from_config(&Config::load()?));
//! let links = LinkRepository::new(store.clone());
//!
//! // Add (or merge into) a link
//! links.add(LinkInput::new("https://example.com").tags(["rust"])).await?;
//!
//! // Bind shortcuts from the persisted configuration
//! let registry = ShortcutRegistry::new();
//! let defs = ShortcutConfigStore::new(store).get_all().await?;
//! ```
//!
//! # Modules
//!
//! - `links`: Link model, repository, and URL helpers
//! - `shortcuts`: Key combos, runtime registry, and persisted overrides
//! - `message`: Cross-surface change messages
//! - `store`: Key-value store backends and per-key transactions
//! - `config`: Application configuration

pub mod config;
pub mod error;
pub mod links;
pub mod message;
pub mod shortcuts;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use links::{Link, LinkInput, LinkPatch, LinkRepository};
pub use message::{Message, Notifier};
pub use shortcuts::{
    KeyCombo, KeyEvent, Shortcut, ShortcutConfigStore, ShortcutDef, ShortcutError, ShortcutId,
    ShortcutRegistry,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, StorageError};
