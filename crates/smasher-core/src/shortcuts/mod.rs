//! Keyboard shortcuts
//!
//! - `combo`: key chords, their text syntax, and key-down events
//! - `bindings`: the configurable shortcut set and its persisted overrides
//! - `registry`: runtime dispatch of key-down events to handlers

mod bindings;
mod combo;
mod registry;

use thiserror::Error;

pub use bindings::{ShortcutConfigStore, ShortcutDef, ShortcutId};
pub use combo::{KeyCombo, KeyEvent};
pub use registry::{KeyHandler, Registration, Shortcut, ShortcutRegistry};

/// Errors from parsing or registering shortcuts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortcutError {
    /// Another shortcut already owns this chord
    #[error("{signature} is already bound{}", owner_suffix(.existing))]
    Conflict {
        signature: String,
        existing: Option<String>,
    },

    #[error("Shortcut has no key")]
    MissingKey,

    #[error("Unsupported modifier: {0}")]
    UnsupportedModifier(String),
}

fn owner_suffix(existing: &Option<String>) -> String {
    match existing {
        Some(id) => format!(" to {}", id),
        None => String::new(),
    }
}
