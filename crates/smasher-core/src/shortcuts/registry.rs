//! Runtime shortcut dispatch
//!
//! One [`ShortcutRegistry`] owns every live binding of a surface and plays the
//! role of its single key-down listener: the host feeds raw events into
//! [`ShortcutRegistry::handle_key_down`] and the registry runs the handler of
//! the first exact match. The registry is an explicit handle created by the
//! surface root and cleared on teardown; clones share the same table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use super::{KeyCombo, KeyEvent, ShortcutDef, ShortcutError};
use crate::message::Message;

/// Callback run when a shortcut fires
pub type KeyHandler = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// A binding request: chord, handler, and an optional stable id
#[derive(Clone)]
pub struct Shortcut {
    pub id: Option<String>,
    pub combo: KeyCombo,
    handler: KeyHandler,
}

impl Shortcut {
    pub fn new<F>(combo: KeyCombo, handler: F) -> Self
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        Self {
            id: None,
            combo,
            handler: Arc::new(handler),
        }
    }

    /// Attach a stable id so the binding can be updated or removed by name
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl fmt::Debug for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcut")
            .field("id", &self.id)
            .field("combo", &self.combo)
            .finish_non_exhaustive()
    }
}

struct Entry {
    token: u64,
    signature: String,
    id: Option<String>,
    combo: KeyCombo,
    handler: KeyHandler,
}

#[derive(Default)]
struct Inner {
    /// Insertion order is match order
    entries: Vec<Entry>,
    /// id → signature
    by_id: HashMap<String, String>,
    listening: bool,
    next_token: u64,
}

impl Inner {
    fn position_of_signature(&self, signature: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.signature == signature)
    }

    fn position_of_id(&self, id: &str) -> Option<usize> {
        let signature = self.by_id.get(id)?;
        self.position_of_signature(signature)
    }

    fn conflict_at(&self, signature: &str, owner: Option<&str>) -> Option<ShortcutError> {
        let existing = &self.entries[self.position_of_signature(signature)?];
        if owner.is_some() && existing.id.as_deref() == owner {
            return None;
        }
        Some(ShortcutError::Conflict {
            signature: signature.to_string(),
            existing: existing.id.clone(),
        })
    }

    fn push(&mut self, mut entry: Entry) -> u64 {
        if entry.token == 0 {
            self.next_token += 1;
            entry.token = self.next_token;
        }
        if let Some(id) = &entry.id {
            self.by_id.insert(id.clone(), entry.signature.clone());
        }
        let token = entry.token;
        self.entries.push(entry);
        if !self.listening {
            debug!("Key listener attached");
            self.listening = true;
        }
        token
    }

    fn take(&mut self, index: usize) -> Entry {
        let entry = self.entries.remove(index);
        if let Some(id) = &entry.id {
            self.by_id.remove(id);
        }
        self.stop_if_empty();
        entry
    }

    fn stop_if_empty(&mut self) {
        if self.entries.is_empty() && self.listening {
            debug!("Key listener detached");
            self.listening = false;
        }
    }
}

/// Table of live shortcut bindings
#[derive(Clone, Default)]
pub struct ShortcutRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `shortcut`
    ///
    /// Re-registering an id under a new chord replaces its previous binding.
    /// A chord already owned by a different registration is rejected.
    pub fn register(&self, shortcut: Shortcut) -> Result<Registration, ShortcutError> {
        if shortcut.combo.key.is_empty() {
            return Err(ShortcutError::MissingKey);
        }
        let signature = shortcut.combo.signature();

        let mut inner = self.state();
        if let Some(conflict) = inner.conflict_at(&signature, shortcut.id.as_deref()) {
            return Err(conflict);
        }

        if let Some(id) = &shortcut.id {
            if let Some(index) = inner.position_of_id(id) {
                debug!("Replacing binding for {}", id);
                inner.take(index);
            }
        }

        let token = inner.push(Entry {
            token: 0,
            signature,
            id: shortcut.id,
            combo: shortcut.combo,
            handler: shortcut.handler,
        });

        Ok(Registration {
            registry: Arc::downgrade(&self.inner),
            token,
        })
    }

    /// Move the binding registered as `id` to `combo`, keeping its handler
    ///
    /// Returns `Ok(false)` if no binding has that id.
    pub fn update_shortcut(&self, id: &str, combo: KeyCombo) -> Result<bool, ShortcutError> {
        if combo.key.is_empty() {
            return Err(ShortcutError::MissingKey);
        }

        let mut inner = self.state();
        let Some(index) = inner.position_of_id(id) else {
            return Ok(false);
        };

        let signature = combo.signature();
        if let Some(conflict) = inner.conflict_at(&signature, Some(id)) {
            return Err(conflict);
        }

        let mut entry = inner.take(index);
        debug!("Rebinding {} from {} to {}", id, entry.signature, signature);
        entry.signature = signature;
        entry.combo = combo;
        inner.push(entry);
        Ok(true)
    }

    /// Remove the binding registered as `id`
    pub fn unregister_by_id(&self, id: &str) -> bool {
        let mut inner = self.state();
        match inner.position_of_id(id) {
            Some(index) => {
                inner.take(index);
                true
            }
            None => false,
        }
    }

    /// Drop every binding and detach the listener
    pub fn clear(&self) {
        let mut inner = self.state();
        inner.entries.clear();
        inner.by_id.clear();
        inner.stop_if_empty();
    }

    /// Rebind every registered shortcut in `defs` to its effective combo
    ///
    /// All affected bindings are lifted before any is re-inserted, so two
    /// shortcuts can swap chords. A binding whose new chord is taken keeps
    /// its old one when that is still free and is dropped otherwise; the
    /// conflicts are returned.
    pub fn apply_bindings(&self, defs: &[ShortcutDef]) -> Vec<ShortcutError> {
        let mut inner = self.state();

        let mut lifted = Vec::new();
        for def in defs {
            let id = def.id.as_str();
            if let Some(index) = inner.position_of_id(id) {
                let entry = inner.entries.remove(index);
                inner.by_id.remove(id);
                lifted.push((entry, def.effective_combo().clone()));
            }
        }

        let mut errors = Vec::new();
        for (mut entry, combo) in lifted {
            let signature = combo.signature();
            match inner.conflict_at(&signature, entry.id.as_deref()) {
                None => {
                    entry.signature = signature;
                    entry.combo = combo;
                }
                Some(conflict) => {
                    warn!("Cannot rebind: {}", conflict);
                    errors.push(conflict);
                    if inner.position_of_signature(&entry.signature).is_some() {
                        continue;
                    }
                }
            }
            inner.push(entry);
        }

        inner.stop_if_empty();
        errors
    }

    /// Follow a change announced by a [`ShortcutConfigStore`]
    ///
    /// Returns `Ok(false)` for messages that do not concern shortcuts or
    /// name a shortcut that is not registered. A conflict leaves the
    /// binding where it was.
    ///
    /// [`ShortcutConfigStore`]: super::ShortcutConfigStore
    pub fn apply_message(&self, message: &Message) -> Result<bool, ShortcutError> {
        match message {
            Message::ShortcutUpdated { id, combo } => {
                self.update_shortcut(id.as_str(), combo.clone())
            }
            Message::ShortcutsReset => {
                match self.apply_bindings(&ShortcutDef::defaults()).into_iter().next() {
                    Some(conflict) => Err(conflict),
                    None => Ok(true),
                }
            }
            Message::EditLink { .. } | Message::LinksChanged { .. } => Ok(false),
        }
    }

    /// Dispatch a key-down event
    ///
    /// Returns `true` if a binding fired. The matched event is marked
    /// default-prevented and propagation-stopped before the handler runs.
    pub fn handle_key_down(&self, event: &mut KeyEvent) -> bool {
        let handler = {
            let inner = self.state();
            if !inner.listening {
                return false;
            }
            match inner.entries.iter().find(|e| e.combo.matches(event)) {
                Some(entry) => entry.handler.clone(),
                None => return false,
            }
        };

        event.prevent_default();
        event.stop_propagation();
        handler(event);
        true
    }

    /// Current chord of the binding registered as `id`
    pub fn combo_for(&self, id: &str) -> Option<KeyCombo> {
        let inner = self.state();
        let index = inner.position_of_id(id)?;
        Some(inner.entries[index].combo.clone())
    }

    pub fn is_listening(&self) -> bool {
        self.state().listening
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }
}

impl fmt::Debug for ShortcutRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.state();
        let signatures: Vec<&str> = inner.entries.iter().map(|e| e.signature.as_str()).collect();
        f.debug_struct("ShortcutRegistry")
            .field("bindings", &signatures)
            .field("listening", &inner.listening)
            .finish()
    }
}

/// Handle returned by [`ShortcutRegistry::register`]
///
/// Removes exactly the binding it was issued for, even after that binding
/// was moved with [`ShortcutRegistry::update_shortcut`].
#[must_use = "dropping a Registration leaves the shortcut bound; call unregister() to remove it"]
#[derive(Debug)]
pub struct Registration {
    registry: Weak<Mutex<Inner>>,
    token: u64,
}

impl Registration {
    /// Remove the binding. Returns `false` if it was already gone.
    pub fn unregister(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.entries.iter().position(|e| e.token == self.token) {
            Some(index) => {
                inner.take(index);
                true
            }
            None => false,
        }
    }
}
