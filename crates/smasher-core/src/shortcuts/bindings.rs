//! Shortcut configuration
//!
//! Defaults are compiled in; the user's customizations are stored apart from
//! them under the `shortcuts` key as a map of shortcut id → combo. The
//! effective binding is resolved at read time, so shipping a new default
//! never overwrites a customization and resetting is just deleting the
//! override.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::KeyCombo;
use crate::error::{Error, Result};
use crate::message::{Message, Notifier};
use crate::store::{keys, read_value, KeyLocks, KeyValueStore, Transaction};

/// The configurable shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortcutId {
    OpenDialog,
    SaveLink,
    TogglePalette,
}

impl ShortcutId {
    /// Every shortcut, in display order
    pub const ALL: [ShortcutId; 3] = [
        ShortcutId::OpenDialog,
        ShortcutId::SaveLink,
        ShortcutId::TogglePalette,
    ];

    /// Stable identifier used in storage and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortcutId::OpenDialog => "OPEN_DIALOG",
            ShortcutId::SaveLink => "SAVE_LINK",
            ShortcutId::TogglePalette => "TOGGLE_PALETTE",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShortcutId::OpenDialog => "Open Link Dialog",
            ShortcutId::SaveLink => "Save Current Link",
            ShortcutId::TogglePalette => "Command Palette",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ShortcutId::OpenDialog => "Open the link management dialog",
            ShortcutId::SaveLink => "Save the current page link",
            ShortcutId::TogglePalette => "Open the command palette",
        }
    }

    /// Built-in binding
    pub fn default_combo(&self) -> KeyCombo {
        match self {
            ShortcutId::OpenDialog => KeyCombo::new("j").meta(),
            ShortcutId::SaveLink => KeyCombo::new("b").meta().ctrl(),
            ShortcutId::TogglePalette => KeyCombo::new("k").meta(),
        }
    }
}

impl fmt::Display for ShortcutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ShortcutId {
    type Err = Error;

    /// Accepts `SAVE_LINK`, `save-link` or `save_link`
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_").to_uppercase();
        ShortcutId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| Error::invalid_input(format!("Unknown shortcut: {}", s)))
    }
}

/// A shortcut definition merged with the user's override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutDef {
    pub id: ShortcutId,
    pub name: String,
    pub description: String,
    pub default_combo: KeyCombo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_combo: Option<KeyCombo>,
}

impl ShortcutDef {
    /// Definition with no override applied
    pub fn new(id: ShortcutId) -> Self {
        Self {
            id,
            name: id.name().to_string(),
            description: id.description().to_string(),
            default_combo: id.default_combo(),
            current_combo: None,
        }
    }

    /// All definitions with no overrides applied
    pub fn defaults() -> Vec<Self> {
        ShortcutId::ALL.into_iter().map(Self::new).collect()
    }

    /// The combo that should actually be bound
    pub fn effective_combo(&self) -> &KeyCombo {
        self.current_combo.as_ref().unwrap_or(&self.default_combo)
    }

    /// Check if the user moved this shortcut off its default
    pub fn is_customized(&self) -> bool {
        self.effective_combo() != &self.default_combo
    }
}

/// Persists shortcut overrides and serves the merged view
#[derive(Clone)]
pub struct ShortcutConfigStore {
    store: Arc<dyn KeyValueStore>,
    locks: KeyLocks,
    notifier: Notifier,
}

impl ShortcutConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_locks(store, KeyLocks::new())
    }

    pub fn with_locks(store: Arc<dyn KeyValueStore>, locks: KeyLocks) -> Self {
        Self {
            store,
            locks,
            notifier: Notifier::new(),
        }
    }

    /// Broadcast change messages on `notifier` instead of a private one
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Notifier that receives `ShortcutUpdated` / `ShortcutsReset` messages
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    async fn begin(&self) -> Transaction<'_> {
        Transaction::begin(self.store.as_ref(), &self.locks, keys::SHORTCUTS).await
    }

    /// Decode stored overrides, skipping unknown ids and malformed combos
    async fn overrides(&self) -> Result<BTreeMap<ShortcutId, KeyCombo>> {
        let raw: Map<String, Value> = read_value(self.store.as_ref(), keys::SHORTCUTS).await?;

        let mut overrides = BTreeMap::new();
        for (key, value) in raw {
            let Ok(id) = key.parse::<ShortcutId>() else {
                warn!("Ignoring override for unknown shortcut {}", key);
                continue;
            };
            match serde_json::from_value::<KeyCombo>(value) {
                Ok(combo) if !combo.key.is_empty() => {
                    overrides.insert(id, combo);
                }
                Ok(_) | Err(_) => warn!("Ignoring malformed override for {}", id),
            }
        }
        Ok(overrides)
    }

    /// All shortcuts with `current_combo` resolved (override or default)
    pub async fn get_all(&self) -> Result<Vec<ShortcutDef>> {
        let overrides = self.overrides().await?;
        Ok(ShortcutId::ALL
            .into_iter()
            .map(|id| {
                let mut def = ShortcutDef::new(id);
                def.current_combo = Some(
                    overrides
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| def.default_combo.clone()),
                );
                def
            })
            .collect())
    }

    /// One shortcut with `current_combo` resolved
    pub async fn get(&self, id: ShortcutId) -> Result<ShortcutDef> {
        let mut def = ShortcutDef::new(id);
        def.current_combo = Some(
            self.overrides()
                .await?
                .remove(&id)
                .unwrap_or_else(|| def.default_combo.clone()),
        );
        Ok(def)
    }

    /// Re-read the overrides and announce what changed since `previous`
    ///
    /// For picking up writes made by another process sharing the store.
    /// Returns the current definitions, to pass as `previous` next time.
    pub async fn refresh(&self, previous: &[ShortcutDef]) -> Result<Vec<ShortcutDef>> {
        let current = self.get_all().await?;
        for message in changes_between(previous, &current) {
            debug!("Store changed externally: {:?}", message);
            self.notifier.send(message);
        }
        Ok(current)
    }

    /// Store a custom combo for `id`
    pub async fn update(&self, id: ShortcutId, combo: KeyCombo) -> Result<()> {
        if combo.key.is_empty() {
            return Err(Error::invalid_input("Shortcut key cannot be empty"));
        }

        let txn = self.begin().await;
        let mut raw: Map<String, Value> = txn.read().await?;
        raw.insert(id.as_str().to_string(), serde_json::to_value(&combo)?);
        txn.write(&raw).await?;
        drop(txn);

        info!("Shortcut {} bound to {}", id, combo);
        self.notifier.send(Message::ShortcutUpdated { id, combo });
        Ok(())
    }

    /// Drop the custom combo for `id`, restoring its default
    pub async fn reset(&self, id: ShortcutId) -> Result<()> {
        let txn = self.begin().await;
        let mut raw: Map<String, Value> = txn.read().await?;
        if raw.remove(id.as_str()).is_some() {
            txn.write(&raw).await?;
        }
        drop(txn);

        let combo = id.default_combo();
        info!("Shortcut {} reset to {}", id, combo);
        self.notifier.send(Message::ShortcutUpdated { id, combo });
        Ok(())
    }

    /// Drop every custom combo
    pub async fn reset_all(&self) -> Result<()> {
        let txn = self.begin().await;
        txn.remove().await?;
        drop(txn);

        info!("All shortcuts reset to defaults");
        self.notifier.send(Message::ShortcutsReset);
        Ok(())
    }
}

/// Messages that take a registry bound to `before` to `after`
///
/// Dropping every override collapses into a single `ShortcutsReset`.
fn changes_between(before: &[ShortcutDef], after: &[ShortcutDef]) -> Vec<Message> {
    let changed: Vec<&ShortcutDef> = after
        .iter()
        .filter(|def| {
            before
                .iter()
                .find(|old| old.id == def.id)
                .map_or(true, |old| old.effective_combo() != def.effective_combo())
        })
        .collect();

    if changed.is_empty() {
        return Vec::new();
    }
    if after.iter().all(|def| !def.is_customized()) && changed.len() > 1 {
        return vec![Message::ShortcutsReset];
    }
    changed
        .into_iter()
        .map(|def| Message::ShortcutUpdated {
            id: def.id,
            combo: def.effective_combo().clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn test_store() -> (Arc<MemoryStore>, ShortcutConfigStore) {
        let kv = Arc::new(MemoryStore::new());
        let config = ShortcutConfigStore::new(kv.clone());
        (kv, config)
    }

    #[test]
    fn test_shortcut_id_parse() {
        assert_eq!("SAVE_LINK".parse::<ShortcutId>().unwrap(), ShortcutId::SaveLink);
        assert_eq!("save-link".parse::<ShortcutId>().unwrap(), ShortcutId::SaveLink);
        assert_eq!(
            "toggle_palette".parse::<ShortcutId>().unwrap(),
            ShortcutId::TogglePalette
        );
        assert!("mute_tab".parse::<ShortcutId>().is_err());
    }

    #[test]
    fn test_defaults_do_not_collide() {
        let defaults = ShortcutDef::defaults();
        let mut signatures: Vec<_> = defaults.iter().map(|d| d.default_combo.signature()).collect();
        signatures.sort();
        signatures.dedup();
        assert_eq!(signatures.len(), defaults.len());
    }

    #[tokio::test]
    async fn test_get_all_defaults() {
        let (_, config) = test_store();

        let defs = config.get_all().await.unwrap();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].id, ShortcutId::OpenDialog);
        for def in &defs {
            assert_eq!(def.current_combo.as_ref(), Some(&def.default_combo));
            assert!(!def.is_customized());
        }
    }

    #[tokio::test]
    async fn test_update_overrides_default() {
        let (_, config) = test_store();

        config
            .update(ShortcutId::OpenDialog, KeyCombo::new("k").ctrl())
            .await
            .unwrap();

        let def = config.get(ShortcutId::OpenDialog).await.unwrap();
        assert_eq!(def.effective_combo(), &KeyCombo::new("k").ctrl());
        assert_eq!(def.default_combo, KeyCombo::new("j").meta());
        assert!(def.is_customized());

        // Others untouched
        let save = config.get(ShortcutId::SaveLink).await.unwrap();
        assert!(!save.is_customized());
    }

    #[tokio::test]
    async fn test_update_rejects_empty_key() {
        let (_, config) = test_store();

        let err = config
            .update(ShortcutId::SaveLink, KeyCombo::new("").meta())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_overrides_persist_as_id_map() {
        let (kv, config) = test_store();

        config
            .update(ShortcutId::SaveLink, KeyCombo::new("s").alt())
            .await
            .unwrap();

        let stored = kv.get(keys::SHORTCUTS).await.unwrap().unwrap();
        assert_eq!(stored, json!({"SAVE_LINK": {"key": "s", "altKey": true}}));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_overrides_are_ignored() {
        let (kv, config) = test_store();
        kv.set(
            keys::SHORTCUTS,
            json!({
                "MUTE_TAB": {"key": "m"},
                "OPEN_DIALOG": {"nope": true},
                "SAVE_LINK": {"key": "s", "ctrlKey": true}
            }),
        )
        .await
        .unwrap();

        let defs = config.get_all().await.unwrap();
        assert!(!defs[0].is_customized());
        assert_eq!(defs[1].effective_combo(), &KeyCombo::new("s").ctrl());

        // Unknown entries survive an update of another id
        config
            .update(ShortcutId::TogglePalette, KeyCombo::new("p").meta())
            .await
            .unwrap();
        let stored = kv.get(keys::SHORTCUTS).await.unwrap().unwrap();
        assert!(stored.get("MUTE_TAB").is_some());
    }

    #[tokio::test]
    async fn test_reset_restores_default_and_notifies() {
        let (_, config) = test_store();
        let mut rx = config.notifier().subscribe();

        config
            .update(ShortcutId::OpenDialog, KeyCombo::new("o").ctrl())
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Message::ShortcutUpdated {
                id: ShortcutId::OpenDialog,
                combo: KeyCombo::new("o").ctrl()
            }
        );

        config.reset(ShortcutId::OpenDialog).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Message::ShortcutUpdated {
                id: ShortcutId::OpenDialog,
                combo: KeyCombo::new("j").meta()
            }
        );
        assert!(!config
            .get(ShortcutId::OpenDialog)
            .await
            .unwrap()
            .is_customized());
    }

    #[tokio::test]
    async fn test_reset_all() {
        let (kv, config) = test_store();
        let mut rx = config.notifier().subscribe();

        config
            .update(ShortcutId::OpenDialog, KeyCombo::new("o").ctrl())
            .await
            .unwrap();
        config
            .update(ShortcutId::SaveLink, KeyCombo::new("s").ctrl())
            .await
            .unwrap();
        config.reset_all().await.unwrap();

        assert!(kv.get(keys::SHORTCUTS).await.unwrap().is_none());
        assert!(config.get_all().await.unwrap().iter().all(|d| !d.is_customized()));

        let mut last = None;
        while let Ok(message) = rx.try_recv() {
            last = Some(message);
        }
        assert_eq!(last, Some(Message::ShortcutsReset));
    }

    #[tokio::test]
    async fn test_space_combo_round_trips() {
        let (_, config) = test_store();
        let space = KeyCombo::new(" ").ctrl();

        config
            .update(ShortcutId::TogglePalette, space.clone())
            .await
            .unwrap();

        let def = config.get(ShortcutId::TogglePalette).await.unwrap();
        assert_eq!(def.effective_combo(), &space);
        assert!(def.is_customized());
    }

    #[test]
    fn test_changes_between() {
        let before = ShortcutDef::defaults();
        assert!(changes_between(&before, &before).is_empty());

        let mut after = before.clone();
        after[1].current_combo = Some(KeyCombo::new("s").alt());
        assert_eq!(
            changes_between(&before, &after),
            vec![Message::ShortcutUpdated {
                id: ShortcutId::SaveLink,
                combo: KeyCombo::new("s").alt()
            }]
        );

        // Back to a single default is still a plain update
        assert_eq!(
            changes_between(&after, &before),
            vec![Message::ShortcutUpdated {
                id: ShortcutId::SaveLink,
                combo: ShortcutId::SaveLink.default_combo()
            }]
        );

        let mut swapped = before.clone();
        swapped[0].current_combo = Some(ShortcutId::TogglePalette.default_combo());
        swapped[2].current_combo = Some(ShortcutId::OpenDialog.default_combo());
        assert_eq!(changes_between(&before, &swapped).len(), 2);
        assert_eq!(
            changes_between(&swapped, &before),
            vec![Message::ShortcutsReset]
        );
    }

    #[tokio::test]
    async fn test_refresh_announces_changes_from_another_writer() {
        let kv = Arc::new(MemoryStore::new());
        let writer = ShortcutConfigStore::new(kv.clone());
        let reader = ShortcutConfigStore::new(kv);
        let mut rx = reader.notifier().subscribe();

        let seen = reader.get_all().await.unwrap();
        writer
            .update(ShortcutId::OpenDialog, KeyCombo::new("o").ctrl())
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        let seen = reader.refresh(&seen).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::ShortcutUpdated {
                id: ShortcutId::OpenDialog,
                combo: KeyCombo::new("o").ctrl()
            }
        );

        // Nothing new, nothing sent
        reader.refresh(&seen).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_registry_follows_external_update() {
        use crate::shortcuts::{Shortcut, ShortcutRegistry};

        let kv = Arc::new(MemoryStore::new());
        let writer = ShortcutConfigStore::new(kv.clone());
        let reader = ShortcutConfigStore::new(kv);
        let mut rx = reader.notifier().subscribe();

        let registry = ShortcutRegistry::new();
        let _reg = registry
            .register(
                Shortcut::new(ShortcutId::SaveLink.default_combo(), |_: &crate::KeyEvent| {})
                    .with_id(ShortcutId::SaveLink.as_str()),
            )
            .unwrap();

        let seen = reader.get_all().await.unwrap();
        writer
            .update(ShortcutId::SaveLink, KeyCombo::new(" ").alt())
            .await
            .unwrap();
        reader.refresh(&seen).await.unwrap();

        while let Ok(message) = rx.try_recv() {
            registry.apply_message(&message).unwrap();
        }
        assert_eq!(
            registry.combo_for(ShortcutId::SaveLink.as_str()),
            Some(KeyCombo::new(" ").alt())
        );
    }
}
