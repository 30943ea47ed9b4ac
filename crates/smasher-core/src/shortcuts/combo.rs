//! Key combinations and key events

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ShortcutError;

/// `KeyboardEvent.key` value of the space bar
const SPACE: &str = " ";

/// A chord: one key plus the modifiers that must be held with it
///
/// Modifiers left out are required to be *up*; matching is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCombo {
    pub key: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub meta_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ctrl_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub alt_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub shift_key: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl KeyCombo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn meta(mut self) -> Self {
        self.meta_key = true;
        self
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl_key = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt_key = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift_key = true;
        self
    }

    /// Canonical map key for this chord, e.g. `meta+ctrl+b`
    ///
    /// Held modifiers come first in the fixed order meta, ctrl, alt, shift,
    /// followed by the lower-cased key.
    pub fn signature(&self) -> String {
        self.joined_with(&self.key.to_lowercase())
    }

    fn joined_with(&self, key: &str) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(5);
        for (held, name) in [
            (self.meta_key, "meta"),
            (self.ctrl_key, "ctrl"),
            (self.alt_key, "alt"),
            (self.shift_key, "shift"),
        ] {
            if held {
                parts.push(name.to_string());
            }
        }
        parts.push(key.to_string());
        parts.join("+")
    }

    /// Check if `event` is exactly this chord
    ///
    /// Keys compare case-insensitively; every modifier flag must be equal,
    /// so `meta+j` does not fire for `meta+shift+j`.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.key.to_lowercase() == self.key.to_lowercase()
            && event.meta_key == self.meta_key
            && event.ctrl_key == self.ctrl_key
            && event.alt_key == self.alt_key
            && event.shift_key == self.shift_key
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key == SPACE {
            f.pad(&self.joined_with("space"))
        } else {
            f.pad(&self.signature())
        }
    }
}

impl FromStr for KeyCombo {
    type Err = ShortcutError;

    /// Parse `meta+ctrl+b` style text
    ///
    /// Modifier aliases: `cmd`/`super` for meta, `control` for ctrl,
    /// `option` for alt. The last token is the key; `ctrl++` binds `+` and
    /// `space` binds the space bar.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (modifiers, key) = if text == "+" {
            ("", "+")
        } else if let Some(prefix) = text.strip_suffix("++") {
            (prefix, "+")
        } else {
            match text.rsplit_once('+') {
                Some((modifiers, key)) => (modifiers, key),
                None => ("", text),
            }
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(ShortcutError::MissingKey);
        }

        let mut combo = if key.eq_ignore_ascii_case("space") {
            KeyCombo::new(SPACE)
        } else {
            KeyCombo::new(key)
        };
        for modifier in modifiers.split('+').map(str::trim).filter(|m| !m.is_empty()) {
            match modifier.to_lowercase().as_str() {
                "meta" | "cmd" | "command" | "super" => combo.meta_key = true,
                "ctrl" | "control" => combo.ctrl_key = true,
                "alt" | "option" => combo.alt_key = true,
                "shift" => combo.shift_key = true,
                _ => return Err(ShortcutError::UnsupportedModifier(modifier.to_string())),
            }
        }
        Ok(combo)
    }
}

/// A key-down event as delivered by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub meta_key: bool,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub shift_key: bool,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self) -> Self {
        self.meta_key = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl_key = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt_key = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift_key = true;
        self
    }

    /// Suppress the host's default action for this key
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Keep other listeners from seeing this key
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl From<&KeyCombo> for KeyEvent {
    /// The event a user produces by pressing `combo`
    fn from(combo: &KeyCombo) -> Self {
        Self {
            key: combo.key.clone(),
            meta_key: combo.meta_key,
            ctrl_key: combo.ctrl_key,
            alt_key: combo.alt_key,
            shift_key: combo.shift_key,
            ..Self::default()
        }
    }
}

impl From<&KeyEvent> for KeyCombo {
    /// The chord `event` represents
    fn from(event: &KeyEvent) -> Self {
        Self {
            key: event.key.clone(),
            meta_key: event.meta_key,
            ctrl_key: event.ctrl_key,
            alt_key: event.alt_key,
            shift_key: event.shift_key,
        }
    }
}
