//! Shortcut command handlers

use std::io::stdout;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use crossterm::ExecutableCommand;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use smasher_core::shortcuts::Registration;
use smasher_core::{
    KeyCombo, KeyEvent, Message, Shortcut, ShortcutConfigStore, ShortcutDef, ShortcutId,
    ShortcutRegistry,
};

use crate::output::{Output, OutputFormat};

/// List shortcuts with their effective bindings
pub async fn list(shortcuts: &ShortcutConfigStore, output: &Output) -> Result<()> {
    let defs = shortcuts.get_all().await?;
    output.print_shortcuts(&defs);
    Ok(())
}

/// Bind a shortcut to a new combo
pub async fn set(
    shortcuts: &ShortcutConfigStore,
    id: String,
    combo: String,
    output: &Output,
) -> Result<()> {
    let id: ShortcutId = id.parse()?;
    let combo: KeyCombo = combo
        .parse()
        .with_context(|| format!("Invalid key combination: {}", combo))?;

    let defs = shortcuts.get_all().await?;
    if let Some(other) = conflicting_shortcut(&defs, id, &combo) {
        bail!("{} is already bound to {} ({})", combo, other.id, other.name);
    }

    shortcuts
        .update(id, combo.clone())
        .await
        .context("Failed to save shortcut")?;

    output.success(&format!("{} bound to {}", id, combo));
    Ok(())
}

/// Restore one shortcut's default
pub async fn reset(shortcuts: &ShortcutConfigStore, id: String, output: &Output) -> Result<()> {
    let id: ShortcutId = id.parse()?;

    shortcuts
        .reset(id)
        .await
        .context("Failed to reset shortcut")?;

    output.success(&format!("{} reset to {}", id, id.default_combo()));
    Ok(())
}

/// Restore every default
pub async fn reset_all(shortcuts: &ShortcutConfigStore, output: &Output) -> Result<()> {
    shortcuts
        .reset_all()
        .await
        .context("Failed to reset shortcuts")?;

    output.success("All shortcuts reset to defaults");
    Ok(())
}

/// Report which shortcut each key press triggers until Esc is pressed
///
/// Bindings follow the store: a `shortcut set` run from another terminal
/// takes effect without restarting the listener.
pub async fn listen(
    shortcuts: &ShortcutConfigStore,
    store_path: &Path,
    output: &Output,
) -> Result<()> {
    let (tx, fired) = mpsc::unbounded_channel();
    let registry = ShortcutRegistry::new();

    // Handlers go in under the defaults, then the saved configuration moves them
    let mut registrations: Vec<Registration> = Vec::new();
    for def in ShortcutDef::defaults() {
        let tx = tx.clone();
        let id = def.id;
        let shortcut = Shortcut::new(def.default_combo.clone(), move |_: &KeyEvent| {
            let _ = tx.send(id);
        })
        .with_id(id.as_str());
        registrations.push(registry.register(shortcut)?);
    }
    let defs = shortcuts.get_all().await?;
    for conflict in registry.apply_bindings(&defs) {
        warn!("Shortcut left on its previous binding: {}", conflict);
    }

    let (changed_tx, changed) = mpsc::unbounded_channel();
    let _watcher = match watch_store(store_path, changed_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Not following store changes: {:#}", e);
            None
        }
    };

    if output.format == OutputFormat::Human {
        println!("Listening for shortcuts. Press Esc to stop.");
    }

    let mut listener = Listener {
        registry: &registry,
        shortcuts,
        output,
        seen: defs,
        fired,
        changed,
        messages: shortcuts.notifier().subscribe(),
    };
    let terminal = RawTerminal::enter()?;
    let result = listener.run().await;
    drop(terminal);

    for registration in registrations {
        let _ = registration.unregister();
    }
    debug!("Listener stopped, {} binding(s) left", registry.len());
    result
}

struct Listener<'a> {
    registry: &'a ShortcutRegistry,
    shortcuts: &'a ShortcutConfigStore,
    output: &'a Output,
    /// Definitions as of the last store read
    seen: Vec<ShortcutDef>,
    fired: mpsc::UnboundedReceiver<ShortcutId>,
    changed: mpsc::UnboundedReceiver<()>,
    messages: broadcast::Receiver<Message>,
}

impl Listener<'_> {
    async fn run(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(()) = self.changed.recv() => self.reload().await,
                received = self.messages.recv() => self.follow(received).await,
                _ = sleep(Duration::from_millis(50)) => {
                    while event::poll(Duration::ZERO)? {
                        if let Event::Key(key) = event::read()? {
                            // Only handle key press events (not release)
                            if key.kind != KeyEventKind::Press {
                                continue;
                            }
                            if key.code == KeyCode::Esc {
                                return Ok(());
                            }
                            self.dispatch(&key);
                        }
                    }
                }
            }
        }
    }

    /// Announce whatever another process wrote to the store
    async fn reload(&mut self) {
        match self.shortcuts.refresh(&self.seen).await {
            Ok(current) => self.seen = current,
            Err(e) => warn!("Failed to reload shortcuts: {}", e),
        }
    }

    async fn follow(&mut self, received: Result<Message, RecvError>) {
        match received {
            Ok(message) => match self.registry.apply_message(&message) {
                Ok(true) => self.report(&message),
                Ok(false) => {}
                Err(conflict) => {
                    // A swap arrives as two updates; the first collides with the second
                    debug!("Rebinding from the store after: {}", conflict);
                    self.rebind_all().await;
                    self.report(&message);
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                debug!("Missed {} shortcut message(s)", skipped);
                self.rebind_all().await;
            }
            Err(RecvError::Closed) => {}
        }
    }

    async fn rebind_all(&self) {
        match self.shortcuts.get_all().await {
            Ok(defs) => {
                for conflict in self.registry.apply_bindings(&defs) {
                    warn!("Shortcut left on its previous binding: {}", conflict);
                }
            }
            Err(e) => warn!("Failed to reload shortcuts: {}", e),
        }
    }

    fn report(&self, message: &Message) {
        match self.output.format {
            OutputFormat::Human => match message {
                Message::ShortcutUpdated { id, combo } => {
                    print!("{} ({}) now bound to {}\r\n", id.name(), id, combo)
                }
                Message::ShortcutsReset => print!("Shortcuts reset to defaults\r\n"),
                _ => {}
            },
            OutputFormat::Json => match message.encode() {
                Ok(json) => print!("{}\r\n", json),
                Err(e) => warn!("Failed to encode {:?}: {}", message, e),
            },
            OutputFormat::Quiet => {}
        }
    }

    fn dispatch(&mut self, key: &event::KeyEvent) {
        let Some(mut event) = to_key_event(key) else {
            return;
        };
        let pressed = KeyCombo::from(&event);
        if !self.registry.handle_key_down(&mut event) {
            if self.output.format == OutputFormat::Human {
                print!("{}  (no shortcut)\r\n", pressed);
            }
            return;
        }

        while let Ok(id) = self.fired.try_recv() {
            match self.output.format {
                OutputFormat::Human => print!("{}  → {} ({})\r\n", pressed, id.name(), id),
                OutputFormat::Json => print!(
                    "{}\r\n",
                    serde_json::json!({"combo": pressed.to_string(), "shortcut": id})
                ),
                OutputFormat::Quiet => print!("{}\r\n", id),
            }
        }
    }
}

/// Watch the store's directory, signalling `tx` when the store file changes
///
/// The directory is watched rather than the file because writes replace the
/// file by renaming a temporary over it.
fn watch_store(path: &Path, tx: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {:?}", dir))?;

    let target = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        match res {
            Ok(event) if is_store_event(&event, &target) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!("Store watch error: {}", e),
        }
    })
    .context("Failed to create store watcher")?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {:?}", dir))?;
    debug!("Watching {:?} for store changes", dir);
    Ok(watcher)
}

/// Check if `event` created, changed, or removed the store file
fn is_store_event(event: &notify::Event, store_path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == store_path.file_name())
}

/// Raw-mode session; restores the terminal when dropped
struct RawTerminal {
    enhanced: bool,
}

impl RawTerminal {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;

        // Needed for terminals to report super / meta at all
        let enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
        if enhanced {
            stdout().execute(PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES,
            ))?;
        }
        Ok(Self { enhanced })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = stdout().execute(PopKeyboardEnhancementFlags);
        }
        let _ = disable_raw_mode();
    }
}

/// Translate a terminal key press into a host key event
///
/// Key names follow the browser's `KeyboardEvent.key` values. Keys with no
/// such name are dropped.
fn to_key_event(key: &event::KeyEvent) -> Option<KeyEvent> {
    let name = match key.code {
        KeyCode::Char(' ') => " ".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::F(n) => format!("F{}", n),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab | KeyCode::BackTab => "Tab".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Insert => "Insert".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        _ => return None,
    };

    let mut event = KeyEvent::new(name);
    event.meta_key = key
        .modifiers
        .intersects(KeyModifiers::SUPER | KeyModifiers::META);
    event.ctrl_key = key.modifiers.contains(KeyModifiers::CONTROL);
    event.alt_key = key.modifiers.contains(KeyModifiers::ALT);
    event.shift_key =
        key.modifiers.contains(KeyModifiers::SHIFT) || key.code == KeyCode::BackTab;
    Some(event)
}

/// Another shortcut whose effective combo equals `combo`
fn conflicting_shortcut<'a>(
    defs: &'a [ShortcutDef],
    id: ShortcutId,
    combo: &KeyCombo,
) -> Option<&'a ShortcutDef> {
    let signature = combo.signature();
    defs.iter()
        .find(|d| d.id != id && d.effective_combo().signature() == signature)
}
