//! Hotkey Dispatcher - global shortcut registration and routing
//!
//! Uses the global-hotkey crate. On Windows the hotkeys are delivered through
//! the thread's message queue, so registration must happen on the thread that
//! runs the message loop.

use anyhow::{anyhow, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use hdr_gamma_fix_core::engine::EngineEvent;
use hdr_gamma_fix_core::hotkey::{BindingStatus, HotkeyBinding, HotkeyRegistrar};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Highest function key accepted in a chord
const MAX_FUNCTION_KEY: u8 = 12;

/// Map a chord key (`A`-`Z`, `0`-`9`, `F1`-`F12`) to a global-hotkey Code
fn string_to_code(key: &str) -> Option<Code> {
    let key = key.to_uppercase();
    let name = match key.as_bytes() {
        [c @ b'A'..=b'Z'] => format!("Key{}", *c as char),
        [c @ b'0'..=b'9'] => format!("Digit{}", *c as char),
        [b'F', ..] => {
            let n: u8 = key[1..].parse().ok()?;
            if !(1..=MAX_FUNCTION_KEY).contains(&n) {
                return None;
            }
            key
        }
        _ => return None,
    };
    name.parse().ok()
}

/// Parse a chord such as `Alt+F1` or `Ctrl+Shift+G`
pub fn parse_chord(chord: &str) -> Result<HotKey> {
    let parts: Vec<&str> = chord.split('+').map(str::trim).collect();
    let (key, modifier_names) = parts
        .split_last()
        .ok_or_else(|| anyhow!("Empty hotkey"))?;

    let mut mods = Modifiers::empty();
    for name in modifier_names {
        match name.to_lowercase().as_str() {
            "ctrl" | "control" => mods |= Modifiers::CONTROL,
            "alt" => mods |= Modifiers::ALT,
            "shift" => mods |= Modifiers::SHIFT,
            "win" | "super" | "meta" => mods |= Modifiers::META,
            other => return Err(anyhow!("Unknown modifier '{}' in '{}'", other, chord)),
        }
    }

    let code = string_to_code(key).ok_or_else(|| anyhow!("Unknown key '{}' in '{}'", key, chord))?;
    let mods = if mods.is_empty() { None } else { Some(mods) };
    Ok(HotKey::new(mods, code))
}

/// Maps hotkey ids back to engine events. Built before the dispatcher is
/// handed to the engine so the message loop can route without it.
#[derive(Debug, Clone, Default)]
pub struct HotkeyRouter {
    routes: HashMap<u32, HotkeyBinding>,
}

impl HotkeyRouter {
    /// Key presses only; releases are ignored
    pub fn event_for(&self, event: &GlobalHotKeyEvent) -> Option<EngineEvent> {
        if event.state != HotKeyState::Pressed {
            return None;
        }
        self.routes
            .get(&event.id)
            .map(|binding| EngineEvent::ProfileRequested(binding.profile_kind()))
    }
}

struct Chord {
    binding: HotkeyBinding,
    text: String,
    hotkey: Option<HotKey>,
}

pub struct HotkeyDispatcher {
    /// None when the OS hotkey service could not be initialised
    manager: Option<GlobalHotKeyManager>,
    chords: Vec<Chord>,
    registered: Vec<HotKey>,
}

impl HotkeyDispatcher {
    pub fn new(apply_chord: &str, revert_chord: &str) -> Self {
        let manager = match GlobalHotKeyManager::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!("Failed to create hotkey manager: {:?}", e);
                None
            }
        };

        let chords = [
            (HotkeyBinding::ApplyCorrected, apply_chord),
            (HotkeyBinding::RevertDefault, revert_chord),
        ]
        .into_iter()
        .map(|(binding, text)| {
            let hotkey = match parse_chord(text) {
                Ok(hotkey) => Some(hotkey),
                Err(e) => {
                    warn!("Invalid hotkey for {}: {}", binding, e);
                    None
                }
            };
            Chord {
                binding,
                text: text.to_string(),
                hotkey,
            }
        })
        .collect();

        Self {
            manager,
            chords,
            registered: Vec::new(),
        }
    }

    pub fn router(&self) -> HotkeyRouter {
        HotkeyRouter {
            routes: self
                .chords
                .iter()
                .filter_map(|c| c.hotkey.map(|hk| (hk.id(), c.binding)))
                .collect(),
        }
    }

    /// Text shown next to the menu items
    pub fn chord_text(&self, binding: HotkeyBinding) -> &str {
        self.chords
            .iter()
            .find(|c| c.binding == binding)
            .map(|c| c.text.as_str())
            .unwrap_or_default()
    }
}

impl HotkeyRegistrar for HotkeyDispatcher {
    fn register(&mut self) -> Vec<BindingStatus> {
        let mut statuses = Vec::with_capacity(self.chords.len());

        for chord in &self.chords {
            let registered = match (&self.manager, chord.hotkey) {
                (Some(manager), Some(hotkey)) => match manager.register(hotkey) {
                    Ok(()) => {
                        self.registered.push(hotkey);
                        true
                    }
                    Err(e) => {
                        debug!("Register {} failed: {:?}", chord.text, e);
                        false
                    }
                },
                _ => false,
            };

            statuses.push(BindingStatus {
                binding: chord.binding,
                chord: chord.text.clone(),
                registered,
            });
        }

        statuses
    }

    fn unregister(&mut self) {
        let Some(manager) = &self.manager else {
            return;
        };
        for hotkey in self.registered.drain(..) {
            if let Err(e) = manager.unregister(hotkey) {
                warn!("Failed to unregister hotkey: {:?}", e);
            }
        }
    }
}
