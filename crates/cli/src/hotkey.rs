//! Global hotkeys on top of `rdev`.
//!
//! `rdev::listen` blocks its thread for the lifetime of the process, so the
//! listener gets a dedicated thread. Matched callbacks run on their own
//! short-lived threads to keep the hook responsive.

use anyhow::{Context, Result};
use rdev::{EventType, Key};
use snapprompt_core::hotkey::Modifiers;
use snapprompt_core::{AppEvent, EventSender, HotkeyCallback, HotkeyRegistrar, KeyCombo};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

struct Binding {
    modifiers: Modifiers,
    key: Key,
    label: String,
    callback: HotkeyCallback,
}

/// Collects bindings, then listens for them once started.
#[derive(Default)]
pub struct RdevHotkeys {
    bindings: Vec<Binding>,
}

impl HotkeyRegistrar for RdevHotkeys {
    fn register(&mut self, combo: &KeyCombo, callback: HotkeyCallback) -> bool {
        let Some(key) = key_from_name(&combo.key) else {
            warn!(hotkey = %combo, "unsupported key");
            return false;
        };
        if self
            .bindings
            .iter()
            .any(|b| b.key == key && b.modifiers == combo.modifiers)
        {
            warn!(hotkey = %combo, "hotkey already bound");
            return false;
        }

        self.bindings.push(Binding {
            modifiers: combo.modifiers,
            key,
            label: combo.to_string(),
            callback,
        });
        true
    }
}

impl RdevHotkeys {
    /// Spawns the listener thread.
    ///
    /// If the OS hook fails (no permission, no display), `Shutdown` is
    /// posted to `events` so the main loop does not wait forever.
    pub fn start(self, events: EventSender) -> Result<JoinHandle<()>> {
        let mut matcher = Matcher::new(self.bindings);

        thread::Builder::new()
            .name("hotkeys".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if let Some((label, callback)) = matcher.on_event(&event.event_type) {
                        debug!(hotkey = %label, "hotkey pressed");
                        if let Err(e) = thread::Builder::new()
                            .name("hotkey-callback".into())
                            .spawn(move || callback())
                        {
                            error!(error = %e, "failed to spawn hotkey callback");
                        }
                    }
                });

                if let Err(e) = result {
                    error!("hotkey listener stopped: {:?}", e);
                    events.post(AppEvent::Shutdown);
                }
            })
            .context("Failed to spawn hotkey listener")
    }
}

/// Modifier tracking and combo matching, independent of the OS hook.
struct Matcher {
    bindings: Vec<Binding>,
    modifiers: Modifiers,
    /// Last non-modifier key pressed and not yet released; suppresses
    /// auto-repeat.
    held: Option<Key>,
}

impl Matcher {
    fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            modifiers: Modifiers::default(),
            held: None,
        }
    }

    fn on_event(&mut self, event: &EventType) -> Option<(String, HotkeyCallback)> {
        match event {
            &EventType::KeyPress(key) => {
                if self.set_modifier(key, true) {
                    return None;
                }
                if self.held == Some(key) {
                    return None;
                }
                self.held = Some(key);

                self.bindings
                    .iter()
                    .find(|b| b.key == key && b.modifiers == self.modifiers)
                    .map(|b| (b.label.clone(), b.callback.clone()))
            }
            &EventType::KeyRelease(key) => {
                if !self.set_modifier(key, false) && self.held == Some(key) {
                    self.held = None;
                }
                None
            }
            _ => None,
        }
    }

    /// Returns `true` when `key` is a modifier.
    fn set_modifier(&mut self, key: Key, down: bool) -> bool {
        let slot = match key {
            Key::ControlLeft | Key::ControlRight => &mut self.modifiers.ctrl,
            Key::Alt | Key::AltGr => &mut self.modifiers.alt,
            Key::ShiftLeft | Key::ShiftRight => &mut self.modifiers.shift,
            Key::MetaLeft | Key::MetaRight => &mut self.modifiers.meta,
            _ => return false,
        };
        *slot = down;
        true
    }
}

fn key_from_name(name: &str) -> Option<Key> {
    let key = match name {
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,
        "0" => Key::Num0,
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "escape" => Key::Escape,
        "enter" => Key::Return,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "insert" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "-" | "minus" => Key::Minus,
        "=" | "equal" => Key::Equal,
        "," | "comma" => Key::Comma,
        "." | "period" => Key::Dot,
        "/" | "slash" => Key::Slash,
        ";" | "semicolon" => Key::SemiColon,
        "'" | "quote" => Key::Quote,
        "`" | "backquote" => Key::BackQuote,
        "[" => Key::LeftBracket,
        "]" => Key::RightBracket,
        "\\" | "backslash" => Key::BackSlash,
        _ => return None,
    };
    Some(key)
}
