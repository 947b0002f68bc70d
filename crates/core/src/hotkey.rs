//! Global hotkey bindings.
//!
//! Key combinations come from the settings as strings such as `alt+z` or
//! `ctrl+shift+1`. The platform hook lives behind [`HotkeyRegistrar`]; each
//! callback only posts an [`AppEvent`] and returns.

use crate::error::AppError;
use crate::event::{AppEvent, EventSender};
use crate::settings::{Prompt, SettingsStore};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prompt switching covers `alt+1` to `alt+9`.
pub const MAX_PROMPT_HOTKEYS: usize = 9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.meta)
    }
}

/// A parsed key combination: modifiers plus one lowercase key name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: String,
}

impl FromStr for KeyCombo {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::HotkeyRegistration(s.to_string());
        let mut modifiers = Modifiers::default();
        let mut key = None;

        for part in s.split('+') {
            let part = part.trim().to_ascii_lowercase();
            match part.as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "meta" | "super" | "win" | "cmd" | "command" => modifiers.meta = true,
                "" => return Err(invalid()),
                _ if key.is_some() => return Err(invalid()),
                _ => {
                    key = Some(match part.as_str() {
                        "esc" => "escape".to_string(),
                        "return" => "enter".to_string(),
                        "del" => "delete".to_string(),
                        _ => part,
                    })
                }
            }
        }

        key.map(|key| KeyCombo { modifiers, key }).ok_or_else(invalid)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (on, name) in [(m.ctrl, "ctrl"), (m.alt, "alt"), (m.shift, "shift"), (m.meta, "meta")] {
            if on {
                write!(f, "{name}+")?;
            }
        }
        f.write_str(&self.key)
    }
}

/// Callback run by the hotkey listener, possibly on any thread.
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Platform hotkey hook.
pub trait HotkeyRegistrar {
    /// Binds `combo`; `false` when the binding could not be installed.
    fn register(&mut self, combo: &KeyCombo, callback: HotkeyCallback) -> bool;
}

/// Prompt-switch combos for the first [`MAX_PROMPT_HOTKEYS`] prompts.
///
/// A prompt without its own hotkey gets `alt+<position>`.
pub fn prompt_hotkeys(settings: &SettingsStore) -> Vec<(String, Prompt)> {
    settings
        .prompts()
        .into_iter()
        .take(MAX_PROMPT_HOTKEYS)
        .enumerate()
        .map(|(index, prompt)| {
            let combo = if prompt.hotkey.trim().is_empty() {
                format!("alt+{}", index + 1)
            } else {
                prompt.hotkey.clone()
            };
            (combo, prompt)
        })
        .collect()
}

/// Binds the control and prompt hotkeys found in `settings`.
///
/// A binding that fails is logged and skipped. Returns the number of
/// bindings installed.
pub fn bind_hotkeys(
    registrar: &mut dyn HotkeyRegistrar,
    settings: &SettingsStore,
    events: &EventSender,
) -> usize {
    let controls = [
        ("send_prompt", AppEvent::CaptureRequested { with_prompt: true }),
        ("toggle", AppEvent::OverlayToggleRequested),
        ("screenshot_only", AppEvent::CaptureRequested { with_prompt: false }),
        ("clear_screenshots", AppEvent::HistoryClearRequested),
        ("switch_provider", AppEvent::ProviderToggleRequested),
    ];

    let mut bindings: Vec<(String, AppEvent)> = controls
        .into_iter()
        .map(|(name, event)| (settings.hotkey(name), event))
        .collect();

    for (index, (combo, _)) in prompt_hotkeys(settings).into_iter().enumerate() {
        bindings.push((combo, AppEvent::PromptSwitchRequested(index)));
    }

    let mut bound = 0;
    for (combo, event) in bindings {
        if combo.trim().is_empty() {
            debug!(?event, "hotkey disabled");
            continue;
        }

        let parsed = match combo.parse::<KeyCombo>() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "invalid hotkey in settings");
                continue;
            }
        };

        let sender = events.clone();
        let label = format!("{event:?}");
        let callback: HotkeyCallback = Arc::new(move || {
            sender.post(event.clone());
        });

        if registrar.register(&parsed, callback) {
            debug!(hotkey = %parsed, action = %label, "hotkey bound");
            bound += 1;
        } else {
            warn!(error = %AppError::HotkeyRegistration(parsed.to_string()), action = %label, "skipping hotkey");
        }
    }

    info!(bound, "hotkeys registered");
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::channel;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        bound: Vec<(KeyCombo, HotkeyCallback)>,
        reject: Option<String>,
    }

    impl Recorder {
        fn fire(&self, combo: &str) {
            let combo: KeyCombo = combo.parse().unwrap();
            let (_, callback) = self
                .bound
                .iter()
                .find(|(c, _)| *c == combo)
                .unwrap_or_else(|| panic!("{combo} not bound"));
            callback();
        }
    }

    impl HotkeyRegistrar for Recorder {
        fn register(&mut self, combo: &KeyCombo, callback: HotkeyCallback) -> bool {
            if self.reject.as_deref() == Some(combo.to_string().as_str()) {
                return false;
            }
            self.bound.push((combo.clone(), callback));
            true
        }
    }

    #[test]
    fn parses_modifiers_and_aliases() {
        let combo: KeyCombo = "Control+Option+Shift+Esc".parse().unwrap();
        assert!(combo.modifiers.ctrl && combo.modifiers.alt && combo.modifiers.shift);
        assert!(!combo.modifiers.meta);
        assert_eq!(combo.key, "escape");
        assert_eq!(combo.to_string(), "ctrl+alt+shift+escape");

        let plain: KeyCombo = "f9".parse().unwrap();
        assert!(plain.modifiers.is_empty());
    }

    #[test]
    fn rejects_malformed_combos() {
        for bad in ["", "alt+", "alt", "a+b", "ctrl++x"] {
            assert!(bad.parse::<KeyCombo>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn binds_controls_and_prompts() {
        let settings = SettingsStore::in_memory(json!({
            "prompts": [
                { "name": "a", "hotkey": "", "content": "a" },
                { "name": "b", "hotkey": "ctrl+b", "content": "b" }
            ]
        }));
        let (events, inbox) = channel();
        let mut recorder = Recorder::default();

        assert_eq!(bind_hotkeys(&mut recorder, &settings, &events), 7);

        recorder.fire("alt+z");
        recorder.fire("alt+1");
        recorder.fire("ctrl+b");
        recorder.fire("alt+w");

        let seen: Vec<AppEvent> = std::iter::from_fn(|| inbox.try_recv()).collect();
        assert!(matches!(seen[0], AppEvent::CaptureRequested { with_prompt: true }));
        assert!(matches!(seen[1], AppEvent::PromptSwitchRequested(0)));
        assert!(matches!(seen[2], AppEvent::PromptSwitchRequested(1)));
        assert!(matches!(seen[3], AppEvent::CaptureRequested { with_prompt: false }));
    }

    #[test]
    fn failed_binding_does_not_stop_the_rest() {
        let settings = SettingsStore::in_memory(json!({
            "hotkeys": { "toggle": "alt+", "clear_screenshots": "" }
        }));
        let (events, _inbox) = channel();
        let mut recorder = Recorder {
            reject: Some("alt+z".into()),
            ..Recorder::default()
        };

        // send_prompt rejected, toggle invalid, clear disabled; 2 controls + 2 prompts remain
        assert_eq!(bind_hotkeys(&mut recorder, &settings, &events), 4);
        recorder.fire("alt+s");
    }

    #[test]
    fn prompt_combos_default_to_alt_position() {
        let settings = SettingsStore::in_memory(json!({
            "prompts": [
                { "name": "a", "hotkey": "  ", "content": "a" },
                { "name": "b", "hotkey": "ctrl+b", "content": "b" },
                { "name": "c", "content": "c" }
            ]
        }));

        let combos: Vec<(String, String)> = prompt_hotkeys(&settings)
            .into_iter()
            .map(|(combo, prompt)| (combo, prompt.name))
            .collect();
        assert_eq!(
            combos,
            vec![
                ("alt+1".to_string(), "a".to_string()),
                ("ctrl+b".to_string(), "b".to_string()),
                ("alt+3".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn prompt_hotkeys_stop_at_nine() {
        let prompts: Vec<_> = (0..12)
            .map(|i| json!({ "name": format!("p{i}"), "content": "x" }))
            .collect();
        let settings = SettingsStore::in_memory(json!({ "prompts": prompts }));
        let (events, _inbox) = channel();
        let mut recorder = Recorder::default();

        assert_eq!(bind_hotkeys(&mut recorder, &settings, &events), 5 + MAX_PROMPT_HOTKEYS);
    }
}
