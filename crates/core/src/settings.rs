//! User settings persistence.
//!
//! Settings are a single JSON document addressed with dotted paths
//! (`"gemini.model"`, `"hotkeys.send_prompt"`). Lookups fall back to the
//! built-in defaults document and then to the caller's default, so a partial
//! or missing settings file is always usable.

use crate::error::{AppError, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default history bound when settings do not name one.
pub const DEFAULT_MAX_HISTORY: usize = 5;

/// A named prompt bound to the "send prompt" hotkey when selected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(default)]
    pub hotkey: String,
    pub content: String,
}

/// Built-in defaults, consulted after the user document.
pub fn default_settings() -> Value {
    json!({
        "provider": "Gemini",
        "current_prompt_index": 0,
        "max_screenshot_history": DEFAULT_MAX_HISTORY,
        "streaming": false,
        "use_selector": true,
        "monitor": 0,
        "proxy": "",
        "hotkeys": {
            "send_prompt": "alt+z",
            "toggle": "alt+q",
            "screenshot_only": "alt+w",
            "clear_screenshots": "alt+v",
            "switch_provider": "alt+s"
        },
        "prompts": [
            {
                "name": "Explain",
                "hotkey": "alt+1",
                "content": "Explain what is in these screenshots in detail."
            },
            {
                "name": "Solve",
                "hotkey": "alt+2",
                "content": "Solve the problem shown in the screenshots. Put the complete solution in a single fenced code block."
            }
        ],
        "gemini": {
            "api_key": "",
            "model": "gemini-flash-latest",
            "base_url": "https://generativelanguage.googleapis.com/v1beta/",
            "system_prompt": ""
        },
        "gpt": {
            "api_key": "",
            "model": "gpt-4o",
            "base_url": "https://api.openai.com/v1",
            "use_proxy": false
        }
    })
}

/// Dotted-path key/value store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    doc: Value,
    defaults: Value,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "snapprompt", "snapprompt").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from the default location.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(path),
            None => {
                warn!("no config directory available, settings will not persist");
                Self::in_memory(Value::Object(Map::new()))
            }
        }
    }

    /// Loads settings from `path`. A missing or unreadable file yields an
    /// empty document that will be written on the first `set`.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(doc) if doc.is_object() => doc,
                Ok(_) => {
                    warn!(path = %path.display(), "settings file is not a JSON object, ignoring it");
                    Value::Object(Map::new())
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse settings file, using defaults");
                    Value::Object(Map::new())
                }
            },
            Err(_) => Value::Object(Map::new()),
        };

        Self {
            doc,
            defaults: default_settings(),
            path: Some(path),
        }
    }

    /// Creates a store that never touches the disk.
    pub fn in_memory(doc: Value) -> Self {
        Self {
            doc,
            defaults: default_settings(),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw lookup: user document first, then defaults.
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        lookup(&self.doc, path).or_else(|| lookup(&self.defaults, path))
    }

    /// Typed lookup with a caller default for missing or mistyped values.
    pub fn get<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        if let Some(value) = lookup(&self.doc, path) {
            match T::deserialize(value) {
                Ok(v) => return v,
                Err(e) => warn!(path, error = %e, "ignoring mistyped setting"),
            }
        }
        lookup(&self.defaults, path)
            .and_then(|value| T::deserialize(value).ok())
            .unwrap_or(default)
    }

    /// Typed lookup in the user document only, ignoring defaults.
    pub fn get_user<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        lookup(&self.doc, path).and_then(|value| T::deserialize(value).ok())
    }

    /// Stores `value` at `path`, creating intermediate objects, and persists.
    pub fn set<T: Serialize>(&mut self, path: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        insert(&mut self.doc, path, value)?;
        self.save()
    }

    /// Persists settings to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let json = serde_json::to_string_pretty(&self.doc)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.get("prompts", Vec::new())
    }

    /// Returns the selected prompt, resetting an out-of-range index to 0.
    ///
    /// `None` when no prompts are configured.
    pub fn current_prompt(&mut self) -> Option<(usize, Prompt)> {
        let mut prompts = self.prompts();
        if prompts.is_empty() {
            return None;
        }

        let index: i64 = self.get("current_prompt_index", 0);
        let index = match usize::try_from(index) {
            Ok(i) if i < prompts.len() => i,
            _ => {
                warn!(index, count = prompts.len(), "prompt index out of range, resetting to the first prompt");
                if let Err(e) = self.set("current_prompt_index", 0) {
                    warn!(error = %e, "failed to persist prompt index");
                }
                0
            }
        };
        Some((index, prompts.swap_remove(index)))
    }

    /// Selects prompt `index` and persists the choice.
    ///
    /// Returns `None` (and changes nothing) when `index` is out of range.
    pub fn select_prompt(&mut self, index: usize) -> Option<Prompt> {
        let mut prompts = self.prompts();
        if index >= prompts.len() {
            return None;
        }
        if let Err(e) = self.set("current_prompt_index", index) {
            warn!(error = %e, "failed to persist prompt index");
        }
        Some(prompts.swap_remove(index))
    }

    /// Provider name as written in the settings ("Gemini", "GPT", ...).
    pub fn provider_name(&self) -> String {
        self.get("provider", "Gemini".to_string())
    }

    pub fn max_history(&self) -> usize {
        self.get("max_screenshot_history", DEFAULT_MAX_HISTORY)
    }

    pub fn streaming_enabled(&self) -> bool {
        self.get("streaming", false)
    }

    pub fn use_selector(&self) -> bool {
        self.get("use_selector", true)
    }

    /// Monitor the selector and the full-screen fallback capture.
    pub fn monitor(&self) -> usize {
        self.get("monitor", 0)
    }

    /// Key combination for a control hotkey (`hotkeys.<name>`).
    pub fn hotkey(&self, name: &str) -> String {
        self.get(&format!("hotkeys.{name}"), String::new())
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, key| match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn insert(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let keys: Vec<&str> = path.split('.').collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(AppError::config(format!("invalid settings path '{path}'")));
    }

    let (last, parents) = keys
        .split_last()
        .ok_or_else(|| AppError::config("empty settings path"))?;

    let mut node = root;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return Err(AppError::config(format!("cannot descend into '{key}'"))),
        };
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
    info!(path, "setting updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_then_caller_default() {
        let store = SettingsStore::in_memory(json!({ "gemini": { "model": "gemini-2.5-pro" } }));

        assert_eq!(store.get("gemini.model", String::new()), "gemini-2.5-pro");
        assert_eq!(store.get("hotkeys.send_prompt", String::new()), "alt+z");
        assert_eq!(store.get("does.not.exist", 42u32), 42);
    }

    #[test]
    fn user_lookup_skips_defaults() {
        let store = SettingsStore::in_memory(json!({ "gpt": { "model": "gpt-4.1" } }));
        assert_eq!(store.get_user::<String>("gpt.model").as_deref(), Some("gpt-4.1"));
        assert_eq!(store.get_user::<String>("gemini.model"), None);
        assert_eq!(store.get("gemini.model", String::new()), "gemini-flash-latest");
    }

    #[test]
    fn mistyped_value_uses_default_document() {
        let store = SettingsStore::in_memory(json!({ "max_screenshot_history": "lots" }));
        assert_eq!(store.max_history(), DEFAULT_MAX_HISTORY);
    }

    #[test]
    fn array_indices_are_addressable() {
        let store = SettingsStore::in_memory(json!({}));
        assert_eq!(store.get("prompts.1.name", String::new()), "Solve");
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut store = SettingsStore::in_memory(json!({ "gpt": "not an object" }));
        store.set("gpt.api_key", "sk-test").unwrap();
        store.set("network.proxy.url", "http://127.0.0.1:6789").unwrap();

        assert_eq!(store.get("gpt.api_key", String::new()), "sk-test");
        assert_eq!(store.get("network.proxy.url", String::new()), "http://127.0.0.1:6789");
    }

    #[test]
    fn rejects_empty_path_segments() {
        let mut store = SettingsStore::in_memory(json!({}));
        assert!(matches!(store.set("a..b", 1), Err(AppError::Config(_))));
    }

    #[test]
    fn out_of_range_prompt_index_resets_to_zero() {
        let mut store = SettingsStore::in_memory(json!({ "current_prompt_index": 7 }));

        let (index, prompt) = store.current_prompt().unwrap();
        assert_eq!(index, 0);
        assert_eq!(prompt.name, "Explain");
        assert_eq!(store.get("current_prompt_index", -1i64), 0);
    }

    #[test]
    fn negative_prompt_index_resets_to_zero() {
        let mut store = SettingsStore::in_memory(json!({ "current_prompt_index": -3 }));
        assert_eq!(store.current_prompt().map(|(i, _)| i), Some(0));
    }

    #[test]
    fn no_prompts_means_no_current_prompt() {
        let mut store = SettingsStore::in_memory(json!({ "prompts": [] }));
        assert!(store.current_prompt().is_none());
    }

    #[test]
    fn select_prompt_checks_range() {
        let mut store = SettingsStore::in_memory(json!({}));

        assert_eq!(store.select_prompt(1).map(|p| p.name), Some("Solve".to_string()));
        assert_eq!(store.get("current_prompt_index", 0usize), 1);

        assert!(store.select_prompt(9).is_none());
        assert_eq!(store.get("current_prompt_index", 0usize), 1);
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = SettingsStore::load_from(&path);
        store.set("provider", "GPT").unwrap();
        store.set("current_prompt_index", 1).unwrap();

        let reloaded = SettingsStore::load_from(&path);
        assert_eq!(reloaded.provider_name(), "GPT");
        assert_eq!(reloaded.get("current_prompt_index", 0usize), 1);
    }

    #[test]
    fn corrupt_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::load_from(&path);
        assert_eq!(store.provider_name(), "Gemini");
        assert!(store.use_selector());
    }
}
