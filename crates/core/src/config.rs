use crate::error::{AppError, Result};
use crate::settings::SettingsStore;
use std::env;
use tracing::info;

/// Connection settings for one AI backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub proxy: Option<String>,
    pub system_prompt: String,
}

impl ProviderConfig {
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ProviderConfigBuilder {
    api_key: String,
    model: String,
    base_url: String,
    proxy: Option<String>,
    system_prompt: String,
}

impl ProviderConfigBuilder {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn build(self) -> Result<ProviderConfig> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::config("API key must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::config("model name must not be empty"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| AppError::config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;

        Ok(ProviderConfig {
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
            proxy: self.proxy,
            system_prompt: self.system_prompt,
        })
    }
}

/// Resolved provider credentials. A provider without a usable key is `None`.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub gemini: Option<ProviderConfig>,
    pub gpt: Option<ProviderConfig>,
}

impl Config {
    /// Resolves provider settings, falling back to environment variables
    /// (including `.env` files) for keys and models.
    pub fn load(settings: &SettingsStore) -> Self {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenvy::dotenv();
        Self::resolve(settings, |name| env::var(name).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup.
    pub fn resolve(settings: &SettingsStore, env_var: impl Fn(&str) -> Option<String>) -> Self {
        // user setting, then environment, then built-in default
        let setting_or_env = |path: &str, var: &str| {
            settings
                .get_user::<String>(path)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| env_var(var).filter(|v| !v.trim().is_empty()))
                .unwrap_or_else(|| settings.get(path, String::new()))
        };

        let gemini = ProviderConfig::builder()
            .with_api_key(setting_or_env("gemini.api_key", "GEMINI_API_KEY"))
            .with_model(setting_or_env("gemini.model", "GEMINI_MODEL"))
            .with_base_url(settings.get("gemini.base_url", String::new()))
            .with_system_prompt(settings.get("gemini.system_prompt", String::new()))
            .build();

        let proxy = settings
            .get("gpt.use_proxy", false)
            .then(|| settings.get("proxy", String::new()));
        let gpt = ProviderConfig::builder()
            .with_api_key(setting_or_env("gpt.api_key", "OPENAI_API_KEY"))
            .with_model(setting_or_env("gpt.model", "OPENAI_MODEL"))
            .with_base_url(settings.get("gpt.base_url", String::new()))
            .with_proxy(proxy)
            .build();

        Self {
            gemini: gemini
                .inspect_err(|e| info!("Gemini disabled: {}", e))
                .ok(),
            gpt: gpt.inspect_err(|e| info!("GPT disabled: {}", e)).ok(),
        }
    }
}
