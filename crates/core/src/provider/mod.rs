//! Uniform access to the AI backends.
//!
//! Backends form a closed set ([`ProviderName`]); the gateway maps each
//! configured one to a [`Provider`] implementation. Every provider call is
//! blocking and must run on a dispatch thread, never on the main thread.
//! Nothing here retries.

pub mod gemini;
pub mod openai;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::history::CapturedImage;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

pub use gemini::GeminiProvider;
pub use openai::GptProvider;

/// The configured AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderName {
    Gemini,
    Gpt,
}

impl ProviderName {
    pub const ALL: [ProviderName; 2] = [ProviderName::Gemini, ProviderName::Gpt];

    /// Spelling used in the settings file.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderName::Gemini => "Gemini",
            ProviderName::Gpt => "GPT",
        }
    }

    /// The other backend; used by the "switch provider" hotkey.
    pub fn toggled(self) -> Self {
        match self {
            ProviderName::Gemini => ProviderName::Gpt,
            ProviderName::Gpt => ProviderName::Gemini,
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderName::Gemini),
            "gpt" | "openai" | "chatgpt" => Ok(ProviderName::Gpt),
            _ => Err(AppError::UnknownProvider(s.to_string())),
        }
    }
}

/// An AI backend that answers a prompt about a set of images.
pub trait Provider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Sends `images` (oldest first) plus `prompt` and waits for the answer.
    fn analyze(&self, images: &[CapturedImage], prompt: &str) -> Result<String>;

    /// Like [`Provider::analyze`], reporting text as it arrives.
    ///
    /// Returns the full text; the chunks concatenate to it.
    fn analyze_streaming(
        &self,
        images: &[CapturedImage],
        prompt: &str,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<String> {
        let text = self.analyze(images, prompt)?;
        on_chunk(text.clone());
        Ok(text)
    }
}

/// Registry of the usable providers.
#[derive(Default, Clone)]
pub struct ProviderGateway {
    providers: HashMap<ProviderName, Arc<dyn Provider>>,
}

impl ProviderGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every provider whose configuration resolved.
    pub fn from_config(config: &Config) -> Self {
        let mut gateway = Self::new();

        if let Some(cfg) = &config.gemini {
            match GeminiProvider::new(cfg) {
                Ok(provider) => gateway.register(Arc::new(provider)),
                Err(e) => warn!(error = %e, "Gemini provider unavailable"),
            }
        }
        if let Some(cfg) = &config.gpt {
            match GptProvider::new(cfg) {
                Ok(provider) => gateway.register(Arc::new(provider)),
                Err(e) => warn!(error = %e, "GPT provider unavailable"),
            }
        }

        info!(providers = ?gateway.registered(), "provider gateway ready");
        gateway
    }

    /// Registers (or replaces) the provider for its [`Provider::name`].
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn registered(&self) -> Vec<ProviderName> {
        ProviderName::ALL
            .into_iter()
            .filter(|name| self.providers.contains_key(name))
            .collect()
    }

    /// Resolves a provider by its settings spelling.
    ///
    /// # Errors
    /// [`AppError::UnknownProvider`] when `name` is not a backend or that
    /// backend has no usable configuration.
    pub fn get_service(&self, name: &str) -> Result<Arc<dyn Provider>> {
        let key: ProviderName = name.parse()?;
        self.providers
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::UnknownProvider(format!("{key} (not configured)")))
    }
}

impl fmt::Debug for ProviderGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderGateway")
            .field("providers", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    #[test]
    fn parses_settings_spellings() {
        assert_eq!("Gemini".parse::<ProviderName>().unwrap(), ProviderName::Gemini);
        assert_eq!(" gpt ".parse::<ProviderName>().unwrap(), ProviderName::Gpt);
        assert_eq!("OpenAI".parse::<ProviderName>().unwrap(), ProviderName::Gpt);
        assert!(matches!(
            "claude".parse::<ProviderName>(),
            Err(AppError::UnknownProvider(name)) if name == "claude"
        ));
    }

    #[test]
    fn toggling_round_trips() {
        for name in ProviderName::ALL {
            assert_ne!(name.toggled(), name);
            assert_eq!(name.toggled().toggled(), name);
            assert_eq!(name.as_str().parse::<ProviderName>().unwrap(), name);
        }
    }

    #[test]
    fn gateway_resolves_registered_providers_only() {
        let mut gateway = ProviderGateway::new();
        gateway.register(Arc::new(FakeProvider::replying(ProviderName::Gemini, "hi")));

        let provider = gateway.get_service("Gemini").unwrap();
        assert_eq!(provider.name(), ProviderName::Gemini);

        assert!(matches!(gateway.get_service("GPT"), Err(AppError::UnknownProvider(_))));
        assert!(matches!(gateway.get_service("Bard"), Err(AppError::UnknownProvider(_))));
        assert_eq!(gateway.registered(), vec![ProviderName::Gemini]);
    }

    struct Echo;

    impl Provider for Echo {
        fn name(&self) -> ProviderName {
            ProviderName::Gpt
        }

        fn analyze(&self, _images: &[CapturedImage], _prompt: &str) -> Result<String> {
            Ok("whole answer".to_string())
        }
    }

    #[test]
    fn default_streaming_emits_single_chunk() {
        let provider = Echo;
        let mut chunks = Vec::new();
        let text = provider
            .analyze_streaming(&[], "prompt", &mut |chunk| chunks.push(chunk))
            .unwrap();

        assert_eq!(text, "whole answer");
        assert_eq!(chunks, vec!["whole answer".to_string()]);
    }
}
