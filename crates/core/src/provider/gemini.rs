use super::{Provider, ProviderName};
use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::history::CapturedImage;
use crate::image_processing::to_base64;
use gemini_rust::{Blob, Content, Gemini, GenerationResponse, Message, Part, Role};

const PROVIDER: &str = "Gemini";

pub struct GeminiProvider {
    client: Gemini,
    system_prompt: String,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        // Pass an explicit base URL to avoid the BadScheme error
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = url::Url::parse(&base)
            .map_err(|e| AppError::Config(format!("Invalid base URL: {}", e)))?;

        let model_name = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };
        let model_url = format!("{}{}", base, model_name);

        let client = Gemini::with_model_and_base_url(&config.api_key, model_url, base_url)
            .map_err(|e| AppError::Config(format!("Failed to create Gemini client: {}", e)))?;

        Ok(Self {
            client,
            system_prompt: config.system_prompt.clone(),
        })
    }

    /// One user message: the prompt text followed by every image, oldest first.
    fn build_message(images: &[CapturedImage], prompt: &str) -> Message {
        let text_part = Part::Text {
            text: prompt.to_string(),
            thought: None,
            thought_signature: None,
        };

        let image_parts = images.iter().map(|image| Part::InlineData {
            inline_data: Blob {
                mime_type: image.mime_type().to_string(),
                data: to_base64(image.bytes()),
            },
            media_resolution: None,
        });

        let content = Content {
            role: Some(Role::User),
            parts: Some(std::iter::once(text_part).chain(image_parts).collect()),
        };

        Message {
            role: Role::User,
            content,
        }
    }

    async fn generate(&self, images: &[CapturedImage], prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .generate_content()
            .with_messages(vec![Self::build_message(images, prompt)]);
        if !self.system_prompt.trim().is_empty() {
            request = request.with_system_prompt(&self.system_prompt);
        }

        let response = request.execute().await.map_err(request_error)?;

        let text = response_text(&response);
        if text.is_empty() {
            return Err(AppError::provider(PROVIDER, "No text response received from Gemini"));
        }
        Ok(text)
    }

    async fn generate_stream(
        &self,
        images: &[CapturedImage],
        prompt: &str,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<String> {
        use futures::StreamExt;

        let mut request = self
            .client
            .generate_content()
            .with_messages(vec![Self::build_message(images, prompt)]);
        if !self.system_prompt.trim().is_empty() {
            request = request.with_system_prompt(&self.system_prompt);
        }

        let stream = request.execute_stream().await.map_err(request_error)?;
        let mut stream = Box::pin(stream);

        let mut full = String::new();
        while let Some(item) = stream.next().await {
            let response = item
                .map_err(|e| AppError::provider(PROVIDER, format!("Stream error: {:?}", e)))?;
            let text = response_text(&response);
            if !text.is_empty() {
                full.push_str(&text);
                on_chunk(text);
            }
        }

        if full.is_empty() {
            return Err(AppError::provider(PROVIDER, "Stream ended without any text"));
        }
        Ok(full)
    }
}

impl Provider for GeminiProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Gemini
    }

    fn analyze(&self, images: &[CapturedImage], prompt: &str) -> Result<String> {
        current_thread_runtime()?.block_on(self.generate(images, prompt))
    }

    fn analyze_streaming(
        &self,
        images: &[CapturedImage],
        prompt: &str,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<String> {
        current_thread_runtime()?.block_on(self.generate_stream(images, prompt, on_chunk))
    }
}

/// Dispatch threads have no runtime of their own; each call gets a small one.
pub(crate) fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::provider(PROVIDER, format!("Failed to create async runtime: {}", e)))
}

/// Concatenates the non-thought text parts of the first candidate.
fn response_text(response: &GenerationResponse) -> String {
    let mut text = String::new();
    if let Some(candidate) = response.candidates.first() {
        if let Some(parts) = &candidate.content.parts {
            for part in parts {
                if let Part::Text { text: t, thought, .. } = part {
                    if !thought.unwrap_or(false) {
                        text.push_str(t);
                    }
                }
            }
        }
    }
    text
}

fn request_error(e: impl std::fmt::Debug) -> AppError {
    let detail = format!("{:?}", e);
    if detail.contains("429") || detail.contains("RESOURCE_EXHAUSTED") {
        AppError::RateLimited(PROVIDER.to_string())
    } else {
        AppError::provider(PROVIDER, format!("API request failed: {}", detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_puts_prompt_before_images_in_order() {
        let images = vec![
            CapturedImage::from(vec![0x89, b'P', b'N', b'G', 1]),
            CapturedImage::from(vec![0xFF, 0xD8, 0xFF, 2]),
        ];
        let message = GeminiProvider::build_message(&images, "what is this?");
        let parts = message.content.parts.unwrap();

        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], Part::Text { text, .. } if text == "what is this?"));
        assert!(matches!(&parts[1], Part::InlineData { inline_data, .. } if inline_data.mime_type == "image/png"));
        assert!(matches!(&parts[2], Part::InlineData { inline_data, .. } if inline_data.mime_type == "image/jpeg"));
    }

    #[test]
    fn rate_limit_errors_are_classified() {
        assert!(matches!(
            request_error("status 429 Too Many Requests"),
            AppError::RateLimited(_)
        ));
        assert!(matches!(
            request_error("connection refused"),
            AppError::ProviderRequest { .. }
        ));
    }
}
