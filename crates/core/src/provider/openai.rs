//! OpenAI-compatible chat completions backend ("GPT" in settings).

use super::gemini::current_thread_runtime;
use super::{Provider, ProviderName};
use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::history::CapturedImage;
use crate::image_processing::to_base64;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "GPT";
const ERROR_BODY_LIMIT: usize = 300;

pub struct GptProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

impl GptProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| AppError::config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn build_request(&self, images: &[CapturedImage], prompt: &str, stream: bool) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: MessageContent::Text(self.system_prompt.clone()),
            });
        }

        let mut parts = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", image.mime_type(), to_base64(image.bytes())),
            },
        }));
        messages.push(ChatMessage {
            role: "user",
            content: MessageContent::Parts(parts),
        });

        ChatRequest {
            model: &self.model,
            messages,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("API request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(PROVIDER.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(AppError::provider(PROVIDER, format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn complete(&self, images: &[CapturedImage], prompt: &str) -> Result<String> {
        let response = self.send(&self.build_request(images, prompt, false)).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("Malformed response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::provider(PROVIDER, "No text response received"))
    }

    async fn complete_stream(
        &self,
        images: &[CapturedImage],
        prompt: &str,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<String> {
        use futures::StreamExt;

        let response = self.send(&self.build_request(images, prompt, true)).await?;
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut full = String::new();

        'stream: while let Some(item) = bytes.next().await {
            let item = item.map_err(|e| AppError::provider(PROVIDER, format!("Stream error: {}", e)))?;
            for event in decoder.feed(&item) {
                match event {
                    SseEvent::Done => break 'stream,
                    SseEvent::Data(payload) => {
                        if let Some(delta) = delta_text(&payload) {
                            full.push_str(&delta);
                            on_chunk(delta);
                        }
                    }
                }
            }
        }

        if full.is_empty() {
            return Err(AppError::provider(PROVIDER, "Stream ended without any text"));
        }
        Ok(full)
    }
}

impl Provider for GptProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Gpt
    }

    fn analyze(&self, images: &[CapturedImage], prompt: &str) -> Result<String> {
        current_thread_runtime()?.block_on(self.complete(images, prompt))
    }

    fn analyze_streaming(
        &self,
        images: &[CapturedImage],
        prompt: &str,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<String> {
        current_thread_runtime()?.block_on(self.complete_stream(images, prompt, on_chunk))
    }
}

fn delta_text(payload: &str) -> Option<String> {
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty()),
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream payload");
            None
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Splits a server-sent-events byte stream into `data:` payloads.
#[derive(Default)]
struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                events.push(SseEvent::Done);
            } else if !data.is_empty() {
                events.push(SseEvent::Data(data.to_string()));
            }
        }
        events
    }
}
