//! Provider abstraction over heterogeneous classification backends.
//!
//! A provider exposes one operation: given a system and user message, return
//! raw response text in the shared output schema. Hosted chat services are
//! prompted into that schema; local models synthesize it directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderKind;
use crate::error::{ClassifierError, Result};

/// Uniform capability implemented by every classification backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate raw response text for a system + user message pair
    async fn generate_completion(&self, system_message: &str, user_message: &str)
        -> Result<String>;

    /// Registry name of this provider
    fn name(&self) -> &str;

    /// Model identifier recorded as provenance
    fn model_name(&self) -> &str;

    /// Whether this backend needs prompt engineering or takes content directly
    fn kind(&self) -> ProviderKind;
}

impl std::fmt::Debug for dyn CompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("name", &self.name())
            .field("model_name", &self.model_name())
            .finish()
    }
}

/// Hosted chat-completion provider speaking the OpenAI-compatible wire
/// format. Interchangeable endpoints (OpenAI, DeepSeek, Doubao and friends)
/// differ only in base URL, credentials and model name.
pub struct ChatProvider {
    client: reqwest::Client,
    name: String,
    api_key: String,
    base_url: String,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

/// Construction parameters resolved by the registry
pub struct ChatProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ChatProvider {
    pub fn new(config: ChatProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ClassifierError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            name: config.name,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_name: config.model_name,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn request_completion(&self, system_message: &str, user_message: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system_message.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_message,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user_message,
        });

        let body = ChatRequest {
            model: &self.model_name,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::TransportError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ProviderStatus {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatApiResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::TransportError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ClassifierError::TransportError("Provider returned no choices".to_string())
            })
    }
}

#[async_trait]
impl CompletionProvider for ChatProvider {
    async fn generate_completion(
        &self,
        system_message: &str,
        user_message: &str,
    ) -> Result<String> {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.request_completion(system_message, user_message).await {
                Ok(content) => {
                    debug!(provider = %self.name, model = %self.model_name, "Completion received");
                    return Ok(content);
                }
                Err(e) if e.is_transient() && attempts <= self.max_retries => {
                    warn!(
                        "Completion from {} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        self.name,
                        attempts,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Chat
    }
}
