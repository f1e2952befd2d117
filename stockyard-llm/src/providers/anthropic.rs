//! Anthropic HTTP provider with rate limiting

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use stockyard_core::{ModelClient, ModelError, ModelMessage, ModelOutput};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 1024;

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Anthropic messages-API provider.
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
}

impl AnthropicModel {
    /// Create a new provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `requests_per_minute` - concurrency bound on in-flight requests
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let permits = (requests_per_minute as usize).max(1);
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limiter: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Override the API base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Split the conversation into the system prompt and the user-visible
    /// turns, appending the response-schema instruction when one is given.
    fn build_request<'a>(
        &self,
        model: &'a str,
        messages: &[ModelMessage],
        response_schema: Option<&JsonValue>,
    ) -> MessagesRequest<'a> {
        let mut system_parts: Vec<String> = Vec::new();
        let mut turns: Vec<WireMessage> = Vec::new();

        for message in messages {
            if message.role == "system" {
                system_parts.push(message.content.clone());
            } else {
                turns.push(WireMessage {
                    role: message.role.clone(),
                    content: message.content.clone(),
                });
            }
        }

        if let Some(schema) = response_schema {
            system_parts.push(format!(
                "Respond with a single JSON object matching this schema, no prose:\n{schema}"
            ));
        }

        MessagesRequest {
            model,
            max_tokens: MAX_TOKENS,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages: turns,
        }
    }
}

impl std::fmt::Debug for AnthropicModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicModel")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ModelClient for AnthropicModel {
    async fn run(
        &self,
        model: &str,
        messages: &[ModelMessage],
        response_schema: Option<&JsonValue>,
    ) -> Result<ModelOutput, ModelError> {
        let _permit =
            self.rate_limiter
                .acquire()
                .await
                .map_err(|_| ModelError::RequestFailed {
                    provider: "anthropic".to_string(),
                    status: 0,
                    message: "rate limiter closed".to_string(),
                })?;

        let body = self.build_request(model, messages, response_schema);
        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
                    }
                } else {
                    ModelError::RequestFailed {
                        provider: "anthropic".to_string(),
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited {
                    provider: "anthropic".to_string(),
                },
                _ => ModelError::RequestFailed {
                    provider: "anthropic".to_string(),
                    status: status.as_u16() as i32,
                    message,
                },
            });
        }

        let parsed_response: MessagesResponse = response.json().await.map_err(|e| {
            ModelError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: e.to_string(),
            }
        })?;

        let text = parsed_response
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();

        let parsed = if response_schema.is_some() {
            extract_json(&text)
        } else {
            None
        };

        Ok(ModelOutput { parsed, text })
    }
}

/// Pull a JSON object out of a completion, tolerating code fences and
/// surrounding prose.
fn extract_json(text: &str) -> Option<JsonValue> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
