//! Abstract text-completion port (spec §6). Any provider satisfying this
//! contract works; the concrete adapter below talks to the Anthropic
//! Messages API, grounded in the teacher's `services/ai_curator.rs::
//! call_claude` (POST + markdown-fence-aware JSON parsing), generalized to
//! return raw text rather than a single forced-JSON shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_estimate_usd: f64,
}

#[async_trait]
pub trait LLMPort: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Anthropic Messages API adapter, grounded in `ai_curator.rs::call_claude`.
pub struct AnthropicLLM {
    client: reqwest::Client,
    api_key: String,
    /// USD per 1K prompt/completion tokens respectively, used for
    /// `cost_estimate_usd`. Claude Haiku-class pricing as a sane default.
    price_per_1k_prompt: f64,
    price_per_1k_completion: f64,
}

impl AnthropicLLM {
    pub fn new(api_key: impl Into<String>) -> Self {
        AnthropicLLM {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            price_per_1k_prompt: 0.00025,
            price_per_1k_completion: 0.00125,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: AnthropicUsage,
}

#[async_trait]
impl LLMPort for AnthropicLLM {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: &request.messages,
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                OrchestratorError::retryable(format!("LLM call failed ({status}): {text}"))
            } else {
                OrchestratorError::Fatal(anyhow::anyhow!("LLM call failed ({status}): {text}"))
            });
        }

        let parsed: AnthropicResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        let prompt_tokens = parsed.usage.input_tokens;
        let completion_tokens = parsed.usage.output_tokens;
        let cost_estimate_usd = (prompt_tokens as f64 / 1000.0) * self.price_per_1k_prompt
            + (completion_tokens as f64 / 1000.0) * self.price_per_1k_completion;

        Ok(CompletionResponse {
            text,
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_estimate_usd,
        })
    }
}
