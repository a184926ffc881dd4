//! OpenAI-compatible chat-completion client.
//!
//! One call here is one HTTP request. Retries and backoff live in
//! [`LlmGateway`](super::LlmGateway).

use super::gateway::ChatBackend;
use crate::config::LlmConfig;
use crate::error::{BenchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text returned when the API answers successfully but without content.
pub const NO_RESPONSE: &str = "No response";

/// The single user turn sent with every request.
#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [UserMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

/// Response from chat completion.
///
/// Some gateways report errors (including rate limiting) inside a 2xx body,
/// so `error` is checked before `choices`.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorDetail {
    fn is_rate_limit(&self) -> bool {
        match &self.code {
            Some(serde_json::Value::Number(n)) => n.as_u64() == Some(429),
            Some(serde_json::Value::String(s)) => s == "429",
            _ => false,
        }
    }

    fn describe(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// OpenAI-compatible LLM client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    /// Send `prompt` as one user message and return the first choice's text, trimmed.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 429 {
            return Err(BenchError::RateLimited);
        }

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(BenchError::LlmApi(format!(
                    "API error ({}): {}",
                    status,
                    api_error.error.describe()
                )));
            }
            return Err(BenchError::LlmApi(format!(
                "Request failed ({}): {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        if let Some(error) = completion.error {
            if error.is_rate_limit() {
                return Err(BenchError::RateLimited);
            }
            return Err(BenchError::LlmApi(error.describe()));
        }

        let choices = completion
            .choices
            .ok_or_else(|| BenchError::LlmParse("No choices in response".to_string()))?;

        let text = choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string());

        Ok(text)
    }

    /// Test connectivity to the API with the given model.
    pub async fn test_connection(&self, model: &str) -> Result<()> {
        let response = self
            .complete(model, "Say 'hello' and nothing else.")
            .await?;

        if response.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(BenchError::LlmApi(format!(
                "Unexpected response: {}",
                response
            )))
        }
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn send(&self, model: &str, prompt: &str) -> Result<String> {
        self.complete(model, prompt).await
    }
}
