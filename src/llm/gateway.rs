//! Retrying front door for every LLM call in the pipeline.
//!
//! The gateway never fails its caller. When every attempt is used up it
//! returns [`API_ERROR`] as the text and marks the outcome degraded.

use crate::error::{BenchError, Result};
use crate::outcome::{Degradation, Outcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sentinel text recorded when a model could not be reached.
pub const API_ERROR: &str = "API error";

/// One request/response exchange with a chat model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `prompt` as a single user message to `model` and return the reply text.
    async fn send(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Backoff schedule between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base wait after a rate-limit response, doubled per attempt.
    pub rate_limit_base: Duration,
    /// Base wait after any other failure, multiplied by the attempt number.
    pub retry_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_base: Duration::from_millis(1000),
            retry_base: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait after a rate-limited `attempt` (1-based): `2^attempt * base`.
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        self.rate_limit_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Wait after any other failed `attempt` (1-based): `attempt * base`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base.saturating_mul(attempt)
    }

    fn delay_for(&self, error: &BenchError, attempt: u32) -> Duration {
        match error {
            BenchError::RateLimited => self.rate_limit_delay(attempt),
            _ => self.retry_delay(attempt),
        }
    }
}

/// The text a model produced, with attempt metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub model: String,
    pub text: String,
    pub attempts: u32,
    #[serde(with = "millis")]
    pub latency: Duration,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Chat gateway with bounded retries.
#[derive(Clone)]
pub struct LlmGateway {
    backend: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
}

impl LlmGateway {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    pub fn with_policy(backend: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ask `model` for a completion, trying at most `max_attempts` times.
    ///
    /// Rate limits and other failures share one attempt counter. A
    /// `max_attempts` of zero is treated as one. Non-retryable errors stop
    /// immediately. An empty model id or prompt degrades without any request.
    pub async fn complete(&self, model: &str, prompt: &str, max_attempts: u32) -> Outcome<Completion> {
        let started = Instant::now();

        if model.trim().is_empty() || prompt.trim().is_empty() {
            let reason = if model.trim().is_empty() {
                "model id is empty"
            } else {
                "prompt is empty"
            };
            warn!(model = %model, reason, "rejecting LLM request");
            return Outcome::degraded(
                Completion {
                    model: model.to_string(),
                    text: API_ERROR.to_string(),
                    attempts: 0,
                    latency: started.elapsed(),
                },
                Degradation::InvalidRequest {
                    reason: reason.to_string(),
                },
            );
        }

        let max_attempts = max_attempts.max(1);
        let mut attempts = 0;
        let mut last_error = String::new();

        while attempts < max_attempts {
            attempts += 1;

            match self.backend.send(model, prompt).await {
                Ok(text) => {
                    debug!(model = %model, attempt = attempts, "LLM call succeeded");
                    return Outcome::ok(Completion {
                        model: model.to_string(),
                        text: text.trim().to_string(),
                        attempts,
                        latency: started.elapsed(),
                    });
                }
                Err(error) => {
                    last_error = error.to_string();

                    if !error.is_retryable() || attempts == max_attempts {
                        warn!(
                            model = %model,
                            attempt = attempts,
                            max_attempts,
                            error = %error,
                            "LLM call failed, giving up"
                        );
                        break;
                    }

                    let backoff = self.policy.delay_for(&error, attempts);
                    warn!(
                        model = %model,
                        attempt = attempts,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Outcome::degraded(
            Completion {
                model: model.to_string(),
                text: API_ERROR.to_string(),
                attempts,
                latency: started.elapsed(),
            },
            Degradation::UpstreamExhausted {
                attempts,
                last_error,
            },
        )
    }
}
