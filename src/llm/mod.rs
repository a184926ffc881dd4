//! LLM integration module.
//!
//! Provides an OpenAI-compatible client, the retrying gateway every pipeline
//! call goes through, and the prompts sent to candidate and judge models.

mod client;
mod gateway;
mod prompts;

pub use client::{LlmClient, NO_RESPONSE};
pub use gateway::{API_ERROR, ChatBackend, Completion, LlmGateway, RetryPolicy};
pub use prompts::Prompts;
