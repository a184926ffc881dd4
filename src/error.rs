//! Error types for the evaluation pipeline.

use crate::queue::JobId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while evaluating a batch.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A task failed constructor-time validation.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// A batch with no tasks was submitted.
    #[error("Cannot submit an empty batch")]
    EmptyBatch,

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The request did not finish within the per-call timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The upstream API signalled rate limiting.
    #[error("Rate limited by upstream API")]
    RateLimited,

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// Persistence store error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// No job with this identifier is known.
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    /// A single unit of a job failed.
    #[error("Question {index} failed: {message}")]
    UnitFailed { index: usize, message: String },

    /// The scheduler no longer admits work.
    #[error("Scheduler has been stopped")]
    SchedulerStopped,
}

impl BenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt at the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::RateLimited | Self::LlmApi(_) | Self::LlmParse(_)
        )
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BenchError::Timeout(err.to_string())
        } else {
            BenchError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::LlmParse(err.to_string())
    }
}
