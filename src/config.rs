//! Configuration for the evaluation pipeline.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{BenchError, Result};
use crate::queue::ProgressMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// LLM API configuration shared by candidate and judge calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL for the chat-completion API (e.g., "https://openrouter.ai/api")
    pub api_base: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens for a response
    pub max_tokens: u32,

    /// Timeout for a single request attempt, in seconds
    pub timeout_secs: u64,

    /// Attempts per candidate call
    pub max_attempts: u32,

    /// Attempts per judge call
    pub judge_attempts: u32,

    /// `HTTP-Referer` attribution header; `null` sends none
    pub referer: Option<String>,

    /// `X-Title` attribution header; `null` sends none
    pub title: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api".to_string(),
            api_key: String::new(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 30,
            max_attempts: 3,
            judge_attempts: 1,
            referer: Some("http://localhost:3000".to_string()),
            title: Some("LLM Evaluator".to_string()),
        }
    }
}

/// A model under evaluation: the API identifier plus the label stored in records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateModel {
    pub id: String,
    pub label: String,
}

impl CandidateModel {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Which models answer and which model grades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// The two tracked candidate models, in record order.
    pub candidates: [CandidateModel; 2],

    /// Model used to score candidate answers.
    pub judge: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            candidates: [
                CandidateModel::new("deepseek/deepseek-r1-zero:free", "DeepSeek-R1-Zero"),
                CandidateModel::new("qwen/qwq-32b:free", "Qwen-32B"),
            ],
            judge: "google/gemma-3-12b-it:free".to_string(),
        }
    }
}

/// Job queue and admission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum units executing at once, across all jobs.
    pub concurrency: usize,

    /// Maximum units dispatched per rate window.
    pub rate_limit_max: usize,

    /// Length of the rate window in milliseconds.
    pub rate_limit_window_ms: u64,

    /// Attempts per unit before it is recorded as failed.
    pub unit_attempts: u32,

    /// Failed units tolerated before a job is marked failed. `None` never fails a job.
    pub failure_threshold: Option<usize>,

    /// How job progress is computed.
    pub progress: ProgressMode,

    /// Buffer size of the live update channel.
    pub publish_capacity: usize,

    /// Finished jobs kept for status lookups. `None` keeps every job.
    pub retain_finished_jobs: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            rate_limit_max: 5,
            rate_limit_window_ms: 1000,
            unit_attempts: 1,
            failure_threshold: None,
            progress: ProgressMode::DispatchIndex,
            publish_capacity: 256,
            retain_finished_jobs: None,
        }
    }
}

/// Where persisted records live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON lines file holding every stored record.
    pub results_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from("data/results.jsonl"),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,
    /// Candidate and judge models
    pub models: ModelsConfig,
    /// Job queue settings
    pub queue: QueueConfig,
    /// Persistence settings
    pub storage: StorageConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, JUDGE_MODEL, ...)
    /// 2. Config file (explicit path, or ~/.config/llm-judge-bench/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| BenchError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Override values from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_base) = lookup("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Some(api_key) = lookup("LLM_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY")) {
            self.llm.api_key = api_key;
        }

        if let Some(tokens) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = tokens;
        }

        if let Some(temp) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = temp;
        }

        if let Some(secs) = lookup("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.llm.timeout_secs = secs;
        }

        if let Some(referer) = lookup("SITE_URL") {
            self.llm.referer = Some(referer);
        }

        if let Some(title) = lookup("SITE_NAME") {
            self.llm.title = Some(title);
        }

        if let Some(id) = lookup("CANDIDATE_MODEL_1") {
            self.models.candidates[0].id = id;
        }

        if let Some(id) = lookup("CANDIDATE_MODEL_2") {
            self.models.candidates[1].id = id;
        }

        if let Some(judge) = lookup("JUDGE_MODEL") {
            self.models.judge = judge;
        }

        if let Some(n) = lookup("QUEUE_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.queue.concurrency = n;
        }

        if let Some(path) = lookup("RESULTS_PATH") {
            self.storage.results_path = PathBuf::from(path);
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "llm-judge-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present and coherent.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(BenchError::InvalidConfig(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(BenchError::InvalidConfig(
                "LLM API key is required. Set LLM_API_KEY (or OPENROUTER_API_KEY) or add to config file.".to_string()
            ));
        }

        if self.llm.max_attempts == 0 || self.llm.judge_attempts == 0 {
            return Err(BenchError::InvalidConfig(
                "llm.max_attempts and llm.judge_attempts must be at least 1".to_string(),
            ));
        }

        for candidate in &self.models.candidates {
            if candidate.id.is_empty() || candidate.label.is_empty() {
                return Err(BenchError::InvalidConfig(
                    "Every candidate model needs a non-empty id and label".to_string(),
                ));
            }
        }

        if self.models.candidates[0].id == self.models.candidates[1].id {
            return Err(BenchError::InvalidConfig(format!(
                "Candidate models must differ, both are '{}'",
                self.models.candidates[0].id
            )));
        }

        if self.models.judge.is_empty() {
            return Err(BenchError::InvalidConfig(
                "Judge model is required. Set JUDGE_MODEL or add to config file.".to_string(),
            ));
        }

        let queue = &self.queue;
        if queue.concurrency == 0 || queue.rate_limit_max == 0 || queue.rate_limit_window_ms == 0 {
            return Err(BenchError::InvalidConfig(
                "queue.concurrency, queue.rate_limit_max and queue.rate_limit_window_ms must be positive"
                    .to_string(),
            ));
        }

        if queue.unit_attempts == 0 {
            return Err(BenchError::InvalidConfig(
                "queue.unit_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.api_base, "https://openrouter.ai/api");
        assert!(config.llm.api_key.is_empty());
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.queue.concurrency, 5);
        assert_eq!(config.queue.rate_limit_max, 5);
        assert_eq!(config.queue.rate_limit_window_ms, 1000);
        assert_eq!(config.queue.retain_finished_jobs, None);
        assert_eq!(config.models.candidates[0].label, "DeepSeek-R1-Zero");
        assert_eq!(config.models.candidates[1].label, "Qwen-32B");
        assert_eq!(config.llm.referer.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.llm.title.as_deref(), Some("LLM Evaluator"));
    }

    #[test]
    fn test_site_env_overrides_attribution() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "SITE_URL" => Some("https://bench.example.com".to_string()),
            "SITE_NAME" => Some("Bench".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.referer.as_deref(), Some("https://bench.example.com"));
        assert_eq!(config.llm.title.as_deref(), Some("Bench"));
    }

    #[test]
    fn test_validate_fails_without_api_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_candidates() {
        let mut config = Config::with_llm("https://api.example.com", "key");
        assert!(config.validate().is_ok());

        config.models.candidates[1].id = config.models.candidates[0].id.clone();
        assert!(matches!(config.validate(), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::with_llm("https://api.example.com", "key");
        config.queue.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENROUTER_API_KEY", "router-key"),
            ("JUDGE_MODEL", "judge/x"),
            ("CANDIDATE_MODEL_2", "other/y"),
            ("QUEUE_CONCURRENCY", "2"),
            ("LLM_TEMPERATURE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key, "router-key");
        assert_eq!(config.models.judge, "judge/x");
        assert_eq!(config.models.candidates[1].id, "other/y");
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.llm.temperature, 0.7);
    }

    #[test]
    fn test_llm_api_key_wins_over_openrouter_key() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "LLM_API_KEY" => Some("primary".to_string()),
            "OPENROUTER_API_KEY" => Some("fallback".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.api_key, "primary");
    }

    #[test]
    fn test_load_partial_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "llm:\n  api_key: file-key\n  max_attempts: 5\nqueue:\n  progress: completion\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.llm.api_key, "file-key");
        assert_eq!(config.llm.max_attempts, 5);
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.queue.progress, ProgressMode::Completion);
        assert_eq!(config.queue.concurrency, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_file(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(BenchError::Io { .. })));
    }
}
