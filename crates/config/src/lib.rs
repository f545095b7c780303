//! Configuration loading, validation, and management for StudyHall.
//!
//! Loads configuration from `~/.studyhall/config.toml` with environment
//! variable overrides. Validates all settings at startup. Every field has a
//! default, so a partial file (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.studyhall/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion API key (usually supplied through the environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// How the assistant is identified and addressed
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Context analysis and decision thresholds
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Priority scoring and bucketing
    #[serde(default)]
    pub priority: PriorityConfig,

    /// Job queue scheduling, retries and retention
    #[serde(default)]
    pub queue: QueueConfig,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Completion client
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Real-time delivery
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("assistant", &self.assistant)
            .field("decision", &self.decision)
            .field("priority", &self.priority)
            .field("queue", &self.queue)
            .field("cache", &self.cache)
            .field("completion", &self.completion)
            .field("broadcast", &self.broadcast)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Display name used in prompts
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Sender ID the assistant's own messages carry
    #[serde(default = "default_assistant_sender")]
    pub sender_id: String,

    /// Names participants use to address the assistant directly
    #[serde(default = "default_address_names")]
    pub address_names: Vec<String>,
}

fn default_assistant_name() -> String {
    "AI".into()
}
fn default_assistant_sender() -> String {
    "assistant".into()
}
fn default_address_names() -> Vec<String> {
    vec!["ai".into(), "assistant".into(), "tutor".into()]
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            sender_id: default_assistant_sender(),
            address_names: default_address_names(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// How many recent messages the context analyzer looks at
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// How many of the latest messages count as "recent" for assistant turns
    #[serde(default = "default_recent_turn_window")]
    pub recent_turn_window: usize,

    /// Messages newer than this count toward momentum
    #[serde(default = "default_momentum_window_secs")]
    pub momentum_window_secs: u64,

    /// Messages shorter than this (non-whitespace chars) are trivial
    #[serde(default = "default_min_substantive_chars")]
    pub min_substantive_chars: usize,

    /// Minimum length for an academic question to engage a group
    #[serde(default = "default_min_academic_question_chars")]
    pub min_academic_question_chars: usize,

    /// Groups at least this large need the strict combination of signals
    #[serde(default = "default_large_group_size")]
    pub large_group_size: usize,
}

fn default_window_size() -> usize {
    10
}
fn default_recent_turn_window() -> usize {
    5
}
fn default_momentum_window_secs() -> u64 {
    300
}
fn default_min_substantive_chars() -> usize {
    3
}
fn default_min_academic_question_chars() -> usize {
    15
}
fn default_large_group_size() -> usize {
    4
}

impl DecisionConfig {
    pub fn momentum_window(&self) -> Duration {
        Duration::from_secs(self.momentum_window_secs)
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            recent_turn_window: default_recent_turn_window(),
            momentum_window_secs: default_momentum_window_secs(),
            min_substantive_chars: default_min_substantive_chars(),
            min_academic_question_chars: default_min_academic_question_chars(),
            large_group_size: default_large_group_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Scores at or above this land in the `high` bucket
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,

    /// Scores at or above this (and below high) land in `normal`
    #[serde(default = "default_normal_threshold")]
    pub normal_threshold: f32,

    /// Participation below this earns the low-participation boost
    #[serde(default = "default_low_participation")]
    pub low_participation_threshold: f32,

    /// Messages longer than this count as long for the technical boost
    #[serde(default = "default_long_message_chars")]
    pub long_message_chars: usize,
}

fn default_high_threshold() -> f32 {
    0.75
}
fn default_normal_threshold() -> f32 {
    0.4
}
fn default_low_participation() -> f32 {
    0.3
}
fn default_long_message_chars() -> usize {
    100
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            normal_threshold: default_normal_threshold(),
            low_participation_threshold: default_low_participation(),
            long_message_chars: default_long_message_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum jobs executing at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Scheduler tick interval
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Attempts before a job is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Retry delay ceiling
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Upper bound on one execution attempt
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// How long completed jobs stay pollable
    #[serde(default = "default_completed_retention_secs")]
    pub completed_retention_secs: u64,

    /// How long failed jobs stay pollable
    #[serde(default = "default_failed_retention_secs")]
    pub failed_retention_secs: u64,
}

fn default_concurrency() -> usize {
    3
}
fn default_tick_ms() -> u64 {
    100
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1_000
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_job_timeout_secs() -> u64 {
    60
}
fn default_completed_retention_secs() -> u64 {
    60
}
fn default_failed_retention_secs() -> u64 {
    600
}

impl QueueConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn completed_retention(&self) -> Duration {
        Duration::from_secs(self.completed_retention_secs)
    }

    pub fn failed_retention(&self) -> Duration {
        Duration::from_secs(self.failed_retention_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            tick_ms: default_tick_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            completed_retention_secs: default_completed_retention_secs(),
            failed_retention_secs: default_failed_retention_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of a cached completion
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// How often the sweeper evicts expired entries
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    3_600
}
fn default_sweep_interval_secs() -> u64 {
    300
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible endpoint base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    800
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_retry_max_ms() -> u64 {
    8_000
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl CompletionConfig {
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Event name replies are published under
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

fn default_event_name() -> String {
    "ai_response".into()
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            event_name: default_event_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.studyhall/config.toml).
    ///
    /// Environment overrides:
    /// - `STUDYHALL_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `STUDYHALL_MODEL`
    /// - `STUDYHALL_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("STUDYHALL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("STUDYHALL_MODEL") {
            config.completion.model = model;
        }

        if let Ok(base_url) = std::env::var("STUDYHALL_BASE_URL") {
            config.completion.base_url = base_url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".studyhall")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "queue.concurrency must be at least 1".into(),
            ));
        }

        if self.queue.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "queue.max_attempts must be at least 1".into(),
            ));
        }

        if self.queue.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "queue.tick_ms must be greater than 0".into(),
            ));
        }

        if self.queue.backoff_base_ms > self.queue.backoff_max_ms {
            return Err(ConfigError::ValidationError(
                "queue.backoff_base_ms must not exceed queue.backoff_max_ms".into(),
            ));
        }

        if self.completion.retry_base_ms > self.completion.retry_max_ms {
            return Err(ConfigError::ValidationError(
                "completion.retry_base_ms must not exceed completion.retry_max_ms".into(),
            ));
        }

        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.priority.high_threshold) || !in_unit(self.priority.normal_threshold) {
            return Err(ConfigError::ValidationError(
                "priority thresholds must be between 0.0 and 1.0".into(),
            ));
        }

        if self.priority.normal_threshold > self.priority.high_threshold {
            return Err(ConfigError::ValidationError(
                "priority.normal_threshold must not exceed priority.high_threshold".into(),
            ));
        }

        if self.completion.temperature < 0.0 || self.completion.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.decision.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "decision.window_size must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            assistant: AssistantConfig::default(),
            decision: DecisionConfig::default(),
            priority: PriorityConfig::default(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
            completion: CompletionConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
