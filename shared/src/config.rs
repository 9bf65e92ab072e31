use std::time::Duration;

use serde::Deserialize;

fn default_database_url() -> String {
    "postgres://postgres:postgres@db:5432/documents".into()
}

fn default_message_broker_url() -> String {
    "kafka:9092".into()
}

fn default_storage_root() -> String {
    "/data/uploads".into()
}

fn default_consumer_group() -> String {
    "classification-runner".into()
}

fn default_pool_size() -> usize {
    16
}

fn default_classifier_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".into()
}

fn default_pages_per_chunk() -> usize {
    20
}

fn default_max_pages() -> usize {
    500
}

fn default_max_chunks() -> usize {
    25
}

fn default_max_text_chars() -> usize {
    100_000
}

fn default_max_concurrent_calls() -> usize {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_confidence_threshold() -> f64 {
    0.65
}

fn default_quota_backoff_ms() -> u64 {
    1_000
}

fn default_active_stale_minutes() -> u64 {
    10
}

fn default_backlog_stale_minutes() -> u64 {
    30
}

/// Process-wide settings, read once from the environment at start-up.
///
/// Components never see this struct directly; they receive the immutable
/// slice they need through [`Settings::extraction`], [`Settings::classifier`]
/// and [`Settings::recovery`].
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_message_broker_url")]
    pub message_broker_url: String,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    /// Directory relative storage references are resolved against.
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub classifier_api_key: String,
    #[serde(default = "default_classifier_endpoint")]
    pub classifier_endpoint: String,
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,
    #[serde(default = "default_pages_per_chunk")]
    pub pages_per_chunk: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_quota_backoff_ms")]
    pub quota_backoff_ms: u64,
    #[serde(default = "default_active_stale_minutes")]
    pub active_stale_minutes: u64,
    #[serde(default = "default_backlog_stale_minutes")]
    pub backlog_stale_minutes: u64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn extraction(&self) -> ExtractionLimits {
        ExtractionLimits {
            pages_per_chunk: self.pages_per_chunk.max(1),
            max_pages: self.max_pages,
            max_chunks: self.max_chunks.max(1),
            max_text_chars: self.max_text_chars,
        }
    }

    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            endpoint: self.classifier_endpoint.clone(),
            model: self.classifier_model.clone(),
            api_key: self.classifier_api_key.clone(),
            max_concurrent_calls: self.max_concurrent_calls.max(1),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_attempts: self.max_attempts.max(1),
            confidence_threshold: self.confidence_threshold,
            quota_backoff_base: Duration::from_millis(self.quota_backoff_ms),
        }
    }

    pub fn recovery(&self) -> RecoveryConfig {
        RecoveryConfig {
            active_stale: Duration::from_secs(self.active_stale_minutes * 60),
            backlog_stale: Duration::from_secs(self.backlog_stale_minutes * 60),
        }
    }
}

/// Size guardrails applied by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Pages per chunk; documents at or below this size are one unit.
    pub pages_per_chunk: usize,
    /// Hard cap on the page count of a paginated document.
    pub max_pages: usize,
    /// Hard cap on the number of chunks one document may produce.
    pub max_chunks: usize,
    /// Character cap for non-paginated formats (truncated, not rejected).
    pub max_text_chars: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            pages_per_chunk: default_pages_per_chunk(),
            max_pages: default_max_pages(),
            max_chunks: default_max_chunks(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub max_concurrent_calls: usize,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub confidence_threshold: f64,
    pub quota_backoff_base: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            model: default_classifier_model(),
            api_key: String::new(),
            max_concurrent_calls: default_max_concurrent_calls(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            max_attempts: default_max_attempts(),
            confidence_threshold: default_confidence_threshold(),
            quota_backoff_base: Duration::from_millis(default_quota_backoff_ms()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Age after which `extracting`/`classifying` records count as interrupted.
    pub active_stale: Duration,
    /// Age after which `queued` records count as orphaned.
    pub backlog_stale: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            active_stale: Duration::from_secs(default_active_stale_minutes() * 60),
            backlog_stale: Duration::from_secs(default_backlog_stale_minutes() * 60),
        }
    }
}
