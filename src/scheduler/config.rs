//! Configuration for the scheduler module

use serde::{Deserialize, Serialize};

/// Configuration for the reconciling scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Upper bound on a full desired-schedule load, including retries
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Upper bound on loading one job's interval or cron rows
    #[serde(default = "default_per_job_timeout_secs")]
    pub per_job_timeout_secs: u64,

    /// Upper bound on handling a single change notification
    #[serde(default = "default_event_timeout_secs")]
    pub event_timeout_secs: u64,

    /// Capacity of the change-notification channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Retry policy for a not-ready job store
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backoff-with-jitter retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Fraction of the delay randomized around its midpoint (0.0..=1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            load_timeout_secs: default_load_timeout_secs(),
            per_job_timeout_secs: default_per_job_timeout_secs(),
            event_timeout_secs: default_event_timeout_secs(),
            event_buffer: default_event_buffer(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for [`SchedulerConfig`]
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    config: Option<SchedulerConfig>,
}

impl SchedulerConfigBuilder {
    fn config(&mut self) -> &mut SchedulerConfig {
        self.config.get_or_insert_with(SchedulerConfig::default)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config().enabled = enabled;
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config().load_timeout_secs = secs;
        self
    }

    pub fn per_job_timeout_secs(mut self, secs: u64) -> Self {
        self.config().per_job_timeout_secs = secs;
        self
    }

    pub fn event_timeout_secs(mut self, secs: u64) -> Self {
        self.config().event_timeout_secs = secs;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config().retry = retry;
        self
    }

    pub fn build(mut self) -> SchedulerConfig {
        self.config.take().unwrap_or_default()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_load_timeout_secs() -> u64 {
    30
}

fn default_per_job_timeout_secs() -> u64 {
    5
}

fn default_event_timeout_secs() -> u64 {
    10
}

fn default_event_buffer() -> usize {
    64
}

fn default_max_attempts() -> u32 {
    20
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_jitter() -> f64 {
    0.5
}
