//! Configuration for correlation registries

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a correlation registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// How long a pending request waits for its response before timing out
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

impl CorrelationConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            wait_secs: default_wait_secs(),
        }
    }
}

fn default_wait_secs() -> u64 {
    30
}
