//! Controller configuration from YAML

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the work queue and worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers
    pub workers: usize,

    /// First requeue delay after a transient failure (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound on the requeue delay (milliseconds)
    pub backoff_max_ms: u64,

    /// Drop a key after this many consecutive failures (None = retry forever)
    pub max_requeues: Option<u32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            backoff_base_ms: 5,
            backoff_max_ms: 1000 * 1000,
            max_requeues: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ControllerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.backoff_base_ms == 0 {
            anyhow::bail!("backoff_base_ms must be greater than 0");
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            anyhow::bail!(
                "backoff_max_ms ({}) must not be smaller than backoff_base_ms ({})",
                self.backoff_max_ms,
                self.backoff_base_ms
            );
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
