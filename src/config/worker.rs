use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Reconcile worker pool
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Upper bound on nodes reconciled at the same time.
    /// A single node is never reconciled twice concurrently regardless of this value.
    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,

    /// How long shutdown waits for in-flight reconciles (milliseconds)
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
            drain_timeout_ms: default_drain_timeout(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_reconciles == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker.max_concurrent_reconciles must be at least 1".into(),
            )));
        }
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn default_max_concurrent_reconciles() -> usize {
    4
}
fn default_drain_timeout() -> u64 {
    10_000
}
