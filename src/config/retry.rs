use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of retries after the first attempt (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub(crate) fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}: base_delay_ms {} exceeds max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as u32;
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Divide strategies by pipeline stage
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// External registration call (network errors, 5xx, 429)
    #[serde(default = "default_registration_policy")]
    pub registration: BackoffPolicy,

    /// Marker write-back (optimistic-concurrency conflicts, control plane hiccups)
    #[serde(default = "default_persist_policy")]
    pub persist: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            registration: default_registration_policy(),
            persist: default_persist_policy(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.registration.validate("registration")?;
        self.persist.validate("persist")?;
        Ok(())
    }
}

fn default_registration_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        base_delay_ms: 500,
        max_delay_ms: 10_000,
    }
}
fn default_persist_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 5,
        base_delay_ms: 100,
        max_delay_ms: 2_000,
    }
}
fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
