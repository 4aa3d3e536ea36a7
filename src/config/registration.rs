use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters of the outbound registration call
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistrationConfig {
    /// Whole-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Reject endpoints that are not absolute URLs with a host and allowed scheme
    #[serde(default = "default_validate_endpoint")]
    pub validate_endpoint: bool,

    /// URL schemes accepted in the register annotation
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            validate_endpoint: default_validate_endpoint(),
            allowed_schemes: default_allowed_schemes(),
        }
    }
}

impl RegistrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "registration.request_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.connect_timeout_ms == 0 || self.connect_timeout_ms > self.request_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "registration.connect_timeout_ms {} must be within (0, {}]",
                self.connect_timeout_ms, self.request_timeout_ms
            ))));
        }

        if self.allowed_schemes.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "registration.allowed_schemes cannot be empty".into(),
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn is_scheme_allowed(
        &self,
        scheme: &str,
    ) -> bool {
        self.allowed_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
    }
}

fn default_request_timeout() -> u64 {
    10_000
}
fn default_connect_timeout() -> u64 {
    3_000
}
fn default_validate_endpoint() -> bool {
    true
}
fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}
