use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ANNOTATION_PREFIX;
use crate::constants::REGISTERED_ANNOTATION;
use crate::constants::REGISTER_ANNOTATION;
use crate::Error;
use crate::Result;

/// Control plane connection and node selection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Path to a kubeconfig. Only required if out-of-cluster; when unset the
    /// client falls back to `KUBECONFIG` / in-cluster service account.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace prefix for the register/registered annotations
    #[serde(default = "default_annotation_prefix")]
    pub annotation_prefix: String,

    /// Optional label selector narrowing which nodes are watched
    #[serde(default)]
    pub label_selector: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            annotation_prefix: default_annotation_prefix(),
            label_selector: None,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.annotation_prefix;
        if prefix.contains('/') || prefix.chars().any(char::is_whitespace) {
            return Err(Error::Config(ConfigError::Message(format!(
                "annotation_prefix {prefix:?} must be a bare DNS subdomain"
            ))));
        }

        if let Some(path) = &self.kubeconfig {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "kubeconfig path cannot be empty".into(),
                )));
            }
        }

        Ok(())
    }

    pub fn annotation_keys(&self) -> AnnotationKeys {
        AnnotationKeys::new(&self.annotation_prefix)
    }
}

/// Fully-qualified annotation keys driving registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    pub register: String,
    pub registered: String,
}

impl AnnotationKeys {
    pub fn new(prefix: &str) -> Self {
        let qualify = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            }
        };
        Self {
            register: qualify(REGISTER_ANNOTATION),
            registered: qualify(REGISTERED_ANNOTATION),
        }
    }
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self::new(DEFAULT_ANNOTATION_PREFIX)
    }
}

fn default_annotation_prefix() -> String {
    DEFAULT_ANNOTATION_PREFIX.to_string()
}
