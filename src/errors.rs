//! Node Registration Error Hierarchy
//!
//! Errors are grouped by pipeline stage. Per-node failures carry a
//! [`FailureKind`] so the worker can decide between retrying and skipping
//! the node; only process-level failures (configuration, cluster
//! connectivity, a terminated watch) stop the controller.

use config::ConfigError;
use reqwest::StatusCode;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Control plane connectivity failures
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// The node change subscription terminated
    #[error("Node watch terminated: {0}")]
    Watch(String),

    /// External registration call failures
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Registration marker write-back failures
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Malformed registration annotations
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// How the worker should treat a failed reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient; the same attempt may succeed later
    Retryable,
    /// Repeating the attempt cannot succeed without outside intervention
    Permanent,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The node snapshot could not be encoded as JSON
    #[error("Failed to serialize node {node}: {source}")]
    Serialization {
        node: String,
        #[source]
        source: serde_json::Error,
    },

    /// Connection, TLS or timeout failures talking to the endpoint
    #[error("Registration request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Endpoint answered with anything but 200
    #[error("Registration endpoint {endpoint} responded with {status}")]
    UnexpectedStatus {
        endpoint: String,
        status: StatusCode,
    },
}

impl RegistrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RegistrationError::Serialization { .. } => FailureKind::Permanent,
            RegistrationError::Transport { .. } => FailureKind::Retryable,
            RegistrationError::UnexpectedStatus { status, .. } => {
                if status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS {
                    FailureKind::Retryable
                } else {
                    FailureKind::Permanent
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The stored node changed since the snapshot was read
    #[error("Node {node} was modified concurrently")]
    Conflict { node: String },

    /// The node disappeared before the marker could be written
    #[error("Node {node} no longer exists")]
    NotFound { node: String },

    /// The control plane refused the update
    #[error("Update of node {node} rejected ({code}): {message}")]
    Rejected {
        node: String,
        code: u16,
        message: String,
    },

    /// Snapshot lacks the metadata required for an update
    #[error("Node snapshot is missing {field}")]
    IncompleteSnapshot { field: &'static str },

    /// Control plane unreachable during the update
    #[error("Update of node {node} failed: {source}")]
    Transport {
        node: String,
        #[source]
        source: kube::Error,
    },
}

impl PersistError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PersistError::Conflict { .. } | PersistError::Transport { .. } => {
                FailureKind::Retryable
            }
            PersistError::Rejected { code, .. } if *code >= 500 || *code == 429 => {
                FailureKind::Retryable
            }
            _ => FailureKind::Permanent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("Registration endpoint is empty")]
    EmptyEndpoint,

    #[error("Registration endpoint {value:?} is not a valid URL: {reason}")]
    InvalidEndpoint { value: String, reason: String },

    #[error("Registration endpoint scheme {scheme:?} is not allowed")]
    UnsupportedScheme { scheme: String },
}

impl Error {
    /// Failure class of a per-node error. Process-level errors are permanent.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Registration(e) => e.kind(),
            Error::Persist(e) => e.kind(),
            _ => FailureKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }
}
