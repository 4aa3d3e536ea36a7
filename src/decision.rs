//! Registration decision engine.
//!
//! Classification is presence-based: the value of the register annotation is
//! only inspected afterwards, by [`resolve_endpoint`], right before a call
//! would be made.
use std::collections::BTreeMap;

use reqwest::Url;

use crate::AnnotationKeys;
use crate::ClassificationError;
use crate::RegistrationConfig;

/// Derived per-notification state of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    /// Neither annotation present; nothing to do
    Idle,
    /// Opted in and not yet registered
    NeedsRegistration { endpoint: String },
    /// Marker present; terminal
    Registered,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Idle => "idle",
            RegistrationState::NeedsRegistration { .. } => "needs_registration",
            RegistrationState::Registered => "registered",
        }
    }
}

/// `registered` always wins over `register`.
pub fn classify(
    annotations: &BTreeMap<String, String>,
    keys: &AnnotationKeys,
) -> RegistrationState {
    if annotations.contains_key(&keys.registered) {
        return RegistrationState::Registered;
    }

    match annotations.get(&keys.register) {
        Some(endpoint) => RegistrationState::NeedsRegistration {
            endpoint: endpoint.clone(),
        },
        None => RegistrationState::Idle,
    }
}

/// Turns a raw register annotation value into a callable URL.
///
/// An empty value is never callable. With `validate_endpoint` disabled any
/// parseable URL is accepted; otherwise the scheme must be allowed and a host
/// present.
pub fn resolve_endpoint(
    raw: &str,
    config: &RegistrationConfig,
) -> Result<Url, ClassificationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ClassificationError::EmptyEndpoint);
    }

    let url = Url::parse(raw).map_err(|e| ClassificationError::InvalidEndpoint {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !config.validate_endpoint {
        return Ok(url);
    }

    if !config.is_scheme_allowed(url.scheme()) {
        return Err(ClassificationError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ClassificationError::InvalidEndpoint {
            value: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}
