use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::Url;
use tracing::debug;

use crate::Error;
use crate::RegistrationConfig;
use crate::RegistrationError;
use crate::Result;

/// Performs the external registration side effect for one node
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Registrar: Send + Sync + 'static {
    /// Submits the full node snapshot to `endpoint`.
    /// Succeeds only when the endpoint answers exactly 200.
    async fn register(
        &self,
        endpoint: &Url,
        node: &Node,
    ) -> std::result::Result<(), RegistrationError>;
}

/// JSON-over-HTTP registrar
#[derive(Debug, Clone)]
pub struct HttpRegistrar {
    client: Client,
}

impl HttpRegistrar {
    pub fn new(config: &RegistrationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| Error::Fatal(format!("failed to build registration client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Registrar for HttpRegistrar {
    async fn register(
        &self,
        endpoint: &Url,
        node: &Node,
    ) -> std::result::Result<(), RegistrationError> {
        let body = serde_json::to_vec(node).map_err(|source| RegistrationError::Serialization {
            node: node.name_any(),
            source,
        })?;

        let response = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| RegistrationError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        debug!(node = %node.name_any(), %endpoint, %status, "registration endpoint responded");

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(RegistrationError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status,
            })
        }
    }
}
