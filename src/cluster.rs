use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use tracing::info;

use crate::ClusterConfig;
use crate::Error;
use crate::Result;

/// Builds a client from the configured kubeconfig, or the environment when
/// none is set, and checks that the control plane answers.
pub async fn connect(cluster: &ClusterConfig) -> Result<Client> {
    let client = match &cluster.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::Fatal(format!("failed to read kubeconfig {}: {e}", path.display()))
            })?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::Fatal(format!("invalid kubeconfig {}: {e}", path.display()))
                })?;
            Client::try_from(config)?
        }
        None => Client::try_default().await?,
    };

    let version = client.apiserver_version().await?;
    info!(
        major = %version.major,
        minor = %version.minor,
        "connected to control plane"
    );
    Ok(client)
}
