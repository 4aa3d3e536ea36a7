use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Listener for `/metrics` and the `/healthz` probe endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub prometheus_enabled: bool,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,

    #[serde(default = "default_listen_address")]
    pub listen_address: IpAddr,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: default_prometheus_enabled(),
            prometheus_port: default_prometheus_port(),
            listen_address: default_listen_address(),
        }
    }
}

impl MonitoringConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.prometheus_port)
    }

    /// Nothing is checked while the listener is disabled.
    ///
    /// When enabled, the listener has to be reachable from outside the pod:
    /// scrapers and kubelet probes never connect to loopback or to a random
    /// port.
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            return Ok(());
        }

        if self.prometheus_port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "prometheus_port must be a fixed port so probes can reach /healthz".into(),
            )));
        }
        if self.listen_address.is_loopback() {
            return Err(Error::Config(ConfigError::Message(format!(
                "listen_address {} is unreachable for scrapers and health probes",
                self.listen_address
            ))));
        }

        Ok(())
    }
}

fn default_prometheus_enabled() -> bool {
    false
}

fn default_prometheus_port() -> u16 {
    9090
}

fn default_listen_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
