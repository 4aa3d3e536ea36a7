//! Collaborators shared by the integration tests: a local registration
//! endpoint and an in-memory node store with optimistic concurrency.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use node_registrar::NodeStore;
use node_registrar::PersistError;
use node_registrar::RegistrarConfig;
use warp::http::StatusCode;
use warp::Filter;

pub const REGISTER_KEY: &str = "rossedman.io/register";
pub const REGISTERED_KEY: &str = "rossedman.io/registered";

pub fn node(
    name: &str,
    version: &str,
    annotations: &[(&str, &str)],
) -> Node {
    let annotations: BTreeMap<String, String> = annotations
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            resource_version: Some(version.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Registration endpoint recording every POSTed body
pub struct Endpoint {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl Endpoint {
    pub fn spawn(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let route = warp::post()
            .and(warp::path!("register"))
            .and(warp::body::json())
            .map(move |body: serde_json::Value| {
                sink.lock().unwrap().push(body);
                warp::reply::with_status("", status)
            });

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        Self { addr, received }
    }

    pub fn url(&self) -> String {
        format!("http://{}/register", self.addr)
    }

    /// Names of the nodes POSTed so far, in arrival order
    pub fn registered_names(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter_map(|body| body["metadata"]["name"].as_str().map(str::to_string))
            .collect()
    }
}

/// A URL nothing listens on
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/register")
}

/// Node store enforcing `resourceVersion` preconditions like the API server
#[derive(Default)]
pub struct FakeNodeStore {
    nodes: Mutex<HashMap<String, Node>>,
    writes: Mutex<Vec<String>>,
}

impl FakeNodeStore {
    pub fn seed(
        &self,
        node: &Node,
    ) {
        self.nodes.lock().unwrap().insert(node.name_any(), node.clone());
    }

    pub fn stored(
        &self,
        name: &str,
    ) -> Option<Node> {
        self.nodes.lock().unwrap().get(name).cloned()
    }

    /// Names of the nodes written back, in write order
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeStore for FakeNodeStore {
    async fn get(
        &self,
        name: &str,
    ) -> Result<Node, PersistError> {
        self.stored(name).ok_or_else(|| PersistError::NotFound {
            node: name.to_string(),
        })
    }

    async fn replace(
        &self,
        node: &Node,
    ) -> Result<Node, PersistError> {
        let name = node.name_any();
        let mut nodes = self.nodes.lock().unwrap();
        let current = nodes.get(&name).ok_or_else(|| PersistError::NotFound {
            node: name.clone(),
        })?;
        if current.resource_version() != node.resource_version() {
            return Err(PersistError::Conflict { node: name });
        }

        let next = current
            .resource_version()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(1, |v| v + 1);
        let mut stored = node.clone();
        stored.metadata.resource_version = Some(next.to_string());
        nodes.insert(name.clone(), stored.clone());
        self.writes.lock().unwrap().push(name);
        Ok(stored)
    }
}

/// Defaults tuned for tests: no registration retries, short timeouts
pub fn test_config() -> RegistrarConfig {
    let mut config = RegistrarConfig::default();
    config.registration.request_timeout_ms = 2_000;
    config.registration.connect_timeout_ms = 500;
    config.retry.registration.max_retries = 0;
    config.retry.persist.base_delay_ms = 1;
    config.retry.persist.max_delay_ms = 5;
    config.worker.drain_timeout_ms = Duration::from_secs(5).as_millis() as u64;
    config
}
