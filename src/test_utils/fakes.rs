use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use reqwest::StatusCode;
use reqwest::Url;

use crate::NodeStore;
use crate::PersistError;
use crate::Registrar;
use crate::RegistrationError;

/// Registrar that records calls and concurrency, answering with a fixed status
pub(crate) struct RecordingRegistrar {
    status: StatusCode,
    delay: Duration,
    calls: Mutex<Vec<(String, String)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    active_per_node: Mutex<HashMap<String, usize>>,
    max_active_per_node: AtomicUsize,
}

impl RecordingRegistrar {
    pub(crate) fn new(
        status: StatusCode,
        delay: Duration,
    ) -> Self {
        Self {
            status,
            delay,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            active_per_node: Mutex::new(HashMap::new()),
            max_active_per_node: AtomicUsize::new(0),
        }
    }

    /// (node name, version token) per call, in call order
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active_per_node(&self) -> usize {
        self.max_active_per_node.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrar for RecordingRegistrar {
    async fn register(
        &self,
        endpoint: &Url,
        node: &Node,
    ) -> Result<(), RegistrationError> {
        let name = node.name_any();
        self.calls
            .lock()
            .unwrap()
            .push((name.clone(), node.resource_version().unwrap_or_default()));

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        {
            let mut per_node = self.active_per_node.lock().unwrap();
            let count = per_node.entry(name.clone()).or_default();
            *count += 1;
            self.max_active_per_node.fetch_max(*count, Ordering::SeqCst);
        }

        tokio::time::sleep(self.delay).await;

        *self.active_per_node.lock().unwrap().get_mut(&name).unwrap() -= 1;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.status == StatusCode::OK {
            Ok(())
        } else {
            Err(RegistrationError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: self.status,
            })
        }
    }
}

/// Store that accepts every write and remembers the last one per node
#[derive(Default)]
pub(crate) struct InMemoryNodeStore {
    nodes: Mutex<HashMap<String, Node>>,
}

impl InMemoryNodeStore {
    pub(crate) fn stored(
        &self,
        name: &str,
    ) -> Option<Node> {
        self.nodes.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
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
        let mut stored = node.clone();
        let next = node
            .resource_version()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(1, |v| v + 1);
        stored.metadata.resource_version = Some(next.to_string());
        self.nodes
            .lock()
            .unwrap()
            .insert(node.name_any(), stored.clone());
        Ok(stored)
    }
}
