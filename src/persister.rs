//! Durable registration marker.
//!
//! The marker is written with a replace (PUT) that carries the snapshot's
//! `resourceVersion`, so the control plane rejects writes based on a stale
//! snapshot instead of silently overwriting concurrent changes.
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::api::PostParams;
use kube::Client;
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::warn;

use crate::constants::REGISTERED_MARKER_VALUE;
use crate::AnnotationKeys;
use crate::PersistError;

type PersistResult<T> = std::result::Result<T, PersistError>;

/// Authoritative node store of the orchestrator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeStore: Send + Sync + 'static {
    /// Reads the latest stored version of a node
    async fn get(
        &self,
        name: &str,
    ) -> PersistResult<Node>;

    /// Replaces a node, failing with [`PersistError::Conflict`] when the
    /// stored version no longer matches the snapshot's
    async fn replace(
        &self,
        node: &Node,
    ) -> PersistResult<Node>;
}

/// [`NodeStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeNodeStore {
    api: Api<Node>,
}

impl KubeNodeStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeStore for KubeNodeStore {
    async fn get(
        &self,
        name: &str,
    ) -> PersistResult<Node> {
        self.api.get(name).await.map_err(|e| map_kube_error(name, e))
    }

    async fn replace(
        &self,
        node: &Node,
    ) -> PersistResult<Node> {
        let name = node.metadata.name.as_deref().ok_or(PersistError::IncompleteSnapshot {
            field: "metadata.name",
        })?;
        if node.metadata.resource_version.is_none() {
            return Err(PersistError::IncompleteSnapshot {
                field: "metadata.resourceVersion",
            });
        }

        self.api
            .replace(name, &PostParams::default(), node)
            .await
            .map_err(|e| map_kube_error(name, e))
    }
}

pub(crate) fn map_kube_error(
    node: &str,
    err: kube::Error,
) -> PersistError {
    match err {
        kube::Error::Api(response) if response.code == 409 => PersistError::Conflict {
            node: node.to_string(),
        },
        kube::Error::Api(response) if response.code == 404 => PersistError::NotFound {
            node: node.to_string(),
        },
        kube::Error::Api(response) => PersistError::Rejected {
            node: node.to_string(),
            code: response.code,
            message: response.message,
        },
        other => PersistError::Transport {
            node: node.to_string(),
            source: other,
        },
    }
}

/// Records successful registrations on the node itself
pub struct StatePersister<S: NodeStore> {
    store: Arc<S>,
    keys: AnnotationKeys,
}

impl<S: NodeStore> StatePersister<S> {
    pub fn new(
        store: Arc<S>,
        keys: AnnotationKeys,
    ) -> Self {
        Self { store, keys }
    }

    /// Sets the registered marker and writes the node back.
    ///
    /// On a version conflict the latest node is fetched, the marker re-applied
    /// and the write attempted once more. A second conflict is returned to the
    /// caller, whose retry policy decides what happens next.
    pub async fn mark_registered(
        &self,
        node: &Node,
    ) -> PersistResult<Node> {
        let name = node.name_any();
        let mut candidate = node.clone();
        self.apply_marker(&mut candidate);

        match self.store.replace(&candidate).await {
            Err(PersistError::Conflict { .. }) => {
                warn!(node = %name, "stale snapshot while recording registration; refetching");
                let mut latest = self.store.get(&name).await?;
                if self.has_marker(&latest) {
                    debug!(node = %name, "registration marker already present");
                    return Ok(latest);
                }
                self.apply_marker(&mut latest);
                self.store.replace(&latest).await
            }
            result => result,
        }
    }

    fn apply_marker(
        &self,
        node: &mut Node,
    ) {
        node.annotations_mut()
            .insert(self.keys.registered.clone(), REGISTERED_MARKER_VALUE.to_string());
    }

    fn has_marker(
        &self,
        node: &Node,
    ) -> bool {
        node.annotations().contains_key(&self.keys.registered)
    }
}
