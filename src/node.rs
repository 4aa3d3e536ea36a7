use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

/// Whether a snapshot is the first one observed for its node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Updated => "updated",
        }
    }
}

/// Full node snapshot delivered by the change stream
#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub kind: EventKind,
    pub node: Node,
}

impl NodeEvent {
    pub fn added(node: Node) -> Self {
        Self {
            kind: EventKind::Added,
            node,
        }
    }

    pub fn updated(node: Node) -> Self {
        Self {
            kind: EventKind::Updated,
            node,
        }
    }

    pub fn name(&self) -> String {
        self.node.name_any()
    }

    /// Opaque version token (`metadata.resourceVersion`)
    pub fn version(&self) -> Option<String> {
        self.node.resource_version()
    }
}
