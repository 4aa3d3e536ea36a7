use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use kube::api::ObjectMeta;

pub(crate) const REGISTER_KEY: &str = "rossedman.io/register";
pub(crate) const REGISTERED_KEY: &str = "rossedman.io/registered";

/// Builds a node snapshot with the given version token and annotations
pub(crate) fn node(
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
            annotations: if annotations.is_empty() {
                None
            } else {
                Some(annotations)
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Same node with a `metadata.uid`, to tell recreated objects apart
pub(crate) fn with_uid(
    mut node: Node,
    uid: &str,
) -> Node {
    node.metadata.uid = Some(uid.to_string());
    node
}

pub(crate) fn opted_in_node(
    name: &str,
    version: &str,
    endpoint: &str,
) -> Node {
    node(name, version, &[(REGISTER_KEY, endpoint)])
}
