use std::collections::HashSet;

use futures::future;
use futures::Stream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::runtime::watcher;
use kube::runtime::watcher::Event;
use kube::runtime::WatchStreamExt;
use kube::Client;
use kube::ResourceExt;
use tracing::debug;
use tracing::warn;

use crate::metrics::WATCH_ERRORS;
use crate::ClusterConfig;
use crate::NodeEvent;

/// Subscribes to node snapshots cluster-wide
pub struct NodeWatcher {
    api: Api<Node>,
    config: watcher::Config,
}

impl NodeWatcher {
    pub fn new(
        client: Client,
        cluster: &ClusterConfig,
    ) -> Self {
        let mut config = watcher::Config::default();
        if let Some(selector) = &cluster.label_selector {
            config = config.labels(selector);
        }
        Self {
            api: Api::all(client),
            config,
        }
    }

    /// Endless stream of added/updated notifications.
    ///
    /// Watch failures are retried by the runtime with backoff; re-lists after
    /// a reconnect replay every node as `Updated`, which the deduplicator
    /// filters by version token.
    pub fn stream(self) -> impl Stream<Item = NodeEvent> + Send {
        node_events(watcher(self.api, self.config).default_backoff())
    }
}

/// Maps raw watch events to node notifications.
///
/// The first snapshot seen for a name is `Added`, later ones `Updated`.
/// Deletions only make the next snapshot for that name count as `Added`.
pub fn node_events<S>(raw: S) -> impl Stream<Item = NodeEvent> + Send
where
    S: Stream<Item = Result<Event<Node>, watcher::Error>> + Send,
{
    let mut known: HashSet<String> = HashSet::new();

    raw.filter_map(move |item| {
        let event = match item {
            Ok(Event::Apply(node)) | Ok(Event::InitApply(node)) => {
                if known.insert(node.name_any()) {
                    Some(NodeEvent::added(node))
                } else {
                    Some(NodeEvent::updated(node))
                }
            }
            Ok(Event::Delete(node)) => {
                debug!(node = %node.name_any(), "node deleted");
                known.remove(&node.name_any());
                None
            }
            Ok(Event::Init) => {
                debug!("node list started");
                None
            }
            Ok(Event::InitDone) => {
                debug!(nodes = known.len(), "node list complete");
                None
            }
            Err(e) => {
                WATCH_ERRORS.inc();
                warn!(error = %e, "node watch error; reconnecting");
                None
            }
        };
        future::ready(event)
    })
}
