//! Bounded worker pool with per-node sequencing.
//!
//! Every node with pending work owns exactly one task. Snapshots arriving
//! while that task is busy are queued behind it in arrival order, so a node is
//! never reconciled by two tasks at once while different nodes proceed in
//! parallel, up to `max_concurrent_reconciles`.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::metrics::IN_FLIGHT_RECONCILES;
use crate::metrics::RECONCILE_OUTCOMES;
use crate::EventKind;
use crate::NodeEvent;
use crate::NodeStore;
use crate::Reconciler;
use crate::Registrar;

type Backlog = Arc<DashMap<String, VecDeque<NodeEvent>>>;

pub struct Dispatcher<R, S>
where
    R: Registrar,
    S: NodeStore,
{
    reconciler: Arc<Reconciler<R, S>>,
    permits: Arc<Semaphore>,
    /// Present while a node has a live task; holds snapshots waiting behind it
    backlog: Backlog,
    tracker: TaskTracker,
}

impl<R, S> Dispatcher<R, S>
where
    R: Registrar,
    S: NodeStore,
{
    pub fn new(
        reconciler: Arc<Reconciler<R, S>>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            reconciler,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            backlog: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Schedules a notification, queueing it if the node already has a task.
    pub fn dispatch(
        &self,
        event: NodeEvent,
    ) {
        let name = event.name();

        match self.backlog.entry(name.clone()) {
            Entry::Occupied(mut queued) => {
                queued.get_mut().push_back(event);
                trace!(node = %name, depth = queued.get().len(), "node busy; snapshot queued");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::new());
            }
        }

        let reconciler = self.reconciler.clone();
        let permits = self.permits.clone();
        let backlog = self.backlog.clone();
        self.tracker
            .spawn(drain_node(name, event, reconciler, permits, backlog));
    }

    /// Number of nodes with a live task
    pub fn active_nodes(&self) -> usize {
        self.backlog.len()
    }

    /// Waits up to `drain_timeout` for every node task to finish.
    /// Returns false if tasks were still running when the timeout hit.
    pub async fn shutdown(
        &self,
        drain_timeout: Duration,
    ) -> bool {
        self.tracker.close();
        debug!(active = self.active_nodes(), "draining reconcile tasks");

        match timeout(drain_timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    active = self.active_nodes(),
                    ?drain_timeout,
                    "reconcile tasks still running at shutdown"
                );
                false
            }
        }
    }
}

async fn drain_node<R, S>(
    name: String,
    first: NodeEvent,
    reconciler: Arc<Reconciler<R, S>>,
    permits: Arc<Semaphore>,
    backlog: Backlog,
) where
    R: Registrar,
    S: NodeStore,
{
    let mut current = first;
    loop {
        match permits.acquire().await {
            Ok(_permit) => {
                IN_FLIGHT_RECONCILES.inc();
                process(&name, &reconciler, &current).await;
                IN_FLIGHT_RECONCILES.dec();
            }
            Err(_) => {
                error!(node = %name, "worker pool closed");
                backlog.remove(&name);
                return;
            }
        }

        // Remove the entry only when nothing is queued, so a concurrent
        // dispatch either lands in our queue or starts a fresh task.
        if backlog.remove_if(&name, |_, queued| queued.is_empty()).is_some() {
            return;
        }
        match backlog.get_mut(&name).and_then(|mut queued| queued.pop_front()) {
            Some(next) => current = next,
            None => return,
        }
    }
}

async fn process<R, S>(
    name: &str,
    reconciler: &Reconciler<R, S>,
    event: &NodeEvent,
) where
    R: Registrar,
    S: NodeStore,
{
    if event.kind == EventKind::Added {
        reconciler.forget(name);
    }

    match reconciler.reconcile_with_retry(&event.node).await {
        Ok(outcome) => {
            RECONCILE_OUTCOMES.with_label_values(&[outcome.as_str()]).inc();
            trace!(node = %name, outcome = outcome.as_str(), "reconciled");
        }
        Err(e) => {
            RECONCILE_OUTCOMES.with_label_values(&["failed"]).inc();
            error!(
                node = %name,
                error = %e,
                retryable = e.is_retryable(),
                "reconcile failed; skipping node until its next change"
            );
        }
    }
}
