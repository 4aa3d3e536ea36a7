use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::trace;

use crate::metrics::DUPLICATE_NOTIFICATIONS;
use crate::metrics::NODE_NOTIFICATIONS;
use crate::ChangeDeduplicator;
use crate::Dispatcher;
use crate::Error;
use crate::NodeEvent;
use crate::NodeStore;
use crate::Reconciler;
use crate::Registrar;
use crate::Result;
use crate::WorkerConfig;

/// Event loop: watcher → deduplicator → dispatcher
pub struct Controller<R, S>
where
    R: Registrar,
    S: NodeStore,
{
    dedup: ChangeDeduplicator,
    dispatcher: Dispatcher<R, S>,
    drain_timeout: Duration,
}

impl<R, S> Controller<R, S>
where
    R: Registrar,
    S: NodeStore,
{
    pub fn new(
        reconciler: Reconciler<R, S>,
        worker: &WorkerConfig,
    ) -> Self {
        Self {
            dedup: ChangeDeduplicator::new(),
            dispatcher: Dispatcher::new(Arc::new(reconciler), worker.max_concurrent_reconciles),
            drain_timeout: worker.drain_timeout(),
        }
    }

    /// Processes notifications until `shutdown` fires or the stream ends.
    ///
    /// Either way in-flight reconciles are drained before returning. An ended
    /// stream means the subscription is gone and is reported as
    /// [`Error::Watch`].
    pub async fn run<E>(
        mut self,
        events: E,
        shutdown: CancellationToken,
    ) -> Result<()>
    where
        E: Stream<Item = NodeEvent> + Send,
    {
        tokio::pin!(events);
        info!("node registrar started");

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break Ok(());
                }
                event = events.next() => match event {
                    Some(event) => self.handle(event),
                    None => break Err(Error::Watch("node change stream ended".to_string())),
                },
            }
        };

        self.dispatcher.shutdown(self.drain_timeout).await;
        info!(tracked_nodes = self.dedup.len(), "node registrar stopped");
        result
    }

    fn handle(
        &mut self,
        event: NodeEvent,
    ) {
        NODE_NOTIFICATIONS.with_label_values(&[event.kind.as_str()]).inc();

        if !self.dedup.observe(&event) {
            DUPLICATE_NOTIFICATIONS.inc();
            trace!(node = %event.name(), "unchanged version token; dropped");
            return;
        }

        self.dispatcher.dispatch(event);
    }
}
