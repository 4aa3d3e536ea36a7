//! Per-node registration pipeline.
//!
//! ```text
//! ledger says Registered ───────────────────────────────▶ AlreadyRegistered
//! ledger says PendingPersist ──▶ mark_registered ───────▶ Persisted
//! classify ─▶ Idle ─────────────────────────────────────▶ Idle
//!          ─▶ Registered ───────────────────────────────▶ AlreadyRegistered
//!          ─▶ NeedsRegistration ─▶ resolve_endpoint ─✗──▶ InvalidEndpoint
//!                                  │
//!                                  ▼
//!                     Registrar::register ─▶ PendingPersist ─▶ mark_registered ─▶ Registered
//! ```
//!
//! Once the endpoint accepted a registration the node is never POSTed again by
//! this process, even if writing the marker keeps failing.
use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::classify;
use crate::metrics::PERSIST_CALLS;
use crate::metrics::REGISTRATION_CALLS;
use crate::metrics::REGISTRATION_DURATION;
use crate::resolve_endpoint;
use crate::AnnotationKeys;
use crate::BackoffPolicy;
use crate::ClassificationError;
use crate::FailureKind;
use crate::LedgerState;
use crate::NodeStore;
use crate::Registrar;
use crate::RegistrarConfig;
use crate::RegistrationConfig;
use crate::RegistrationLedger;
use crate::RegistrationState;
use crate::Result;
use crate::RetryPolicies;
use crate::StatePersister;

/// Successful (non-error) result of reconciling one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Node has not opted in
    Idle,
    /// Marker present on the node or recorded earlier by this process
    AlreadyRegistered,
    /// Endpoint called and marker written
    Registered,
    /// Marker written for a registration performed by an earlier attempt
    Persisted,
    /// Opted in, but the endpoint cannot be called; node is skipped
    InvalidEndpoint(ClassificationError),
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Idle => "idle",
            ReconcileOutcome::AlreadyRegistered => "already_registered",
            ReconcileOutcome::Registered => "registered",
            ReconcileOutcome::Persisted => "persisted",
            ReconcileOutcome::InvalidEndpoint(_) => "invalid_endpoint",
        }
    }
}

pub struct Reconciler<R, S>
where
    R: Registrar,
    S: NodeStore,
{
    registrar: Arc<R>,
    persister: StatePersister<S>,
    ledger: Arc<RegistrationLedger>,
    keys: AnnotationKeys,
    registration: RegistrationConfig,
    retry: RetryPolicies,
}

impl<R, S> Reconciler<R, S>
where
    R: Registrar,
    S: NodeStore,
{
    pub fn new(
        registrar: Arc<R>,
        store: Arc<S>,
        config: &RegistrarConfig,
    ) -> Self {
        let keys = config.cluster.annotation_keys();
        Self {
            registrar,
            persister: StatePersister::new(store, keys.clone()),
            ledger: Arc::new(RegistrationLedger::new()),
            keys,
            registration: config.registration.clone(),
            retry: config.retry.clone(),
        }
    }

    pub fn ledger(&self) -> &Arc<RegistrationLedger> {
        &self.ledger
    }

    /// Drops registration state left by an earlier object with this name.
    ///
    /// Called when the change stream reports a node as new, which happens
    /// after the previous object under that name was deleted.
    pub fn forget(
        &self,
        name: &str,
    ) {
        if let Some(state) = self.ledger.forget(name) {
            debug!(node = %name, ?state, "node object replaced; previous registration state dropped");
        }
    }

    /// Runs the pipeline once for a snapshot. No retries.
    pub async fn reconcile(
        &self,
        node: &Node,
    ) -> Result<ReconcileOutcome> {
        let name = node.name_any();
        let state = classify(node.annotations(), &self.keys);

        if state == RegistrationState::Registered {
            self.ledger.mark_registered(node);
            debug!(node = %name, "node has registered");
            return Ok(ReconcileOutcome::AlreadyRegistered);
        }

        match self.ledger.get(node) {
            Some(LedgerState::Registered) => {
                debug!(node = %name, "registration already recorded by this process");
                return Ok(ReconcileOutcome::AlreadyRegistered);
            }
            Some(LedgerState::PendingPersist) => {
                self.persist(node).await?;
                return Ok(ReconcileOutcome::Persisted);
            }
            None => {}
        }

        let RegistrationState::NeedsRegistration { endpoint } = state else {
            debug!(node = %name, "node has not opted into registration");
            return Ok(ReconcileOutcome::Idle);
        };

        let url = match resolve_endpoint(&endpoint, &self.registration) {
            Ok(url) => url,
            Err(e) => {
                warn!(node = %name, error = %e, "skipping node with unusable register annotation");
                return Ok(ReconcileOutcome::InvalidEndpoint(e));
            }
        };

        info!(node = %name, endpoint = %url, "registering node");
        let started = Instant::now();
        let result = self.registrar.register(&url, node).await;
        REGISTRATION_DURATION.observe(started.elapsed().as_secs_f64());
        if let Err(e) = result {
            REGISTRATION_CALLS.with_label_values(&[failure_label(e.kind())]).inc();
            return Err(e.into());
        }
        REGISTRATION_CALLS.with_label_values(&["success"]).inc();
        self.ledger.mark_pending_persist(node);

        self.persist(node).await?;
        info!(node = %name, "node registered");
        Ok(ReconcileOutcome::Registered)
    }

    /// Retries retryable failures with the policy of the stage that failed.
    ///
    /// A failure after the endpoint accepted the registration only ever
    /// retries the marker write.
    pub async fn reconcile_with_retry(
        &self,
        node: &Node,
    ) -> Result<ReconcileOutcome> {
        let name = node.name_any();
        let mut registration_retries = 0;
        let mut persist_retries = 0;

        loop {
            let err = match self.reconcile(node).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            let (policy, retries): (BackoffPolicy, &mut usize) = match self.ledger.get(node) {
                Some(LedgerState::PendingPersist) => (self.retry.persist, &mut persist_retries),
                _ => (self.retry.registration, &mut registration_retries),
            };
            if *retries >= policy.max_retries {
                warn!(node = %name, retries = *retries, "retries exhausted");
                return Err(err);
            }
            *retries += 1;

            let delay = policy.delay_for(*retries);
            warn!(
                node = %name,
                error = %err,
                attempt = *retries,
                ?delay,
                "retryable reconcile failure; backing off"
            );
            sleep(delay).await;
        }
    }

    async fn persist(
        &self,
        node: &Node,
    ) -> Result<()> {
        match self.persister.mark_registered(node).await {
            Ok(_) => {
                PERSIST_CALLS.with_label_values(&["success"]).inc();
                self.ledger.mark_registered(node);
                Ok(())
            }
            Err(e) => {
                PERSIST_CALLS.with_label_values(&[failure_label(e.kind())]).inc();
                Err(e.into())
            }
        }
    }
}

fn failure_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Retryable => "retryable_failure",
        FailureKind::Permanent => "permanent_failure",
    }
}
