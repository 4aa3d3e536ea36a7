use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

/// What this process knows about a node's registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    /// Endpoint accepted the registration; marker not yet written back
    PendingPersist,
    /// Marker is durable on the node; terminal
    Registered,
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    /// `metadata.uid` of the node object the state belongs to
    uid: Option<String>,
    state: LedgerState,
}

impl LedgerEntry {
    fn belongs_to(
        &self,
        node: &Node,
    ) -> bool {
        self.uid == node.uid()
    }
}

/// Process-local registration state, shared by all reconcile tasks.
///
/// Snapshots queued before the marker was written still lack it; the ledger
/// keeps such snapshots from triggering a second registration. Entries are
/// bound to the node object's uid, so a node deleted and recreated under the
/// same name starts from a clean slate.
#[derive(Debug, Default)]
pub struct RegistrationLedger {
    entries: DashMap<String, LedgerEntry>,
}

impl RegistrationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// State recorded for this node object, if any
    pub fn get(
        &self,
        node: &Node,
    ) -> Option<LedgerState> {
        self.entries
            .get(&node.name_any())
            .filter(|entry| entry.belongs_to(node))
            .map(|entry| entry.state)
    }

    /// No-op once the same node object is `Registered`
    pub fn mark_pending_persist(
        &self,
        node: &Node,
    ) {
        let pending = LedgerEntry {
            uid: node.uid(),
            state: LedgerState::PendingPersist,
        };
        match self.entries.entry(node.name_any()) {
            Entry::Occupied(mut slot) => {
                if !slot.get().belongs_to(node) {
                    slot.insert(pending);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(pending);
            }
        }
    }

    pub fn mark_registered(
        &self,
        node: &Node,
    ) {
        self.entries.insert(
            node.name_any(),
            LedgerEntry {
                uid: node.uid(),
                state: LedgerState::Registered,
            },
        );
    }

    /// Drops whatever was recorded under `name`
    pub fn forget(
        &self,
        name: &str,
    ) -> Option<LedgerState> {
        self.entries.remove(name).map(|(_, entry)| entry.state)
    }

    pub fn is_registered(
        &self,
        node: &Node,
    ) -> bool {
        self.get(node) == Some(LedgerState::Registered)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
