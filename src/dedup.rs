use std::collections::HashMap;

use crate::EventKind;
use crate::NodeEvent;

/// Last-seen version token per node.
///
/// Owned by the single event loop, so no synchronization is needed. Entries
/// live for the whole process run; node count is bounded by cluster size.
#[derive(Debug, Default)]
pub struct ChangeDeduplicator {
    last_seen: HashMap<String, String>,
}

impl ChangeDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the event's token and reports whether it should be processed.
    ///
    /// `Added` is always forwarded. `Updated` is dropped only when its token
    /// equals the last one observed for the same node.
    pub fn observe(
        &mut self,
        event: &NodeEvent,
    ) -> bool {
        let Some(version) = event.version() else {
            return true;
        };
        let name = event.name();

        match event.kind {
            EventKind::Added => {
                self.last_seen.insert(name, version);
                true
            }
            EventKind::Updated => {
                if self.last_seen.get(&name) == Some(&version) {
                    return false;
                }
                self.last_seen.insert(name, version);
                true
            }
        }
    }

    pub fn last_seen(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.last_seen.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
