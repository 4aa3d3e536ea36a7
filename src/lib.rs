//! Node registration controller.
//!
//! Watches cluster nodes and, for every node annotated with
//! `<prefix>/register: <endpoint>`, POSTs the node snapshot to that endpoint
//! once, then records `<prefix>/registered: "true"` on the node so the call
//! is never repeated.
//!
//! ```text
//! NodeWatcher ──▶ ChangeDeduplicator ──▶ Dispatcher ──▶ Reconciler
//!                                      (bounded pool,    │ classify
//!                                       per-node order)  │ Registrar::register
//!                                                        ▼ StatePersister::mark_registered
//! ```
mod cluster;
mod config;
pub mod constants;
mod controller;
mod decision;
mod dedup;
mod dispatcher;
mod errors;
mod ledger;
pub mod metrics;
mod node;
mod persister;
mod reconciler;
mod registration;
mod watcher;

pub use cluster::*;
pub use config::*;
pub use controller::*;
pub use decision::*;
pub use dedup::*;
pub use dispatcher::*;
pub use errors::*;
pub use ledger::*;
pub use node::*;
pub use persister::*;
pub use reconciler::*;
pub use registration::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
