//! Shared helpers for unit tests
mod fakes;
mod node_builder;

pub(crate) use fakes::*;
pub(crate) use node_builder::*;
