//! DVS Controller
//!
//! Reconciles vSphere distributed virtual switches, their port groups, host
//! memberships and VM network adapter bindings against declared attributes.
//!
//! - `identity`: durable identifiers built from natural keys
//! - `task`: waiting for vSphere tasks
//! - `reconciler`: create/read/update/delete per object kind
//! - `controller`: declaration file and state file driven runs

pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod nic;
pub mod reconcile_helpers;
pub mod reconciler;
pub mod state;
pub mod task;

#[cfg(test)]
mod reconcile_helpers_test;
#[cfg(test)]
mod test_utils;

pub use controller::{Controller, Failure, RunSummary};
pub use error::DvsError;
pub use identity::{HostBindingId, PortGroupId, ResourceKind, SwitchId, VmNicBindingId};
pub use reconciler::Reconciler;
pub use state::{StateError, StateFile};
pub use task::TaskAwaiter;
