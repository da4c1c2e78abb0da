//! Reconciliation logic for distributed-switch objects.
//!
//! This module is organized by object kind:
//! - `lookup`: datacenter, host and virtual machine resolution
//! - `switch`: distributed switches
//! - `port_group`: distributed port groups
//! - `host_binding`: host membership in a switch
//! - `vm_nic`: VM network adapters attached to port groups

pub mod host_binding;
pub mod lookup;
pub mod port_group;
pub mod switch;
pub mod vm_nic;

#[cfg(test)]
mod port_group_test;

pub use host_binding::HostBindingState;
pub use port_group::LoadedPortGroup;
pub use switch::SwitchHandle;
pub use vm_nic::LoadedVmNicBinding;

use crate::error::DvsError;
use crate::task::TaskAwaiter;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vsphere_client::{ManagedObjectReference, TaskInfo, VSphereClientTrait, VSphereError};

/// Reconciles distributed-switch objects against vSphere.
///
/// Each operation resolves everything it needs by path on every call;
/// no remote key is cached between calls.
pub struct Reconciler {
    pub(crate) client: Box<dyn VSphereClientTrait + Send + Sync>,
    awaiter: TaskAwaiter,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(client: Box<dyn VSphereClientTrait + Send + Sync>) -> Self {
        Self {
            client,
            awaiter: TaskAwaiter::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_awaiter(mut self, awaiter: TaskAwaiter) -> Self {
        self.awaiter = awaiter;
        self
    }

    /// Observe `cancel` around every remote call and task wait
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one blocking remote call, giving up when cancelled
    pub(crate) async fn call<T, F>(&self, what: &str, fut: F) -> Result<T, DvsError>
    where
        F: Future<Output = Result<T, VSphereError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(DvsError::Cancelled(what.to_string()));
        }
        debug!("vSphere call: {}", what);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DvsError::Cancelled(what.to_string())),
            result = fut => result.map_err(DvsError::from),
        }
    }

    /// Wait for a submitted task; `context` prefixes the error of a failed task
    pub(crate) async fn await_task(&self, task: &ManagedObjectReference, context: &str) -> Result<TaskInfo, DvsError> {
        self.awaiter
            .wait(self.client.as_ref(), task, context, &self.cancel)
            .await
    }
}
