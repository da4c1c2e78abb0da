//! Host binding reconciler
//!
//! Handles: host membership in a distributed switch

use super::{Reconciler, SwitchHandle};
use crate::error::DvsError;
use crate::identity::{HostBindingId, SwitchId};
use dvs_resources::HostBindingSpec;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use vsphere_client::{ConfigSpecOperation, HostMemberBacking, ManagedObjectReference};

/// A host's membership as recorded on the switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBindingState {
    pub host: ManagedObjectReference,
    /// Physical NICs the host contributes as uplinks
    pub nic_names: BTreeSet<String>,
}

impl Reconciler {
    /// Host memberships of a switch, keyed by host reference value.
    ///
    /// Fails as a whole if any member carries a backing other than a
    /// physical NIC backing.
    pub async fn load_host_bindings(&self, switch: &SwitchId) -> Result<BTreeMap<String, HostBindingState>, DvsError> {
        let handle = self.resolve_switch(switch).await?;
        self.host_bindings(&handle).await
    }

    async fn host_bindings(&self, handle: &SwitchHandle) -> Result<BTreeMap<String, HostBindingState>, DvsError> {
        let props = self.switch_properties(handle).await?;

        let mut bindings = BTreeMap::new();
        for member in &props.config.host {
            let Some(host) = member.config.host.clone() else {
                return Err(DvsError::TypeMismatch {
                    path: format!("{} host member", handle.path),
                    expected: "host member with a host",
                    actual: "member without a host".to_string(),
                });
            };
            let HostMemberBacking::Pnic { pnic_spec } =
                member
                    .config
                    .pnic_backing()
                    .map_err(|_| DvsError::TypeMismatch {
                        path: format!("{} member {}", handle.path, host.value),
                        expected: "DistributedVirtualSwitchHostMemberPnicBacking",
                        actual: member.config.backing_type().to_string(),
                    })?;
            let nic_names = pnic_spec.into_iter().map(|p| p.pnic_device).collect();
            bindings.insert(host.value.clone(), HostBindingState { host, nic_names });
        }
        debug!("Switch {} has {} host member(s)", handle.path, bindings.len());
        Ok(bindings)
    }

    /// Add a host to a switch
    pub async fn create_host_binding(&self, switch: &SwitchId, spec: &HostBindingSpec) -> Result<HostBindingId, DvsError> {
        let id = HostBindingId::new(switch.clone(), &spec.host)?;
        let handle = self.resolve_switch(switch).await?;
        self.add_host(&handle, &spec.host, &spec.nic_names).await?;
        info!("Bound host {} to switch {}", spec.host, switch.path);
        Ok(id)
    }

    /// Read a host's membership in a switch
    pub async fn read_host_binding(&self, id: &HostBindingId) -> Result<HostBindingSpec, DvsError> {
        let handle = self.resolve_switch(&id.switch).await?;
        let host = self.resolve_host(&handle.datacenter, &id.host).await?;
        let mut bindings = self.host_bindings(&handle).await?;

        let state = bindings.remove(&host.value).ok_or_else(|| {
            DvsError::BindingNotFound(format!("host {} is not a member of switch {}", id.host, id.switch.path))
        })?;
        Ok(HostBindingSpec {
            host: id.host.clone(),
            nic_names: state.nic_names,
        })
    }

    /// Remove a host from a switch; a host that is not a member is left alone
    pub async fn delete_host_binding(&self, id: &HostBindingId) -> Result<(), DvsError> {
        let handle = self.resolve_switch(&id.switch).await?;
        let host = self.resolve_host(&handle.datacenter, &id.host).await?;
        let bindings = self.host_bindings(&handle).await?;

        if !bindings.contains_key(&host.value) {
            warn!("Host {} is not a member of switch {}, nothing to remove", id.host, id.switch.path);
            return Ok(());
        }
        self.reconfigure_host_member(&handle, &id.host, host, ConfigSpecOperation::Remove, None)
            .await?;
        info!("Unbound host {} from switch {}", id.host, id.switch.path);
        Ok(())
    }
}
