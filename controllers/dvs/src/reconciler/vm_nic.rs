//! VM NIC binding reconciler
//!
//! Handles: attaching a VM's network adapter to a distributed port group
//!
//! Binding and unbinding only resolve names until the final reconfigure
//! call, so a failed lookup never leaves the VM half-edited.

use super::Reconciler;
use crate::error::DvsError;
use crate::identity::{PortGroupId, VmNicBindingId};
use crate::nic::{ethernet_cards, find_by_label, neutral_backing, EthernetCard, EthernetCardDevice};
use crate::reconcile_helpers::check_existing;
use dvs_resources::VmNicBindingSpec;
use tracing::{debug, info, warn};
use vsphere_client::{
    fetch_properties, ConfigSpecOperation, Datacenter, DistributedVirtualSwitchPortConnection, EthernetBacking,
    ManagedObjectReference, VirtualDevice, VirtualDeviceConfigSpec, VirtualMachineConfigSpec, VmProperties,
};

/// A binding as reconstructed from the VM's device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedVmNicBinding {
    pub spec: VmNicBindingSpec,
    /// Device-list name of the bound adapter, e.g. "ethernet-0"
    pub device_name: Option<String>,
    /// Labels of other adapters of the same VM attached to the port group
    pub also_attached: Vec<String>,
}

impl LoadedVmNicBinding {
    /// Whether the bound adapter answers to `label`
    pub fn answers_to(&self, label: &str) -> bool {
        self.spec.nic_label == label || self.device_name.as_deref() == Some(label)
    }
}

/// Whether a card's backing points at the port group with `key`
fn references_port_group(card: &EthernetCardDevice, key: &str) -> bool {
    match card.backing() {
        Ok(Some(EthernetBacking::DistributedPort { port })) => port.portgroup_key.as_deref() == Some(key),
        Ok(_) => false,
        Err(e) => {
            debug!("Skipping {} with unreadable backing: {}", card.label(), e);
            false
        }
    }
}

impl Reconciler {
    async fn vm_devices(&self, vm: &ManagedObjectReference, vm_path: &str) -> Result<Vec<VirtualDevice>, DvsError> {
        let props: VmProperties = self
            .call(
                &format!("devices of vm {}", vm_path),
                fetch_properties(self.client.as_ref(), vm, &["config"]),
            )
            .await?;
        Ok(props.config.hardware.device)
    }

    async fn resolve_nic(
        &self,
        datacenter: &Datacenter,
        vm_path: &str,
        label: &str,
    ) -> Result<(ManagedObjectReference, EthernetCardDevice), DvsError> {
        let vm = self.resolve_vm(datacenter, vm_path).await?;
        let devices = self.vm_devices(&vm, vm_path).await?;
        let card = find_by_label(&devices, label).ok_or_else(|| DvsError::DeviceNotFound {
            vm: vm_path.to_string(),
            label: label.to_string(),
        })?;
        debug!("Resolved {} on {} as {:?} device {}", label, vm_path, card.variant(), card.device().key);
        Ok((vm, card))
    }

    async fn edit_nic(&self, vm: &ManagedObjectReference, card: EthernetCardDevice, context: &str) -> Result<(), DvsError> {
        let spec = VirtualMachineConfigSpec {
            device_change: vec![VirtualDeviceConfigSpec {
                operation: ConfigSpecOperation::Edit,
                device: card.into_device(),
            }],
        };
        let task = self
            .call(context, self.client.reconfigure_vm(vm, &spec))
            .await?;
        self.await_task(&task, &format!("Error in {}", context)).await?;
        Ok(())
    }

    /// Attach the adapter labelled `spec.nic_label` to a port group
    pub async fn create_vm_nic_binding(&self, port_group: &PortGroupId, spec: &VmNicBindingSpec) -> Result<VmNicBindingId, DvsError> {
        let id = VmNicBindingId::new(port_group.clone(), &spec.vm)?;
        if spec.nic_label.is_empty() {
            return Err(DvsError::InvalidConfig(format!("nic label of {} must not be empty", id)));
        }

        let datacenter = self.resolve_datacenter(&port_group.switch.datacenter).await?;
        let (vm, mut card) = self.resolve_nic(&datacenter, &spec.vm, &spec.nic_label).await?;
        let portgroup_key = self.port_group_key(&datacenter, port_group).await?;
        let switch = self.resolve_switch(&port_group.switch).await?;
        let switch_uuid = self.switch_uuid(&switch).await?;

        card.set_backing(&EthernetBacking::DistributedPort {
            port: DistributedVirtualSwitchPortConnection {
                switch_uuid,
                portgroup_key: Some(portgroup_key),
                port_key: None,
            },
        })?;
        card.set_connected(true);

        info!("Binding {} of vm {} to port group {}", spec.nic_label, spec.vm, port_group.full_path());
        self.edit_nic(
            &vm,
            card,
            &format!("binding {} of vm {} to {}", spec.nic_label, spec.vm, port_group.full_path()),
        )
        .await?;
        Ok(id)
    }

    /// Detach the adapter labelled `label` from the binding's port group.
    ///
    /// The adapter gets a neutral backing and is disconnected. An adapter
    /// that is not attached to the port group is left untouched.
    pub async fn unbind_vm_nic(&self, id: &VmNicBindingId, label: &str) -> Result<(), DvsError> {
        let datacenter = self.resolve_datacenter(&id.port_group.switch.datacenter).await?;
        let (vm, mut card) = self.resolve_nic(&datacenter, &id.vm, label).await?;
        let portgroup_key = self.port_group_key(&datacenter, &id.port_group).await?;

        if !references_port_group(&card, &portgroup_key) {
            warn!(
                "{} of vm {} is not attached to port group {}, leaving it as is",
                label,
                id.vm,
                id.port_group.full_path()
            );
            return Ok(());
        }

        card.set_backing(&neutral_backing())?;
        card.set_connected(false);

        info!("Unbinding {} of vm {} from port group {}", label, id.vm, id.port_group.full_path());
        self.edit_nic(
            &vm,
            card,
            &format!("unbinding {} of vm {} from {}", label, id.vm, id.port_group.full_path()),
        )
        .await
    }

    /// Find the adapter bound to the port group.
    ///
    /// When several adapters of the VM are attached to the port group, the one
    /// answering to `preferred_label` is chosen; without a match the first
    /// attached adapter is returned and the others are listed in `also_attached`.
    pub async fn read_vm_nic_binding(
        &self,
        id: &VmNicBindingId,
        preferred_label: Option<&str>,
    ) -> Result<LoadedVmNicBinding, DvsError> {
        let datacenter = self.resolve_datacenter(&id.port_group.switch.datacenter).await?;
        let vm = self.resolve_vm(&datacenter, &id.vm).await?;
        let portgroup_key = self.port_group_key(&datacenter, &id.port_group).await?;
        let devices = self.vm_devices(&vm, &id.vm).await?;

        let mut attached: Vec<EthernetCardDevice> = ethernet_cards(&devices)
            .into_iter()
            .filter(|card| references_port_group(card, &portgroup_key))
            .collect();
        if attached.is_empty() {
            return Err(DvsError::BindingNotFound(format!(
                "no adapter of vm {} is attached to port group {}",
                id.vm,
                id.port_group.full_path()
            )));
        }

        let chosen = preferred_label
            .and_then(|label| attached.iter().position(|card| card.answers_to(label)))
            .unwrap_or(0);
        let card = attached.remove(chosen);
        if !attached.is_empty() {
            debug!(
                "vm {} has {} adapter(s) on port group {}, reading {}",
                id.vm,
                attached.len() + 1,
                id.port_group.full_path(),
                card.label()
            );
        }

        Ok(LoadedVmNicBinding {
            spec: VmNicBindingSpec {
                vm: id.vm.clone(),
                nic_label: card.label(),
            },
            device_name: card.device_name(),
            also_attached: attached.iter().map(|card| card.label()).collect(),
        })
    }

    /// Detach the binding's adapter from the port group.
    ///
    /// With a `declared_label` only that adapter is detached, and only if it is
    /// attached; other adapters on the port group are never touched. Without
    /// one the binding must be unambiguous. A binding that is already gone is
    /// success.
    pub async fn delete_vm_nic_binding(&self, id: &VmNicBindingId, declared_label: Option<&str>) -> Result<(), DvsError> {
        let Some(loaded) =
            check_existing(&format!("binding {}", id), self.read_vm_nic_binding(id, declared_label)).await?
        else {
            return Ok(());
        };

        match declared_label {
            Some(label) if !loaded.answers_to(label) => {
                warn!(
                    "{} of vm {} is not attached to port group {}, leaving {} as is",
                    label,
                    id.vm,
                    id.port_group.full_path(),
                    loaded.spec.nic_label
                );
                return Ok(());
            }
            None if !loaded.also_attached.is_empty() => {
                return Err(DvsError::InvalidConfig(format!(
                    "{} adapters of vm {} are attached to port group {}; a nic label is needed to pick one",
                    loaded.also_attached.len() + 1,
                    id.vm,
                    id.port_group.full_path()
                )));
            }
            _ => {}
        }

        let label = loaded.device_name.as_deref().unwrap_or(&loaded.spec.nic_label);
        self.unbind_vm_nic(id, label).await
    }
}
