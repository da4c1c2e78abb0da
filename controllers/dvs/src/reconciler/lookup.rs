//! Lookup helpers
//!
//! Resolve a datacenter, a host or a virtual machine from a hierarchical path.

use super::Reconciler;
use crate::error::DvsError;
use vsphere_client::{mo_type, Datacenter, ManagedObjectReference};

impl Reconciler {
    /// Resolve a datacenter by name
    pub async fn resolve_datacenter(&self, name: &str) -> Result<Datacenter, DvsError> {
        self.call(&format!("find datacenter {}", name), self.client.find_datacenter(Some(name)))
            .await
            .map_err(|e| match e {
                DvsError::NotFound(_) => DvsError::NotFound(format!("datacenter '{}'", name)),
                other => other,
            })
    }

    /// Network folder of a datacenter
    pub async fn network_folder(&self, datacenter: &Datacenter) -> Result<ManagedObjectReference, DvsError> {
        let folders = self
            .call(
                &format!("folders of {}", datacenter.inventory_path),
                self.client.datacenter_folders(datacenter),
            )
            .await?;
        Ok(folders.network_folder)
    }

    /// Resolve a host by its path below the datacenter's host folder
    pub async fn resolve_host(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, DvsError> {
        let host = self
            .call(&format!("find host {}", path), self.client.find_host(datacenter, path))
            .await
            .map_err(|e| match e {
                DvsError::NotFound(_) => DvsError::NotFound(format!("host '{}' in {}", path, datacenter.inventory_path)),
                other => other,
            })?;
        if host.kind != mo_type::HOST_SYSTEM {
            return Err(DvsError::TypeMismatch {
                path: path.to_string(),
                expected: "HostSystem",
                actual: host.kind,
            });
        }
        Ok(host)
    }

    /// Resolve a virtual machine by its path below the datacenter's vm folder
    pub async fn resolve_vm(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, DvsError> {
        let vm = self
            .call(&format!("find vm {}", path), self.client.find_virtual_machine(datacenter, path))
            .await
            .map_err(|e| match e {
                DvsError::NotFound(_) => DvsError::VmNotFound(format!("'{}' in {}", path, datacenter.inventory_path)),
                other => other,
            })?;
        if vm.kind != mo_type::VIRTUAL_MACHINE {
            return Err(DvsError::TypeMismatch {
                path: path.to_string(),
                expected: "VirtualMachine",
                actual: vm.kind,
            });
        }
        Ok(vm)
    }
}
