//! Switch reconciler
//!
//! Handles: distributed virtual switches

use super::Reconciler;
use crate::error::DvsError;
use crate::identity::{normalize_folder, SwitchId};
use crate::reconcile_helpers::FlagReader;
use dvs_resources::{ContactInfo, SwitchSpec, UsagePolicy};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use vsphere_client::{
    fetch_properties, ConfigSpecOperation, Datacenter, DvsConfigSpec, DvsContactInfo, DvsCreateSpec, DvsPolicy,
    DvsProperties, HostMemberBacking, HostMemberConfigSpec, ManagedObjectReference, PnicSpec,
};

/// Properties fetched when loading a switch
const SWITCH_PROPERTIES: &[&str] = &["uuid", "config", "portgroup"];

const USAGE_POLICY_FIELDS: [&str; 3] = ["autoPreInstallAllowed", "autoUpgradeAllowed", "partialUpgradeAllowed"];

/// A switch resolved in its datacenter
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchHandle {
    pub datacenter: Datacenter,
    pub reference: ManagedObjectReference,
    /// Path the switch was resolved from
    pub path: String,
}

/// Build the create spec, carrying every declared attribute
pub fn build_switch_create_spec(spec: &SwitchSpec) -> Result<DvsCreateSpec, DvsError> {
    let num_standalone_ports = i32::try_from(spec.num_standalone_ports).map_err(|_| {
        DvsError::InvalidConfig(format!(
            "switch {}: numStandalonePorts {} is out of range",
            spec.name, spec.num_standalone_ports
        ))
    })?;

    Ok(DvsCreateSpec {
        config_spec: DvsConfigSpec {
            name: Some(spec.name.clone()),
            description: non_empty(spec.description.as_deref()),
            extension_key: non_empty(spec.extension_key.as_deref()),
            contact: Some(DvsContactInfo {
                name: non_empty(spec.contact.name.as_deref()),
                contact: non_empty(spec.contact.infos.as_deref()),
            }),
            num_standalone_ports: Some(num_standalone_ports),
            policy: Some(DvsPolicy {
                auto_pre_install_allowed: Some(spec.usage_policy.auto_preinstall_allowed),
                auto_upgrade_allowed: Some(spec.usage_policy.auto_upgrade_allowed),
                partial_upgrade_allowed: Some(spec.usage_policy.partial_upgrade_allowed),
            }),
            switch_ip_address: non_empty(spec.switch_ip_address.as_deref()),
            ..Default::default()
        },
    })
}

/// Remote string fields come back empty rather than absent
fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl Reconciler {
    /// Resolve a switch by datacenter and path
    pub async fn resolve_switch(&self, id: &SwitchId) -> Result<SwitchHandle, DvsError> {
        let datacenter = self.resolve_datacenter(&id.datacenter).await?;
        let reference = self.find_switch(&datacenter, &id.path).await?;
        Ok(SwitchHandle {
            datacenter,
            reference,
            path: id.path.clone(),
        })
    }

    pub(crate) async fn find_switch(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, DvsError> {
        let found = self
            .call(&format!("find switch {}", path), self.client.find_network(datacenter, path))
            .await
            .map_err(|e| match e {
                DvsError::NotFound(_) => DvsError::NotFound(format!("switch '{}' in {}", path, datacenter.inventory_path)),
                other => other,
            })?;
        if !found.is_distributed_switch() {
            return Err(DvsError::TypeMismatch {
                path: path.to_string(),
                expected: "distributed virtual switch",
                actual: found.kind,
            });
        }
        Ok(found)
    }

    pub(crate) async fn switch_properties(&self, handle: &SwitchHandle) -> Result<DvsProperties, DvsError> {
        self.call(
            &format!("properties of switch {}", handle.path),
            fetch_properties(self.client.as_ref(), &handle.reference, SWITCH_PROPERTIES),
        )
        .await
    }

    /// Unique id of a switch, needed by port connections
    pub async fn switch_uuid(&self, handle: &SwitchHandle) -> Result<String, DvsError> {
        Ok(self.switch_properties(handle).await?.uuid)
    }

    /// Create a switch in its datacenter's network tree
    pub async fn create_switch(&self, spec: &SwitchSpec) -> Result<SwitchId, DvsError> {
        let id = SwitchId::new(&spec.datacenter, &spec.folder, &spec.name)?;
        let create_spec = build_switch_create_spec(spec)?;
        info!("Creating switch {}", id);

        let datacenter = self.resolve_datacenter(&id.datacenter).await?;
        let folder = self.switch_folder(&datacenter, &spec.folder).await?;

        let task = self
            .call(
                &format!("create switch {}", id.path),
                self.client.create_dvs(&folder, &create_spec),
            )
            .await?;
        self.await_task(&task, &format!("Error creating switch {}", id.path))
            .await?;

        info!("Created switch {}", id);
        Ok(id)
    }

    /// Folder that will contain a new switch
    async fn switch_folder(&self, datacenter: &Datacenter, folder: &str) -> Result<ManagedObjectReference, DvsError> {
        let folder = normalize_folder(folder);
        if folder.is_empty() {
            return self.network_folder(datacenter).await;
        }

        let found = self
            .call(&format!("find folder {}", folder), self.client.find_network(datacenter, &folder))
            .await
            .map_err(|e| match e {
                DvsError::NotFound(_) => DvsError::NotFound(format!("folder '{}' in {}", folder, datacenter.inventory_path)),
                other => other,
            })?;
        if !found.is_folder() {
            return Err(DvsError::TypeMismatch {
                path: folder,
                expected: "Folder",
                actual: found.kind,
            });
        }
        Ok(found)
    }

    /// Load a switch's attributes from vSphere
    pub async fn load_switch(&self, datacenter: &str, path: &str) -> Result<SwitchSpec, DvsError> {
        let id = SwitchId {
            datacenter: datacenter.to_string(),
            path: path.to_string(),
        };
        let handle = self.resolve_switch(&id).await?;
        let props = self.switch_properties(&handle).await?;
        let config = props.config;
        debug!("Loaded switch {} (config version {})", path, config.config_version);

        let object = format!("switch {}", path);
        let mut flags = FlagReader::new(object.clone());
        let usage_policy = match &config.policy {
            Some(policy) => UsagePolicy {
                auto_preinstall_allowed: flags.read(USAGE_POLICY_FIELDS[0], policy.auto_pre_install_allowed),
                auto_upgrade_allowed: flags.read(USAGE_POLICY_FIELDS[1], policy.auto_upgrade_allowed),
                partial_upgrade_allowed: flags.read(USAGE_POLICY_FIELDS[2], policy.partial_upgrade_allowed),
            },
            None => {
                flags.all_missing(&USAGE_POLICY_FIELDS);
                UsagePolicy::default()
            }
        };
        flags.finish()?;

        let num_standalone_ports = u32::try_from(config.num_standalone_ports).map_err(|_| {
            DvsError::InvalidConfig(format!(
                "{} reports {} standalone ports",
                object, config.num_standalone_ports
            ))
        })?;
        let contact = config.contact.unwrap_or_default();

        Ok(SwitchSpec {
            name: config.name,
            datacenter: datacenter.to_string(),
            folder: id.folder().to_string(),
            extension_key: non_empty(config.extension_key.as_deref()),
            description: non_empty(config.description.as_deref()),
            contact: ContactInfo {
                name: non_empty(contact.name.as_deref()),
                infos: non_empty(contact.contact.as_deref()),
            },
            usage_policy,
            switch_ip_address: non_empty(config.switch_ip_address.as_deref()),
            num_standalone_ports,
        })
    }

    /// Read a switch by identity
    pub async fn read_switch(&self, id: &SwitchId) -> Result<SwitchSpec, DvsError> {
        self.load_switch(&id.datacenter, &id.path).await
    }

    /// Switches are not updated in place
    pub async fn update_switch(&self, id: &SwitchId, _spec: &SwitchSpec) -> Result<(), DvsError> {
        Err(DvsError::Unimplemented(format!("update of switch {}", id)))
    }

    /// Add a host to a switch, contributing the given physical NICs as uplinks
    pub async fn add_host(&self, handle: &SwitchHandle, host_path: &str, nic_names: &BTreeSet<String>) -> Result<(), DvsError> {
        let host = self.resolve_host(&handle.datacenter, host_path).await?;
        let backing = HostMemberBacking::Pnic {
            pnic_spec: nic_names
                .iter()
                .map(|nic| PnicSpec {
                    pnic_device: nic.clone(),
                    uplink_port_key: None,
                })
                .collect(),
        };
        self.reconfigure_host_member(handle, host_path, host, ConfigSpecOperation::Add, Some(backing))
            .await
    }

    /// Submit a single host member change, guarded by the switch's current config version
    pub(super) async fn reconfigure_host_member(
        &self,
        handle: &SwitchHandle,
        host_path: &str,
        host: ManagedObjectReference,
        operation: ConfigSpecOperation,
        backing: Option<HostMemberBacking>,
    ) -> Result<(), DvsError> {
        let version = self.switch_properties(handle).await?.config.config_version;
        let spec = DvsConfigSpec {
            config_version: Some(version),
            host: vec![HostMemberConfigSpec {
                operation,
                host,
                backing,
            }],
            ..Default::default()
        };

        let verb = match operation {
            ConfigSpecOperation::Add => "adding",
            ConfigSpecOperation::Edit => "editing",
            ConfigSpecOperation::Remove => "removing",
        };
        info!("Reconfiguring switch {}: {} host {}", handle.path, verb, host_path);
        let task = self
            .call(
                &format!("reconfigure switch {}", handle.path),
                self.client.reconfigure_dvs(&handle.reference, &spec),
            )
            .await?;
        self.await_task(
            &task,
            &format!("Error {} host {} on switch {}", verb, host_path, handle.path),
        )
        .await?;
        Ok(())
    }

    /// Destroy a switch that no longer has port groups or host members
    pub async fn destroy_switch(&self, id: &SwitchId) -> Result<(), DvsError> {
        let handle = self.resolve_switch(id).await?;
        let props = self.switch_properties(&handle).await?;

        let mut dependents: Vec<String> = props
            .portgroup
            .iter()
            .filter(|pg| !props.config.uplink_portgroup.contains(pg))
            .map(|pg| format!("port group {}", pg.value))
            .collect();
        dependents.extend(props.config.host.iter().map(|member| match &member.config.host {
            Some(host) => format!("host {}", host.value),
            None => "host <unknown>".to_string(),
        }));
        if !dependents.is_empty() {
            warn!("Refusing to destroy switch {}: {} dependent object(s)", id, dependents.len());
            return Err(DvsError::DependentObjects {
                object: format!("switch {}", id.path),
                dependents,
            });
        }

        info!("Destroying switch {}", id);
        let task = self
            .call(&format!("destroy switch {}", id.path), self.client.destroy(&handle.reference))
            .await?;
        self.await_task(&task, &format!("Error destroying switch {}", id.path))
            .await?;
        info!("Destroyed switch {}", id);
        Ok(())
    }
}
