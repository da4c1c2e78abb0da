//! Port group reconciler
//!
//! Handles: distributed port groups

use super::Reconciler;
use crate::error::DvsError;
use crate::identity::{PortGroupId, SwitchId};
use crate::reconcile_helpers::FlagReader;
use dvs_resources::{BindingType, OverridePolicy, PortGroupSpec};
use tracing::{debug, info};
use vsphere_client::{
    fetch_properties, Datacenter, DvPortgroupConfigSpec, DvPortgroupPolicy, DvPortgroupProperties,
    ManagedObjectReference, PortSetting, PortgroupType, VlanSpec,
};

const PORT_GROUP_PROPERTIES: &[&str] = &["key", "config", "portKeys"];

const OVERRIDE_POLICY_FIELDS: [&str; 7] = [
    "blockOverrideAllowed",
    "livePortMovingAllowed",
    "networkResourcePoolOverrideAllowed",
    "portConfigResetAtDisconnect",
    "shapingOverrideAllowed",
    "trafficFilterOverrideAllowed",
    "vendorConfigOverrideAllowed",
];

/// Highest VLAN id a port can be tagged with
const MAX_VLAN_ID: u16 = 4094;

/// Port group attributes as read back from vSphere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPortGroup {
    pub spec: PortGroupSpec,
    /// Switch path followed by the port group name
    pub full_path: String,
}

fn portgroup_type(binding: BindingType) -> PortgroupType {
    match binding {
        BindingType::EarlyBinding => PortgroupType::EarlyBinding,
        BindingType::Ephemeral => PortgroupType::Ephemeral,
    }
}

fn binding_type(path: &str, portgroup_type: PortgroupType) -> Result<BindingType, DvsError> {
    match portgroup_type {
        PortgroupType::EarlyBinding => Ok(BindingType::EarlyBinding),
        PortgroupType::Ephemeral => Ok(BindingType::Ephemeral),
        PortgroupType::LateBinding => Err(DvsError::TypeMismatch {
            path: path.to_string(),
            expected: "earlyBinding or ephemeral port group",
            actual: "lateBinding port group".to_string(),
        }),
    }
}

/// Build the create spec, mapping every declared attribute 1:1
pub fn build_port_group_config_spec(spec: &PortGroupSpec) -> Result<DvPortgroupConfigSpec, DvsError> {
    let num_ports = i32::try_from(spec.num_ports).map_err(|_| {
        DvsError::InvalidConfig(format!("port group {}: numPorts {} is out of range", spec.name, spec.num_ports))
    })?;

    let default_port_config = match spec.default_vlan {
        Some(vlan) if vlan == 0 || vlan > MAX_VLAN_ID => {
            return Err(DvsError::InvalidConfig(format!(
                "port group {}: defaultVlan {} is outside 1-{}",
                spec.name, vlan, MAX_VLAN_ID
            )));
        }
        Some(vlan) => Some(PortSetting::Vmware {
            vlan: Some(VlanSpec::VlanId {
                inherited: false,
                vlan_id: i32::from(vlan),
            }),
        }),
        None => None,
    };

    let policy = &spec.policy;
    Ok(DvPortgroupConfigSpec {
        config_version: None,
        name: spec.name.clone(),
        description: spec.description.clone().filter(|d| !d.is_empty()),
        num_ports,
        port_name_format: spec.port_name_format.clone().filter(|f| !f.is_empty()),
        binding_type: portgroup_type(spec.binding_type),
        auto_expand: Some(spec.auto_expand),
        policy: Some(DvPortgroupPolicy {
            block_override_allowed: Some(policy.block_override_allowed),
            live_port_moving_allowed: Some(policy.live_port_moving_allowed),
            network_resource_pool_override_allowed: Some(policy.network_resource_pool_override_allowed),
            port_config_reset_at_disconnect: Some(policy.port_config_reset_at_disconnect),
            shaping_override_allowed: Some(policy.shaping_override_allowed),
            traffic_filter_override_allowed: Some(policy.traffic_filter_override_allowed),
            vendor_config_override_allowed: Some(policy.vendor_config_override_allowed),
        }),
        default_port_config,
    })
}

fn read_override_policy(flags: &mut FlagReader, policy: Option<&DvPortgroupPolicy>) -> OverridePolicy {
    let Some(policy) = policy else {
        flags.all_missing(&OVERRIDE_POLICY_FIELDS);
        return OverridePolicy::default();
    };
    let [block, live_port, pool, reset, shaping, traffic, vendor] = OVERRIDE_POLICY_FIELDS;
    OverridePolicy {
        block_override_allowed: flags.read(block, policy.block_override_allowed),
        live_port_moving_allowed: flags.read(live_port, policy.live_port_moving_allowed),
        network_resource_pool_override_allowed: flags.read(pool, policy.network_resource_pool_override_allowed),
        port_config_reset_at_disconnect: flags.read(reset, policy.port_config_reset_at_disconnect),
        shaping_override_allowed: flags.read(shaping, policy.shaping_override_allowed),
        traffic_filter_override_allowed: flags.read(traffic, policy.traffic_filter_override_allowed),
        vendor_config_override_allowed: flags.read(vendor, policy.vendor_config_override_allowed),
    }
}

impl Reconciler {
    /// Resolve a port group below its switch
    pub async fn resolve_port_group(&self, datacenter: &Datacenter, id: &PortGroupId) -> Result<ManagedObjectReference, DvsError> {
        let path = id.full_path();
        let found = self
            .call(&format!("find port group {}", path), self.client.find_network(datacenter, &path))
            .await
            .map_err(|e| match e {
                DvsError::NotFound(_) => DvsError::NotFound(format!("port group '{}' in {}", path, datacenter.inventory_path)),
                other => other,
            })?;
        if !found.is_distributed_portgroup() {
            return Err(DvsError::TypeMismatch {
                path,
                expected: "distributed port group",
                actual: found.kind,
            });
        }
        Ok(found)
    }

    async fn port_group_properties(&self, reference: &ManagedObjectReference, path: &str) -> Result<DvPortgroupProperties, DvsError> {
        self.call(
            &format!("properties of port group {}", path),
            fetch_properties(self.client.as_ref(), reference, PORT_GROUP_PROPERTIES),
        )
        .await
    }

    /// Platform-assigned key of a port group, resolved fresh on every call
    pub async fn port_group_key(&self, datacenter: &Datacenter, id: &PortGroupId) -> Result<String, DvsError> {
        let reference = self.resolve_port_group(datacenter, id).await?;
        let props = self.port_group_properties(&reference, &id.full_path()).await?;
        Ok(props.key)
    }

    /// Create a port group on the switch named by `owner`
    pub async fn create_port_group(&self, owner: &str, spec: &PortGroupSpec) -> Result<PortGroupId, DvsError> {
        let switch: SwitchId = owner.parse()?;
        let id = PortGroupId::new(switch, &spec.name)?;
        let config_spec = build_port_group_config_spec(spec)?;
        info!("Creating port group {}", id);

        let handle = self.resolve_switch(&id.switch).await?;
        let task = self
            .call(
                &format!("create port group {}", id.full_path()),
                self.client.create_dv_portgroup(&handle.reference, &config_spec),
            )
            .await?;
        self.await_task(&task, &format!("Error creating port group {}", id.full_path()))
            .await?;

        info!("Created port group {}", id);
        Ok(id)
    }

    /// Load a port group's attributes from vSphere
    pub async fn load_port_group(&self, datacenter: &str, switch_path: &str, name: &str) -> Result<LoadedPortGroup, DvsError> {
        let id = PortGroupId {
            switch: SwitchId {
                datacenter: datacenter.to_string(),
                path: switch_path.to_string(),
            },
            name: name.to_string(),
        };
        let full_path = id.full_path();
        let dc = self.resolve_datacenter(datacenter).await?;
        let reference = self.resolve_port_group(&dc, &id).await?;
        let config = self.port_group_properties(&reference, &full_path).await?.config;
        debug!("Loaded port group {} (key {})", full_path, config.key);

        let binding_type = binding_type(&full_path, config.binding_type)?;
        let mut flags = FlagReader::new(format!("port group {}", full_path));
        let auto_expand = flags.read("autoExpand", config.auto_expand);
        let policy = read_override_policy(&mut flags, config.policy.as_ref());
        flags.finish()?;

        let num_ports = u32::try_from(config.num_ports).map_err(|_| {
            DvsError::InvalidConfig(format!("port group {} reports {} ports", full_path, config.num_ports))
        })?;
        let default_vlan = config
            .default_port_config
            .as_ref()
            .and_then(PortSetting::vlan_id)
            .and_then(|vlan| u16::try_from(vlan).ok())
            .filter(|vlan| *vlan != 0);

        Ok(LoadedPortGroup {
            spec: PortGroupSpec {
                name: config.name,
                binding_type,
                description: config.description.filter(|d| !d.is_empty()),
                auto_expand,
                num_ports,
                port_name_format: config.port_name_format.filter(|f| !f.is_empty()),
                default_vlan,
                policy,
            },
            full_path,
        })
    }

    /// Read a port group by identity
    pub async fn read_port_group(&self, id: &PortGroupId) -> Result<LoadedPortGroup, DvsError> {
        self.load_port_group(&id.switch.datacenter, &id.switch.path, &id.name)
            .await
    }

    /// Port groups are not updated in place
    pub async fn update_port_group(&self, id: &PortGroupId, _spec: &PortGroupSpec) -> Result<(), DvsError> {
        Err(DvsError::Unimplemented(format!("update of port group {}", id)))
    }

    /// Destroy a port group and wait for it to go away
    pub async fn delete_port_group(&self, id: &PortGroupId) -> Result<(), DvsError> {
        let datacenter = self.resolve_datacenter(&id.switch.datacenter).await?;
        let reference = self.resolve_port_group(&datacenter, id).await?;

        info!("Deleting port group {}", id);
        let task = self
            .call(&format!("destroy port group {}", id.full_path()), self.client.destroy(&reference))
            .await?;
        self.await_task(&task, &format!("Error deleting port group {}", id.full_path()))
            .await?;
        info!("Deleted port group {}", id);
        Ok(())
    }
}
