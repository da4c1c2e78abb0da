//! Distributed port group definition

use serde::{Deserialize, Serialize};

/// PortGroupSpec defines the desired state of a distributed port group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortGroupSpec {
    /// Port group name, unique within its switch
    pub name: String,

    /// How ports are bound to virtual machines
    #[serde(default)]
    pub binding_type: BindingType,

    /// Description of the port group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Grow the port group beyond `num_ports` when it runs out of ports
    #[serde(default)]
    pub auto_expand: bool,

    /// Number of ports
    #[serde(default)]
    pub num_ports: u32,

    /// Template for port names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name_format: Option<String>,

    /// VLAN id of the default port configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_vlan: Option<u16>,

    /// Which per-port overrides of switch settings are permitted
    #[serde(default)]
    pub policy: OverridePolicy,
}

/// Port binding type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BindingType {
    /// A port is assigned when the VM is configured
    #[default]
    EarlyBinding,
    /// A port is created when the VM powers on and released when it powers off
    Ephemeral,
}

/// Per-port override permissions of a port group
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverridePolicy {
    #[serde(default)]
    pub block_override_allowed: bool,
    #[serde(default)]
    pub live_port_moving_allowed: bool,
    #[serde(default)]
    pub network_resource_pool_override_allowed: bool,
    #[serde(default)]
    pub port_config_reset_at_disconnect: bool,
    #[serde(default)]
    pub shaping_override_allowed: bool,
    #[serde(default)]
    pub traffic_filter_override_allowed: bool,
    #[serde(default)]
    pub vendor_config_override_allowed: bool,
}
