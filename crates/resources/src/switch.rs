//! Distributed virtual switch definition

use serde::{Deserialize, Serialize};

/// SwitchSpec defines the desired state of a distributed virtual switch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchSpec {
    /// Switch name
    pub name: String,

    /// Datacenter holding the switch
    pub datacenter: String,

    /// Folder below the datacenter's network folder (e.g. "/net"); empty for the root
    #[serde(default)]
    pub folder: String,

    /// Key of the extension that manages the switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_key: Option<String>,

    /// Description of the switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Contact details of the switch administrator
    #[serde(default)]
    pub contact: ContactInfo,

    /// Upgrade policy of the switch
    #[serde(default)]
    pub usage_policy: UsagePolicy,

    /// IP address the switch is managed through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_ip_address: Option<String>,

    /// Number of standalone ports
    #[serde(default)]
    pub num_standalone_ports: u32,
}

/// Contact details of a switch administrator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-text contact information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infos: Option<String>,
}

/// Switch upgrade policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsagePolicy {
    #[serde(default)]
    pub auto_preinstall_allowed: bool,
    #[serde(default)]
    pub auto_upgrade_allowed: bool,
    #[serde(default)]
    pub partial_upgrade_allowed: bool,
}
