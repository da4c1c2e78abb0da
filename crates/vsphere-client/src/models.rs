//! vSphere API models
//!
//! These models follow the vSphere Web Services data objects as exposed by the
//! VI/JSON API (`/sdk/vim25/{release}/...`). Only the fields the DVS controller
//! reads or writes are modelled; unknown fields are ignored on input.
//! Polymorphic data objects carry their concrete type in `_typeName`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Managed object types the controller looks up or checks against
pub mod mo_type {
    pub const DATACENTER: &str = "Datacenter";
    pub const FOLDER: &str = "Folder";
    pub const DISTRIBUTED_SWITCH: &str = "DistributedVirtualSwitch";
    pub const VMWARE_DISTRIBUTED_SWITCH: &str = "VmwareDistributedVirtualSwitch";
    pub const DISTRIBUTED_PORTGROUP: &str = "DistributedVirtualPortgroup";
    pub const NETWORK: &str = "Network";
    pub const COMPUTE_RESOURCE: &str = "ComputeResource";
    pub const HOST_SYSTEM: &str = "HostSystem";
    pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
    pub const TASK: &str = "Task";
}

/// Reference to a server-side managed object.
///
/// Only valid for the lifetime of the session that produced it; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn is_distributed_switch(&self) -> bool {
        self.kind == mo_type::DISTRIBUTED_SWITCH || self.kind == mo_type::VMWARE_DISTRIBUTED_SWITCH
    }

    pub fn is_distributed_portgroup(&self) -> bool {
        self.kind == mo_type::DISTRIBUTED_PORTGROUP
    }

    pub fn is_folder(&self) -> bool {
        self.kind == mo_type::FOLDER
    }
}

impl std::fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// ServiceContent (subset used by the client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    pub root_folder: ManagedObjectReference,
    pub search_index: ManagedObjectReference,
    pub session_manager: ManagedObjectReference,
}

/// A resolved datacenter together with the inventory path it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datacenter {
    pub reference: ManagedObjectReference,
    pub inventory_path: String,
}

/// Root folders of a datacenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterFolders {
    pub vm_folder: ManagedObjectReference,
    pub host_folder: ManagedObjectReference,
    pub network_folder: ManagedObjectReference,
}

// Tasks

/// TaskInfoState
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

/// LocalizedMethodFault
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedMethodFault {
    #[serde(default)]
    pub fault: serde_json::Value,
    pub localized_message: Option<String>,
}

impl LocalizedMethodFault {
    /// Fault type name (`_typeName` of the inner fault), if reported
    pub fn fault_type(&self) -> Option<&str> {
        self.fault.get("_typeName").and_then(|v| v.as_str())
    }

    /// Human readable description of the fault
    pub fn message(&self) -> String {
        match (&self.localized_message, self.fault_type()) {
            (Some(msg), Some(ty)) if !msg.is_empty() => format!("{} ({})", msg, ty),
            (Some(msg), None) if !msg.is_empty() => msg.clone(),
            (_, Some(ty)) => ty.to_string(),
            _ => "unspecified fault".to_string(),
        }
    }
}

/// TaskInfo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub key: String,
    pub task: ManagedObjectReference,
    pub description_id: Option<String>,
    pub state: TaskState,
    #[serde(default)]
    pub cancelled: bool,
    pub error: Option<LocalizedMethodFault>,
    pub result: Option<serde_json::Value>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
}

// Distributed switch

/// ConfigSpecOperation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSpecOperation {
    Add,
    Edit,
    Remove,
}

/// DVSContactInfo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsContactInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// DVSPolicy. All three flags are optional in the remote schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_pre_install_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_upgrade_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_upgrade_allowed: Option<bool>,
}

/// DistributedVirtualSwitchHostMemberPnicSpec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnicSpec {
    pub pnic_device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uplink_port_key: Option<String>,
}

/// DistributedVirtualSwitchHostMemberBacking subtypes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum HostMemberBacking {
    #[serde(rename = "DistributedVirtualSwitchHostMemberPnicBacking", rename_all = "camelCase")]
    Pnic {
        #[serde(default)]
        pnic_spec: Vec<PnicSpec>,
    },
}

/// DistributedVirtualSwitchHostMemberConfigSpec
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMemberConfigSpec {
    pub operation: ConfigSpecOperation,
    pub host: ManagedObjectReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backing: Option<HostMemberBacking>,
}

/// DVSConfigSpec
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsConfigSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<DvsContactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_standalone_ports: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<DvsPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<HostMemberConfigSpec>,
}

/// DVSCreateSpec
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsCreateSpec {
    pub config_spec: DvsConfigSpec,
}

/// DistributedVirtualSwitchHostMemberConfigInfo
///
/// `backing` is kept raw so that members with an unexpected backing type can
/// be reported instead of being silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMemberConfigInfo {
    pub host: Option<ManagedObjectReference>,
    #[serde(default)]
    pub backing: serde_json::Value,
}

impl HostMemberConfigInfo {
    /// Decode the member backing as a physical NIC backing
    pub fn pnic_backing(&self) -> Result<HostMemberBacking, serde_json::Error> {
        serde_json::from_value(self.backing.clone())
    }

    /// Concrete type of the backing, for diagnostics
    pub fn backing_type(&self) -> &str {
        self.backing
            .get("_typeName")
            .and_then(|v| v.as_str())
            .unwrap_or("<none>")
    }
}

/// DistributedVirtualSwitchHostMember
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMember {
    pub config: HostMemberConfigInfo,
}

/// DVSConfigInfo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsConfigInfo {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub config_version: String,
    pub description: Option<String>,
    pub extension_key: Option<String>,
    pub contact: Option<DvsContactInfo>,
    #[serde(default)]
    pub num_standalone_ports: i32,
    pub policy: Option<DvsPolicy>,
    pub switch_ip_address: Option<String>,
    #[serde(default)]
    pub host: Vec<HostMember>,
    #[serde(default)]
    pub uplink_portgroup: Vec<ManagedObjectReference>,
}

/// Properties fetched for a distributed switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvsProperties {
    pub uuid: String,
    pub config: DvsConfigInfo,
    #[serde(default)]
    pub portgroup: Vec<ManagedObjectReference>,
}

// Distributed port group

/// DistributedVirtualPortgroupPortgroupType
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortgroupType {
    #[default]
    EarlyBinding,
    Ephemeral,
    /// Deprecated since vSphere 5.0; can still be read from older inventories
    LateBinding,
}

/// DVPortgroupPolicy / VMwareDVSPortgroupPolicy override flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvPortgroupPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_override_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_port_moving_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_resource_pool_override_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_config_reset_at_disconnect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shaping_override_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_filter_override_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_config_override_allowed: Option<bool>,
}

/// VmwareDistributedVirtualSwitchVlanSpec subtypes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum VlanSpec {
    #[serde(rename = "VmwareDistributedVirtualSwitchVlanIdSpec", rename_all = "camelCase")]
    VlanId { inherited: bool, vlan_id: i32 },
    #[serde(other)]
    Unsupported,
}

/// DVPortSetting subtypes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum PortSetting {
    #[serde(rename = "VMwareDVSPortSetting")]
    Vmware {
        #[serde(skip_serializing_if = "Option::is_none")]
        vlan: Option<VlanSpec>,
    },
}

impl PortSetting {
    /// VLAN id of a plain VLAN id spec
    pub fn vlan_id(&self) -> Option<i32> {
        match self {
            PortSetting::Vmware {
                vlan: Some(VlanSpec::VlanId { vlan_id, .. }),
            } => Some(*vlan_id),
            PortSetting::Vmware { .. } => None,
        }
    }
}

/// DVPortgroupConfigSpec
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DvPortgroupConfigSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub num_ports: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name_format: Option<String>,
    #[serde(rename = "type")]
    pub binding_type: PortgroupType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_expand: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<DvPortgroupPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_port_config: Option<PortSetting>,
}

/// DVPortgroupConfigInfo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvPortgroupConfigInfo {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub num_ports: i32,
    #[serde(rename = "type")]
    pub binding_type: PortgroupType,
    pub description: Option<String>,
    pub auto_expand: Option<bool>,
    pub port_name_format: Option<String>,
    pub policy: Option<DvPortgroupPolicy>,
    pub distributed_virtual_switch: Option<ManagedObjectReference>,
    pub default_port_config: Option<PortSetting>,
}

/// Properties fetched for a distributed port group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvPortgroupProperties {
    pub key: String,
    pub config: DvPortgroupConfigInfo,
    #[serde(default)]
    pub port_keys: Vec<String>,
}

// Virtual machine devices

/// Description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub label: String,
    #[serde(default)]
    pub summary: String,
}

/// VirtualDeviceConnectInfo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectable {
    pub start_connected: bool,
    pub allow_guest_control: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// DistributedVirtualSwitchPortConnection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributedVirtualSwitchPortConnection {
    pub switch_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portgroup_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_key: Option<String>,
}

/// Network backings of the virtual ethernet card family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_typeName")]
pub enum EthernetBacking {
    #[serde(rename = "VirtualEthernetCardDistributedVirtualPortBackingInfo")]
    DistributedPort {
        port: DistributedVirtualSwitchPortConnection,
    },
    #[serde(rename = "VirtualEthernetCardNetworkBackingInfo", rename_all = "camelCase")]
    Network {
        #[serde(default)]
        device_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        network: Option<ManagedObjectReference>,
    },
}

/// VirtualDevice and all of its subtypes.
///
/// The concrete type lives in `type_name`; fields the controller does not
/// touch are carried through `extra` so a device can be sent back in an
/// edit without losing its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDevice {
    #[serde(rename = "_typeName")]
    pub type_name: String,
    pub key: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<Description>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backing: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectable: Option<Connectable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<i32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VirtualDevice {
    /// Description label, e.g. "Network adapter 1"
    pub fn label(&self) -> Option<&str> {
        self.device_info.as_ref().map(|d| d.label.as_str())
    }

    /// Decode the backing as one of the ethernet backings.
    ///
    /// `Ok(None)` when the device has no backing at all; an error when the
    /// backing is of some other family.
    pub fn ethernet_backing(&self) -> Result<Option<EthernetBacking>, serde_json::Error> {
        self.backing
            .as_ref()
            .map(|b| serde_json::from_value(b.clone()))
            .transpose()
    }

    /// Replace the backing with an ethernet backing
    pub fn set_ethernet_backing(&mut self, backing: &EthernetBacking) -> Result<(), serde_json::Error> {
        self.backing = Some(serde_json::to_value(backing)?);
        Ok(())
    }
}

/// VirtualHardware
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHardware {
    #[serde(default)]
    pub device: Vec<VirtualDevice>,
}

/// VirtualMachineConfigInfo (hardware section only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfigInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hardware: VirtualHardware,
}

/// Properties fetched for a virtual machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    pub config: VmConfigInfo,
}

/// VirtualDeviceConfigSpec
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDeviceConfigSpec {
    pub operation: ConfigSpecOperation,
    pub device: VirtualDevice,
}

/// VirtualMachineConfigSpec (device changes only)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfigSpec {
    pub device_change: Vec<VirtualDeviceConfigSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_info_error_deserializes() {
        let json = r#"{
            "_typeName": "TaskInfo",
            "key": "task-42",
            "task": {"_typeName": "ManagedObjectReference", "type": "Task", "value": "task-42"},
            "state": "error",
            "cancelled": false,
            "error": {
                "_typeName": "LocalizedMethodFault",
                "fault": {"_typeName": "DuplicateName", "name": "dvs1"},
                "localizedMessage": "The name 'dvs1' already exists."
            },
            "queueTime": "2024-05-01T10:00:00Z"
        }"#;
        let info: TaskInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.state, TaskState::Error);
        let fault = info.error.unwrap();
        assert_eq!(fault.fault_type(), Some("DuplicateName"));
        assert_eq!(fault.message(), "The name 'dvs1' already exists. (DuplicateName)");
    }

    #[test]
    fn test_unknown_vlan_spec_is_tolerated() {
        let json = r#"{"_typeName": "VMwareDVSPortSetting",
                       "vlan": {"_typeName": "VmwareDistributedVirtualSwitchTrunkVlanSpec", "inherited": false}}"#;
        let setting: PortSetting = serde_json::from_str(json).unwrap();
        assert_eq!(setting.vlan_id(), None);
    }

    #[test]
    fn test_host_member_backing_tagged() {
        let backing = HostMemberBacking::Pnic {
            pnic_spec: vec![PnicSpec {
                pnic_device: "vmnic1".to_string(),
                uplink_port_key: None,
            }],
        };
        let value = serde_json::to_value(&backing).unwrap();
        assert_eq!(value["_typeName"], "DistributedVirtualSwitchHostMemberPnicBacking");
        assert_eq!(value["pnicSpec"][0]["pnicDevice"], "vmnic1");
    }

    #[test]
    fn test_distributed_switch_kinds() {
        assert!(ManagedObjectReference::new("VmwareDistributedVirtualSwitch", "dvs-1").is_distributed_switch());
        assert!(ManagedObjectReference::new("DistributedVirtualSwitch", "dvs-1").is_distributed_switch());
        assert!(!ManagedObjectReference::new("Network", "network-1").is_distributed_switch());
    }
}
