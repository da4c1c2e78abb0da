//! Host and virtual NIC binding definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// HostBindingSpec attaches a host's physical NICs to a switch's uplinks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostBindingSpec {
    /// Host path below the datacenter's host folder (e.g. "cluster1/esxi1")
    pub host: String,

    /// Physical NIC device names (e.g. "vmnic1")
    #[serde(default)]
    pub nic_names: BTreeSet<String>,
}

/// VmNicBindingSpec attaches one virtual NIC of a VM to a port group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmNicBindingSpec {
    /// VM path below the datacenter's vm folder
    pub vm: String,

    /// NIC label, e.g. "Network adapter 1" or "ethernet-0"
    pub nic_label: String,
}
