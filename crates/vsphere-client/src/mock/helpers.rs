//! Helper functions for building virtual devices in mock inventories

use crate::models::*;

/// Build a virtual ethernet card of the given concrete type.
///
/// Unit numbers follow the vSphere convention where the first NIC sits at 7.
pub fn ethernet_device(type_name: &str, key: i32, label: &str, backing: Option<EthernetBacking>) -> VirtualDevice {
    VirtualDevice {
        type_name: type_name.to_string(),
        key,
        device_info: Some(Description {
            label: label.to_string(),
            summary: String::new(),
        }),
        backing: backing.map(|b| serde_json::to_value(b).unwrap()),
        connectable: Some(Connectable {
            start_connected: true,
            allow_guest_control: true,
            connected: true,
            status: Some("ok".to_string()),
        }),
        unit_number: Some(7 + (key % 100)),
        extra: serde_json::Map::new(),
    }
}

/// Backing that attaches a NIC to a distributed port group
pub fn distributed_port_backing(switch_uuid: &str, portgroup_key: &str) -> EthernetBacking {
    EthernetBacking::DistributedPort {
        port: DistributedVirtualSwitchPortConnection {
            switch_uuid: switch_uuid.to_string(),
            portgroup_key: Some(portgroup_key.to_string()),
            port_key: None,
        },
    }
}

/// Backing that attaches a NIC to a standard network by name
pub fn network_backing(device_name: &str) -> EthernetBacking {
    EthernetBacking::Network {
        device_name: device_name.to_string(),
        network: None,
    }
}
