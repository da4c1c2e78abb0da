//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::Reconciler;
use crate::task::TaskAwaiter;
use dvs_resources::{ContactInfo, OverridePolicy, PortGroupSpec, SwitchSpec, UsagePolicy};
use std::time::Duration;
use vsphere_client::mock::{distributed_port_backing, ethernet_device, network_backing};
use vsphere_client::{ManagedObjectReference, MockVSphereClient, VirtualDevice};

/// Helper to create a mock holding datacenter "dc1" with a "net" network folder
pub fn create_test_inventory() -> MockVSphereClient {
    let mock = MockVSphereClient::new("https://vcenter.test");
    mock.add_datacenter("dc1");
    mock.add_network_folder("dc1", "net");
    mock
}

/// Helper to create a reconciler over a mock that polls tasks quickly
pub fn create_test_reconciler(mock: &MockVSphereClient) -> Reconciler {
    Reconciler::new(Box::new(mock.clone())).with_awaiter(
        TaskAwaiter::default()
            .with_poll_interval(Duration::from_millis(1), Duration::from_millis(2))
            .with_timeout(Some(Duration::from_secs(5))),
    )
}

/// Helper to create the "dvs1" switch declaration
pub fn create_test_switch_spec() -> SwitchSpec {
    SwitchSpec {
        name: "dvs1".to_string(),
        datacenter: "dc1".to_string(),
        folder: "/net".to_string(),
        extension_key: None,
        description: Some("lab uplinks".to_string()),
        contact: ContactInfo {
            name: Some("ops".to_string()),
            infos: Some("ops@example.invalid".to_string()),
        },
        usage_policy: UsagePolicy {
            auto_preinstall_allowed: true,
            auto_upgrade_allowed: true,
            partial_upgrade_allowed: false,
        },
        switch_ip_address: Some("198.51.100.1".to_string()),
        num_standalone_ports: 5,
    }
}

/// Helper to create a port group declaration with every override disallowed
pub fn create_test_port_group_spec(name: &str) -> PortGroupSpec {
    PortGroupSpec {
        name: name.to_string(),
        auto_expand: true,
        num_ports: 16,
        policy: OverridePolicy::default(),
        ..Default::default()
    }
}

/// Helper to create a VM with two adapters: an e1000 on "VM Network" and a
/// vmxnet3 attached to the given port group
pub fn create_test_vm(
    mock: &MockVSphereClient,
    path: &str,
    attached_to: Option<(&str, &str)>,
) -> ManagedObjectReference {
    let mut devices: Vec<VirtualDevice> = vec![ethernet_device(
        "VirtualE1000",
        4000,
        "Network adapter 1",
        Some(network_backing("VM Network")),
    )];
    devices.push(ethernet_device(
        "VirtualVmxnet3",
        4001,
        "Network adapter 2",
        attached_to.map(|(uuid, key)| distributed_port_backing(uuid, key)),
    ));
    mock.add_virtual_machine("dc1", path, devices)
}
