//! Virtual ethernet cards
//!
//! A VM's device list mixes NICs of several hardware variants with disks,
//! controllers and so on. Each NIC is exposed through the [`EthernetCard`]
//! interface; the variant is picked by a single ordered lookup over
//! [`NicVariant::PRIORITY`].

use crate::error::DvsError;
use vsphere_client::{Connectable, EthernetBacking, VirtualDevice};

/// Unit number of the first ethernet card; device names count from here
const FIRST_ETHERNET_UNIT: i32 = 7;

/// Hardware variants of virtual ethernet cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicVariant {
    Vmxnet3,
    Vmxnet2,
    Vmxnet,
    E1000e,
    E1000,
    PcNet32,
    Sriov,
    /// Any other device with an ethernet backing
    Generic,
}

impl NicVariant {
    /// Lookup order when resolving a NIC by label
    pub const PRIORITY: [NicVariant; 8] = [
        NicVariant::Vmxnet3,
        NicVariant::Vmxnet2,
        NicVariant::Vmxnet,
        NicVariant::E1000e,
        NicVariant::E1000,
        NicVariant::PcNet32,
        NicVariant::Sriov,
        NicVariant::Generic,
    ];

    /// Remote type name of the variant
    pub fn type_name(self) -> Option<&'static str> {
        match self {
            NicVariant::Vmxnet3 => Some("VirtualVmxnet3"),
            NicVariant::Vmxnet2 => Some("VirtualVmxnet2"),
            NicVariant::Vmxnet => Some("VirtualVmxnet"),
            NicVariant::E1000e => Some("VirtualE1000e"),
            NicVariant::E1000 => Some("VirtualE1000"),
            NicVariant::PcNet32 => Some("VirtualPCNet32"),
            NicVariant::Sriov => Some("VirtualSriovEthernetCard"),
            NicVariant::Generic => None,
        }
    }

    fn accepts(self, device: &VirtualDevice) -> bool {
        match self.type_name() {
            Some(type_name) => device.type_name == type_name,
            None => matches!(device.ethernet_backing(), Ok(Some(_))),
        }
    }

    /// Variant of a device, if it is an ethernet card at all
    pub fn of(device: &VirtualDevice) -> Option<NicVariant> {
        NicVariant::PRIORITY.into_iter().find(|v| v.accepts(device))
    }
}

/// Common interface of every virtual ethernet card variant
pub trait EthernetCard {
    fn variant(&self) -> NicVariant;

    fn device(&self) -> &VirtualDevice;

    /// Device-list name, "ethernet-N"
    fn device_name(&self) -> Option<String> {
        self.device()
            .unit_number
            .map(|unit| format!("ethernet-{}", unit - FIRST_ETHERNET_UNIT))
    }

    /// Description label, falling back to the device-list name
    fn label(&self) -> String {
        self.device()
            .label()
            .map(str::to_string)
            .or_else(|| self.device_name())
            .unwrap_or_else(|| format!("device-{}", self.device().key))
    }

    /// Whether the card answers to `label` (description label or device-list name)
    fn answers_to(&self, label: &str) -> bool {
        self.device().label() == Some(label) || self.device_name().as_deref() == Some(label)
    }

    fn backing(&self) -> Result<Option<EthernetBacking>, DvsError>;

    fn set_backing(&mut self, backing: &EthernetBacking) -> Result<(), DvsError>;

    fn set_connected(&mut self, connected: bool);

    fn into_device(self) -> VirtualDevice;
}

/// A device from a VM's device list known to be an ethernet card
#[derive(Debug, Clone, PartialEq)]
pub struct EthernetCardDevice {
    variant: NicVariant,
    device: VirtualDevice,
}

impl EthernetCardDevice {
    /// Wrap a device if it is an ethernet card
    pub fn new(device: VirtualDevice) -> Option<Self> {
        NicVariant::of(&device).map(|variant| Self { variant, device })
    }
}

impl EthernetCard for EthernetCardDevice {
    fn variant(&self) -> NicVariant {
        self.variant
    }

    fn device(&self) -> &VirtualDevice {
        &self.device
    }

    fn backing(&self) -> Result<Option<EthernetBacking>, DvsError> {
        self.device.ethernet_backing().map_err(|e| {
            DvsError::Transport(vsphere_client::VSphereError::Serialization(e))
        })
    }

    fn set_backing(&mut self, backing: &EthernetBacking) -> Result<(), DvsError> {
        self.device
            .set_ethernet_backing(backing)
            .map_err(|e| DvsError::Transport(vsphere_client::VSphereError::Serialization(e)))
    }

    fn set_connected(&mut self, connected: bool) {
        let connectable = self.device.connectable.get_or_insert_with(Connectable::default);
        connectable.connected = connected;
        connectable.start_connected = connected;
        connectable.status = None;
    }

    fn into_device(self) -> VirtualDevice {
        self.device
    }
}

/// All ethernet cards in a device list, in device order
pub fn ethernet_cards(devices: &[VirtualDevice]) -> Vec<EthernetCardDevice> {
    devices
        .iter()
        .filter_map(|d| EthernetCardDevice::new(d.clone()))
        .collect()
}

/// Resolve the card answering to `label`, trying variants in priority order
pub fn find_by_label(devices: &[VirtualDevice], label: &str) -> Option<EthernetCardDevice> {
    let cards = ethernet_cards(devices);
    NicVariant::PRIORITY.into_iter().find_map(|variant| {
        cards
            .iter()
            .find(|card| card.variant() == variant && card.answers_to(label))
            .cloned()
    })
}

/// Backing that leaves the card attached to nothing
pub fn neutral_backing() -> EthernetBacking {
    EthernetBacking::Network {
        device_name: String::new(),
        network: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsphere_client::mock::{distributed_port_backing, ethernet_device, network_backing};

    fn disk(key: i32) -> VirtualDevice {
        VirtualDevice {
            type_name: "VirtualDisk".to_string(),
            key,
            device_info: Some(vsphere_client::Description {
                label: "Hard disk 1".to_string(),
                summary: String::new(),
            }),
            backing: Some(serde_json::json!({
                "_typeName": "VirtualDiskFlatVer2BackingInfo",
                "fileName": "[ds1] vm1/vm1.vmdk"
            })),
            connectable: None,
            unit_number: Some(0),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_priority_prefers_vmxnet3_over_e1000() {
        let devices = vec![
            ethernet_device("VirtualE1000", 4000, "Network adapter 1", Some(network_backing("VM Network"))),
            ethernet_device("VirtualVmxnet3", 4001, "Network adapter 1", Some(network_backing("VM Network"))),
        ];

        let card = find_by_label(&devices, "Network adapter 1").unwrap();
        assert_eq!(card.variant(), NicVariant::Vmxnet3);
        assert_eq!(card.device().key, 4001);
    }

    #[test]
    fn test_label_matches_device_name() {
        let devices = vec![
            disk(2000),
            ethernet_device("VirtualE1000e", 4000, "Network adapter 1", None),
        ];

        let card = find_by_label(&devices, "ethernet-0").unwrap();
        assert_eq!(card.variant(), NicVariant::E1000e);
        assert_eq!(card.label(), "Network adapter 1");
        assert!(find_by_label(&devices, "ethernet-9").is_none());
    }

    #[test]
    fn test_non_nic_devices_ignored() {
        let devices = vec![disk(2000)];
        assert!(ethernet_cards(&devices).is_empty());
        assert!(find_by_label(&devices, "Hard disk 1").is_none());
    }

    #[test]
    fn test_unknown_variant_with_ethernet_backing_is_generic() {
        let devices = vec![ethernet_device(
            "VirtualVmxnet3Vrdma",
            4000,
            "Network adapter 1",
            Some(network_backing("VM Network")),
        )];

        let card = find_by_label(&devices, "Network adapter 1").unwrap();
        assert_eq!(card.variant(), NicVariant::Generic);
    }

    #[test]
    fn test_set_backing_keeps_other_fields() {
        let mut device = ethernet_device("VirtualVmxnet3", 4000, "Network adapter 1", Some(network_backing("VM Network")));
        device.extra.insert("macAddress".to_string(), serde_json::json!("00:50:56:aa:bb:cc"));
        device.extra.insert("controllerKey".to_string(), serde_json::json!(100));

        let mut card = EthernetCardDevice::new(device).unwrap();
        card.set_backing(&distributed_port_backing("uuid-1", "dvportgroup-7")).unwrap();
        card.set_connected(true);
        let device = card.into_device();

        assert_eq!(device.extra["macAddress"], "00:50:56:aa:bb:cc");
        assert_eq!(device.extra["controllerKey"], 100);
        assert!(matches!(
            device.ethernet_backing().unwrap(),
            Some(EthernetBacking::DistributedPort { .. })
        ));
    }

    #[test]
    fn test_neutral_backing_disconnects() {
        let device = ethernet_device("VirtualE1000", 4000, "Network adapter 1", Some(distributed_port_backing("u", "k")));
        let mut card = EthernetCardDevice::new(device).unwrap();
        card.set_backing(&neutral_backing()).unwrap();
        card.set_connected(false);

        let device = card.into_device();
        let connectable = device.connectable.as_ref().unwrap();
        assert!(!connectable.connected);
        assert!(!connectable.start_connected);
        assert_eq!(device.ethernet_backing().unwrap(), Some(neutral_backing()));
    }
}
