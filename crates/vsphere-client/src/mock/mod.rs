//! Mock VSphereClient for unit testing
//!
//! This module provides a mock implementation of VSphereClientTrait that can be used
//! in unit tests without requiring a vCenter.
//!
//! The mock is organized into domain-specific modules:
//! - `inventory.rs` - Inventory lookups and property retrieval
//! - `tasks.rs` - Task submission, scripted task outcomes and their effects
//! - `helpers.rs` - Helper functions for building devices and backings

mod helpers;
mod inventory;
mod tasks;

pub use helpers::{distributed_port_backing, ethernet_device, network_backing};
pub use tasks::TaskScript;

use crate::error::VSphereError;
use crate::models::*;
use crate::vsphere_trait::VSphereClientTrait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tasks::MockTask;

/// A distributed switch held by the mock
#[derive(Debug, Clone)]
pub(crate) struct MockSwitch {
    /// Inventory path of the parent folder, e.g. "dc1/network/net"
    pub(crate) folder_path: String,
    pub(crate) properties: DvsProperties,
}

/// A distributed port group held by the mock
#[derive(Debug, Clone)]
pub(crate) struct MockPortgroup {
    pub(crate) path: String,
    pub(crate) properties: DvPortgroupProperties,
}

/// Mock VSphereClient for testing
///
/// This mock stores the inventory in memory. Mutations are submitted as tasks
/// and only take effect when the task is polled to success, so tests can
/// script queued/running/failed/cancelled tasks with [`TaskScript`].
#[derive(Clone)]
pub struct MockVSphereClient {
    pub(crate) base_url: String,
    // In-memory inventory
    pub(crate) datacenters: Arc<Mutex<HashMap<String, ManagedObjectReference>>>,
    pub(crate) folders: Arc<Mutex<HashMap<String, DatacenterFolders>>>,
    pub(crate) paths: Arc<Mutex<HashMap<String, ManagedObjectReference>>>,
    pub(crate) switches: Arc<Mutex<HashMap<String, MockSwitch>>>,
    pub(crate) portgroups: Arc<Mutex<HashMap<String, MockPortgroup>>>,
    pub(crate) vms: Arc<Mutex<HashMap<String, VmConfigInfo>>>,
    // Tasks
    pub(crate) tasks: Arc<Mutex<HashMap<String, MockTask>>>,
    pub(crate) scripts: Arc<Mutex<VecDeque<TaskScript>>>,
    // Call log and injected failures
    pub(crate) submissions: Arc<Mutex<Vec<String>>>,
    pub(crate) failures: Arc<Mutex<HashMap<String, String>>>,
    // Counter for generating managed object ids
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl MockVSphereClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            datacenters: Arc::new(Mutex::new(HashMap::new())),
            folders: Arc::new(Mutex::new(HashMap::new())),
            paths: Arc::new(Mutex::new(HashMap::new())),
            switches: Arc::new(Mutex::new(HashMap::new())),
            portgroups: Arc::new(Mutex::new(HashMap::new())),
            vms: Arc::new(Mutex::new(HashMap::new())),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            submissions: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Generate next ID
    pub(crate) fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }

    /// Return the injected failure for `call`, if any (consumed on use)
    pub(crate) fn take_failure(&self, call: &str) -> Result<(), VSphereError> {
        match self.failures.lock().unwrap().remove(call) {
            Some(message) => Err(VSphereError::Connection(message)),
            None => Ok(()),
        }
    }

    // Test setup

    /// Add a datacenter with its root folders
    pub fn add_datacenter(&self, name: &str) -> Datacenter {
        let reference = ManagedObjectReference::new(mo_type::DATACENTER, format!("datacenter-{}", self.next_id()));
        let folders = DatacenterFolders {
            vm_folder: ManagedObjectReference::new(mo_type::FOLDER, format!("group-v{}", self.next_id())),
            host_folder: ManagedObjectReference::new(mo_type::FOLDER, format!("group-h{}", self.next_id())),
            network_folder: ManagedObjectReference::new(mo_type::FOLDER, format!("group-n{}", self.next_id())),
        };

        let mut paths = self.paths.lock().unwrap();
        paths.insert(name.to_string(), reference.clone());
        paths.insert(format!("{}/vm", name), folders.vm_folder.clone());
        paths.insert(format!("{}/host", name), folders.host_folder.clone());
        paths.insert(format!("{}/network", name), folders.network_folder.clone());
        drop(paths);

        self.folders.lock().unwrap().insert(reference.value.clone(), folders);
        self.datacenters.lock().unwrap().insert(name.to_string(), reference.clone());
        Datacenter {
            reference,
            inventory_path: format!("/{}", name),
        }
    }

    /// Add a folder below the network root, e.g. `add_network_folder("dc1", "net")`
    pub fn add_network_folder(&self, datacenter: &str, path: &str) -> ManagedObjectReference {
        let reference = ManagedObjectReference::new(mo_type::FOLDER, format!("group-n{}", self.next_id()));
        self.paths
            .lock()
            .unwrap()
            .insert(format!("{}/network/{}", datacenter, path.trim_matches('/')), reference.clone());
        reference
    }

    /// Add a host below the host root, e.g. `add_host("dc1", "cluster1/esxi1")`
    pub fn add_host(&self, datacenter: &str, path: &str) -> ManagedObjectReference {
        let reference = ManagedObjectReference::new(mo_type::HOST_SYSTEM, format!("host-{}", self.next_id()));
        self.paths
            .lock()
            .unwrap()
            .insert(format!("{}/host/{}", datacenter, path.trim_matches('/')), reference.clone());
        reference
    }

    /// Add an object of any kind below one of the datacenter roots ("host", "vm", "network"),
    /// e.g. a cluster where a host is expected
    pub fn add_object(&self, datacenter: &str, root: &str, path: &str, kind: &str) -> ManagedObjectReference {
        let reference = ManagedObjectReference::new(kind, format!("obj-{}", self.next_id()));
        self.paths
            .lock()
            .unwrap()
            .insert(format!("{}/{}/{}", datacenter, root, path.trim_matches('/')), reference.clone());
        reference
    }

    /// Add a virtual machine with the given devices below the vm root
    pub fn add_virtual_machine(&self, datacenter: &str, path: &str, devices: Vec<VirtualDevice>) -> ManagedObjectReference {
        let reference = ManagedObjectReference::new(mo_type::VIRTUAL_MACHINE, format!("vm-{}", self.next_id()));
        let path = path.trim_matches('/');
        self.paths
            .lock()
            .unwrap()
            .insert(format!("{}/vm/{}", datacenter, path), reference.clone());
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        self.vms.lock().unwrap().insert(
            reference.value.clone(),
            VmConfigInfo {
                name,
                hardware: VirtualHardware { device: devices },
            },
        );
        reference
    }

    /// Add a distributed switch directly, bypassing tasks
    pub fn add_switch(&self, datacenter: &str, folder: &str, spec: &DvsConfigSpec) -> ManagedObjectReference {
        let folder_path = match folder.trim_matches('/') {
            "" => format!("{}/network", datacenter),
            f => format!("{}/network/{}", datacenter, f),
        };
        tasks::insert_switch(self, &folder_path, spec)
            .unwrap_or_else(|fault| panic!("failed to add switch: {:?}", fault))
    }

    /// Add a distributed port group directly, bypassing tasks
    pub fn add_portgroup(&self, dvs: &ManagedObjectReference, spec: &DvPortgroupConfigSpec) -> ManagedObjectReference {
        tasks::insert_portgroup(self, dvs, spec)
            .unwrap_or_else(|fault| panic!("failed to add port group: {:?}", fault))
    }

    /// Script the outcome of the next submitted task
    pub fn push_task_script(&self, script: TaskScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Make the next call of `call` (a trait method name) fail with a connection error
    pub fn fail_next(&self, call: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(call.to_string(), message.to_string());
    }

    /// Task-returning methods submitted so far, as "Method:object-id"
    pub fn submissions(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }

    /// Remove an object behind the client's back
    pub fn remove_object(&self, obj: &ManagedObjectReference) {
        self.switches.lock().unwrap().remove(&obj.value);
        self.portgroups.lock().unwrap().remove(&obj.value);
        self.vms.lock().unwrap().remove(&obj.value);
        self.paths.lock().unwrap().retain(|_, r| r != obj);
    }

    // Test inspection

    pub fn switch(&self, dvs: &ManagedObjectReference) -> Option<DvsProperties> {
        self.switches
            .lock()
            .unwrap()
            .get(&dvs.value)
            .map(|s| s.properties.clone())
    }

    pub fn portgroup(&self, pg: &ManagedObjectReference) -> Option<DvPortgroupProperties> {
        self.portgroups
            .lock()
            .unwrap()
            .get(&pg.value)
            .map(|p| p.properties.clone())
    }

    pub fn vm_devices(&self, vm: &ManagedObjectReference) -> Vec<VirtualDevice> {
        self.vms
            .lock()
            .unwrap()
            .get(&vm.value)
            .map(|c| c.hardware.device.clone())
            .unwrap_or_default()
    }

    /// Mutate a stored switch in place
    pub fn update_switch(&self, dvs: &ManagedObjectReference, f: impl FnOnce(&mut DvsProperties)) {
        if let Some(switch) = self.switches.lock().unwrap().get_mut(&dvs.value) {
            f(&mut switch.properties);
        }
    }

    /// Mutate a stored port group in place
    pub fn update_portgroup(&self, pg: &ManagedObjectReference, f: impl FnOnce(&mut DvPortgroupProperties)) {
        if let Some(portgroup) = self.portgroups.lock().unwrap().get_mut(&pg.value) {
            f(&mut portgroup.properties);
        }
    }

    /// Mutate the devices of a stored virtual machine in place
    pub fn update_vm_devices(&self, vm: &ManagedObjectReference, f: impl FnOnce(&mut Vec<VirtualDevice>)) {
        if let Some(config) = self.vms.lock().unwrap().get_mut(&vm.value) {
            f(&mut config.hardware.device);
        }
    }
}

#[async_trait::async_trait]
impl VSphereClientTrait for MockVSphereClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    // Inventory - delegated to inventory module
    async fn find_datacenter(&self, name: Option<&str>) -> Result<Datacenter, VSphereError> {
        inventory::find_datacenter(self, name).await
    }

    async fn datacenter_folders(&self, datacenter: &Datacenter) -> Result<DatacenterFolders, VSphereError> {
        inventory::datacenter_folders(self, datacenter).await
    }

    async fn find_network(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        inventory::find_below(self, "find_network", datacenter, "network", path).await
    }

    async fn find_host(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        inventory::find_below(self, "find_host", datacenter, "host", path).await
    }

    async fn find_virtual_machine(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        inventory::find_below(self, "find_virtual_machine", datacenter, "vm", path).await
    }

    async fn retrieve_properties(&self, obj: &ManagedObjectReference, properties: &[&str]) -> Result<serde_json::Value, VSphereError> {
        inventory::retrieve_properties(self, obj, properties).await
    }

    // Tasks - delegated to tasks module
    async fn create_dvs(&self, folder: &ManagedObjectReference, spec: &DvsCreateSpec) -> Result<ManagedObjectReference, VSphereError> {
        tasks::create_dvs(self, folder, spec).await
    }

    async fn reconfigure_dvs(&self, dvs: &ManagedObjectReference, spec: &DvsConfigSpec) -> Result<ManagedObjectReference, VSphereError> {
        tasks::reconfigure_dvs(self, dvs, spec).await
    }

    async fn create_dv_portgroup(&self, dvs: &ManagedObjectReference, spec: &DvPortgroupConfigSpec) -> Result<ManagedObjectReference, VSphereError> {
        tasks::create_dv_portgroup(self, dvs, spec).await
    }

    async fn reconfigure_vm(&self, vm: &ManagedObjectReference, spec: &VirtualMachineConfigSpec) -> Result<ManagedObjectReference, VSphereError> {
        tasks::reconfigure_vm(self, vm, spec).await
    }

    async fn destroy(&self, obj: &ManagedObjectReference) -> Result<ManagedObjectReference, VSphereError> {
        tasks::destroy(self, obj).await
    }

    async fn task_info(&self, task: &ManagedObjectReference) -> Result<TaskInfo, VSphereError> {
        tasks::task_info(self, task).await
    }
}
