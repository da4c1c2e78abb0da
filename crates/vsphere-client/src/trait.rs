//! VSphereClient trait for mocking
//!
//! This trait abstracts the VSphereClient to enable mocking in unit tests.
//! The concrete VSphereClient implements this trait, and tests can use mock implementations.

use crate::error::VSphereError;
use crate::models::*;

/// Trait for vSphere API client operations
///
/// Methods returning a task reference only submit the request; the caller is
/// responsible for waiting on the task with [`VSphereClientTrait::task_info`].
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VSphereClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    // Inventory lookups

    /// Find a datacenter by name or path; `None` selects the only datacenter
    async fn find_datacenter(&self, name: Option<&str>) -> Result<Datacenter, VSphereError>;
    async fn datacenter_folders(&self, datacenter: &Datacenter) -> Result<DatacenterFolders, VSphereError>;

    /// Find a network entity (switch, port group, folder) by inventory path.
    ///
    /// Relative paths and paths starting with '/' are resolved against the
    /// datacenter's network folder.
    async fn find_network(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError>;
    /// Find a host by path below the datacenter's host folder.
    ///
    /// A standalone compute resource resolves to its host. Any other object
    /// found at the path is returned as is; callers check its kind.
    async fn find_host(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError>;
    /// Find an object by path below the datacenter's vm folder; callers check its kind
    async fn find_virtual_machine(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError>;

    /// Retrieve a named set of properties of a managed object as one JSON object
    async fn retrieve_properties(&self, obj: &ManagedObjectReference, properties: &[&str]) -> Result<serde_json::Value, VSphereError>;

    // Task-returning operations
    async fn create_dvs(&self, folder: &ManagedObjectReference, spec: &DvsCreateSpec) -> Result<ManagedObjectReference, VSphereError>;
    async fn reconfigure_dvs(&self, dvs: &ManagedObjectReference, spec: &DvsConfigSpec) -> Result<ManagedObjectReference, VSphereError>;
    async fn create_dv_portgroup(&self, dvs: &ManagedObjectReference, spec: &DvPortgroupConfigSpec) -> Result<ManagedObjectReference, VSphereError>;
    async fn reconfigure_vm(&self, vm: &ManagedObjectReference, spec: &VirtualMachineConfigSpec) -> Result<ManagedObjectReference, VSphereError>;
    async fn destroy(&self, obj: &ManagedObjectReference) -> Result<ManagedObjectReference, VSphereError>;

    // Tasks
    async fn task_info(&self, task: &ManagedObjectReference) -> Result<TaskInfo, VSphereError>;
}
