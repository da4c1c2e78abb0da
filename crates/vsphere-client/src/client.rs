//! vSphere API client
//!
//! Implements the vSphere client over the VI/JSON API:
//! `POST /sdk/vim25/{release}/{type}/{id}/{method}` for methods and
//! `GET /sdk/vim25/{release}/{type}/{id}/{property}` for properties.

use crate::common::{HttpClient, SESSION_HEADER, inventory_path};
use crate::error::VSphereError;
use crate::models::*;
use crate::vsphere_trait::VSphereClientTrait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// vSphere API client
pub struct VSphereClient {
    http: HttpClient,
    content: ServiceContent,
}

impl VSphereClient {
    /// Log in and create a new vSphere client
    ///
    /// # Arguments
    /// * `base_url` - vCenter base URL (e.g., "https://vcenter.example.com")
    /// * `user` / `password` - SSO credentials
    /// * `release` - VI/JSON API release (e.g., "8.0.2.0")
    /// * `insecure` - Accept self-signed certificates
    pub async fn login(
        base_url: String,
        user: &str,
        password: &str,
        release: String,
        insecure: bool,
    ) -> Result<Self, VSphereError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .danger_accept_invalid_certs(insecure)
            .build()?;
        let http = HttpClient::new(client, base_url, release);

        let service_instance = ManagedObjectReference::new("ServiceInstance", "ServiceInstance");
        let content: ServiceContent = http
            .get_property(&service_instance, "content")
            .await?
            .ok_or_else(|| VSphereError::Api("ServiceInstance returned no content".to_string()))?;

        debug!("Logging in to {} as {}", http.base_url(), user);
        let response = http
            .invoke_raw(
                &content.session_manager,
                "Login",
                &json!({ "userName": user, "password": password }),
            )
            .await
            .map_err(|e| match e {
                VSphereError::Fault { message, .. } => VSphereError::Authentication(message),
                other => other,
            })?;

        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                VSphereError::Authentication(format!("login response carried no {} header", SESSION_HEADER))
            })?;

        info!("Logged in to {}", http.base_url());
        Ok(Self {
            http: http.with_session(session),
            content,
        })
    }

    /// Log out and invalidate the session
    pub async fn logout(&self) -> Result<(), VSphereError> {
        self.http
            .invoke_raw(&self.content.session_manager, "Logout", &json!({}))
            .await?;
        Ok(())
    }

    async fn find_by_inventory_path(&self, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        debug!("FindByInventoryPath {}", path);
        self.http
            .invoke(
                &self.content.search_index,
                "FindByInventoryPath",
                &json!({ "inventoryPath": path }),
            )
            .await?
            .ok_or_else(|| VSphereError::NotFound(format!("inventory path '{}'", path)))
    }

    async fn name_of(&self, obj: &ManagedObjectReference) -> Result<String, VSphereError> {
        self.http
            .get_property(obj, "name")
            .await?
            .ok_or_else(|| VSphereError::Api(format!("{} has no name", obj)))
    }

    async fn submit_task(
        &self,
        obj: &ManagedObjectReference,
        method: &str,
        body: serde_json::Value,
    ) -> Result<ManagedObjectReference, VSphereError> {
        let task: ManagedObjectReference = self.http.invoke_required(obj, method, &body).await?;
        debug!("{} on {} submitted as {}", method, obj, task);
        Ok(task)
    }
}

#[async_trait::async_trait]
impl VSphereClientTrait for VSphereClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn find_datacenter(&self, name: Option<&str>) -> Result<Datacenter, VSphereError> {
        match name {
            Some(name) => {
                let path = name.trim_start_matches('/');
                let reference = self.find_by_inventory_path(path).await?;
                if reference.kind != mo_type::DATACENTER {
                    return Err(VSphereError::InvalidRequest(format!(
                        "'{}' is a {}, not a datacenter",
                        name, reference.kind
                    )));
                }
                Ok(Datacenter {
                    reference,
                    inventory_path: format!("/{}", path),
                })
            }
            None => {
                let children: Vec<ManagedObjectReference> = self
                    .http
                    .get_property(&self.content.root_folder, "childEntity")
                    .await?
                    .unwrap_or_default();
                let mut datacenters = children
                    .into_iter()
                    .filter(|c| c.kind == mo_type::DATACENTER);
                match (datacenters.next(), datacenters.next()) {
                    (Some(reference), None) => {
                        let name = self.name_of(&reference).await?;
                        Ok(Datacenter {
                            reference,
                            inventory_path: format!("/{}", name),
                        })
                    }
                    (None, _) => Err(VSphereError::NotFound("no datacenter in inventory".to_string())),
                    (Some(_), Some(_)) => Err(VSphereError::InvalidRequest(
                        "multiple datacenters found, a datacenter name is required".to_string(),
                    )),
                }
            }
        }
    }

    async fn datacenter_folders(&self, datacenter: &Datacenter) -> Result<DatacenterFolders, VSphereError> {
        let value = self
            .retrieve_properties(&datacenter.reference, &["vmFolder", "hostFolder", "networkFolder"])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn find_network(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        self.find_by_inventory_path(&inventory_path(datacenter, "network", path))
            .await
    }

    async fn find_host(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        let found = self
            .find_by_inventory_path(&inventory_path(datacenter, "host", path))
            .await?;
        if found.kind != mo_type::COMPUTE_RESOURCE {
            return Ok(found);
        }

        // A standalone host is found through its compute resource
        let hosts = self.http.get_property(&found, "host").await;
        standalone_host(path, found, hosts)
    }

    async fn find_virtual_machine(&self, datacenter: &Datacenter, path: &str) -> Result<ManagedObjectReference, VSphereError> {
        self.find_by_inventory_path(&inventory_path(datacenter, "vm", path))
            .await
    }

    async fn retrieve_properties(&self, obj: &ManagedObjectReference, properties: &[&str]) -> Result<serde_json::Value, VSphereError> {
        let mut result = serde_json::Map::new();
        for property in properties {
            let value: Option<serde_json::Value> = self.http.get_property(obj, property).await?;
            if let Some(value) = value {
                result.insert(property.to_string(), value);
            }
        }
        Ok(serde_json::Value::Object(result))
    }

    async fn create_dvs(&self, folder: &ManagedObjectReference, spec: &DvsCreateSpec) -> Result<ManagedObjectReference, VSphereError> {
        self.submit_task(folder, "CreateDVS_Task", json!({ "spec": spec }))
            .await
    }

    async fn reconfigure_dvs(&self, dvs: &ManagedObjectReference, spec: &DvsConfigSpec) -> Result<ManagedObjectReference, VSphereError> {
        self.submit_task(dvs, "ReconfigureDvs_Task", json!({ "spec": spec }))
            .await
    }

    async fn create_dv_portgroup(&self, dvs: &ManagedObjectReference, spec: &DvPortgroupConfigSpec) -> Result<ManagedObjectReference, VSphereError> {
        self.submit_task(dvs, "CreateDVPortgroup_Task", json!({ "spec": spec }))
            .await
    }

    async fn reconfigure_vm(&self, vm: &ManagedObjectReference, spec: &VirtualMachineConfigSpec) -> Result<ManagedObjectReference, VSphereError> {
        self.submit_task(vm, "ReconfigVM_Task", json!({ "spec": spec }))
            .await
    }

    async fn destroy(&self, obj: &ManagedObjectReference) -> Result<ManagedObjectReference, VSphereError> {
        self.submit_task(obj, "Destroy_Task", json!({})).await
    }

    async fn task_info(&self, task: &ManagedObjectReference) -> Result<TaskInfo, VSphereError> {
        self.http
            .get_property(task, "info")
            .await?
            .ok_or_else(|| VSphereError::Api(format!("{} has no info", task)))
    }
}

/// The single host of a standalone compute resource.
///
/// Errors fetching the `host` property are passed through; only a resource
/// without a host is reported as not found.
fn standalone_host(
    path: &str,
    resource: ManagedObjectReference,
    hosts: Result<Option<Vec<ManagedObjectReference>>, VSphereError>,
) -> Result<ManagedObjectReference, VSphereError> {
    let hosts = hosts?.unwrap_or_default();
    match hosts.as_slice() {
        [host] => Ok(host.clone()),
        [] => Err(VSphereError::NotFound(format!("compute resource '{}' has no host", path))),
        _ => Ok(resource),
    }
}
