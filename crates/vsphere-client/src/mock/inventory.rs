//! Inventory operations for MockVSphereClient
//!
//! Handles datacenter and path lookups and property retrieval

use super::MockVSphereClient;
use crate::common::inventory_path;
use crate::error::VSphereError;
use crate::models::*;
use serde_json::Value;

pub async fn find_datacenter(client: &MockVSphereClient, name: Option<&str>) -> Result<Datacenter, VSphereError> {
    client.take_failure("find_datacenter")?;
    let datacenters = client.datacenters.lock().unwrap();
    let (name, reference) = match name {
        Some(name) => {
            let name = name.trim_matches('/');
            datacenters
                .get(name)
                .map(|r| (name.to_string(), r.clone()))
                .ok_or_else(|| VSphereError::NotFound(format!("inventory path '{}'", name)))?
        }
        None => {
            if datacenters.len() > 1 {
                return Err(VSphereError::InvalidRequest(
                    "multiple datacenters found, a datacenter name is required".to_string(),
                ));
            }
            datacenters
                .iter()
                .next()
                .map(|(n, r)| (n.clone(), r.clone()))
                .ok_or_else(|| VSphereError::NotFound("no datacenter in inventory".to_string()))?
        }
    };
    Ok(Datacenter {
        reference,
        inventory_path: format!("/{}", name),
    })
}

pub async fn datacenter_folders(client: &MockVSphereClient, datacenter: &Datacenter) -> Result<DatacenterFolders, VSphereError> {
    client.take_failure("datacenter_folders")?;
    client
        .folders
        .lock()
        .unwrap()
        .get(&datacenter.reference.value)
        .cloned()
        .ok_or_else(|| VSphereError::NotFound(format!("{}", datacenter.reference)))
}

pub async fn find_below(
    client: &MockVSphereClient,
    call: &str,
    datacenter: &Datacenter,
    root: &str,
    path: &str,
) -> Result<ManagedObjectReference, VSphereError> {
    client.take_failure(call)?;
    let full = inventory_path(datacenter, root, path);
    client
        .paths
        .lock()
        .unwrap()
        .get(&full)
        .cloned()
        .ok_or_else(|| VSphereError::NotFound(format!("inventory path '{}'", full)))
}

pub async fn retrieve_properties(
    client: &MockVSphereClient,
    obj: &ManagedObjectReference,
    properties: &[&str],
) -> Result<Value, VSphereError> {
    client.take_failure("retrieve_properties")?;

    let all = if obj.is_distributed_switch() {
        client
            .switches
            .lock()
            .unwrap()
            .get(&obj.value)
            .map(|s| serde_json::to_value(&s.properties))
            .transpose()?
    } else if obj.is_distributed_portgroup() {
        client
            .portgroups
            .lock()
            .unwrap()
            .get(&obj.value)
            .map(|p| serde_json::to_value(&p.properties))
            .transpose()?
    } else if obj.kind == mo_type::VIRTUAL_MACHINE {
        client
            .vms
            .lock()
            .unwrap()
            .get(&obj.value)
            .map(|c| serde_json::to_value(VmProperties { config: c.clone() }))
            .transpose()?
    } else if obj.kind == mo_type::DATACENTER {
        client
            .folders
            .lock()
            .unwrap()
            .get(&obj.value)
            .map(serde_json::to_value)
            .transpose()?
    } else {
        None
    };

    let Some(Value::Object(all)) = all else {
        return Err(VSphereError::NotFound(format!(
            "ManagedObjectNotFound: {}",
            obj
        )));
    };

    let selected = all
        .into_iter()
        .filter(|(k, _)| properties.contains(&k.as_str()))
        .collect();
    Ok(Value::Object(selected))
}
