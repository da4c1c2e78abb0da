//! Task operations for MockVSphereClient
//!
//! Every mutation is submitted as a task. The task follows its [`TaskScript`]
//! and the mutation is applied to the inventory on the poll that reports success.

use super::{MockPortgroup, MockSwitch, MockVSphereClient};
use crate::error::VSphereError;
use crate::models::*;
use chrono::Utc;
use serde_json::json;

/// Scripted lifecycle of a mock task
#[derive(Debug, Clone)]
pub struct TaskScript {
    pending_polls: u32,
    outcome: ScriptedOutcome,
}

#[derive(Debug, Clone)]
enum ScriptedOutcome {
    Success,
    Fault { fault_type: String, message: String },
    Cancelled,
    ConnectionLost,
}

impl TaskScript {
    /// Succeed on the first poll
    pub fn success() -> Self {
        Self {
            pending_polls: 0,
            outcome: ScriptedOutcome::Success,
        }
    }

    /// Report the given fault when the task ends
    pub fn fault(fault_type: &str, message: &str) -> Self {
        Self {
            pending_polls: 0,
            outcome: ScriptedOutcome::Fault {
                fault_type: fault_type.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// End in the error state with the cancelled flag set
    pub fn cancelled() -> Self {
        Self {
            pending_polls: 0,
            outcome: ScriptedOutcome::Cancelled,
        }
    }

    /// Fail the terminal poll with a transport error
    pub fn connection_lost() -> Self {
        Self {
            pending_polls: 0,
            outcome: ScriptedOutcome::ConnectionLost,
        }
    }

    /// Stay running forever
    pub fn never_finishes() -> Self {
        Self::success().after(u32::MAX)
    }

    /// Report queued/running for `polls` polls before ending
    pub fn after(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }
}

/// Mutation carried by a task
#[derive(Debug, Clone)]
pub(crate) enum Effect {
    CreateDvs { folder_path: String, spec: DvsConfigSpec },
    ReconfigureDvs { dvs: ManagedObjectReference, spec: DvsConfigSpec },
    CreatePortgroup { dvs: ManagedObjectReference, spec: DvPortgroupConfigSpec },
    ReconfigureVm { vm: ManagedObjectReference, spec: VirtualMachineConfigSpec },
    Destroy { obj: ManagedObjectReference },
}

#[derive(Debug, Clone)]
pub(crate) struct MockTask {
    info: TaskInfo,
    script: TaskScript,
    polls: u32,
    effect: Option<Effect>,
}

/// Fault type and message
type Fault = (String, String);

fn fault(fault_type: &str, message: impl Into<String>) -> Fault {
    (fault_type.to_string(), message.into())
}

fn method_fault((fault_type, message): Fault) -> LocalizedMethodFault {
    LocalizedMethodFault {
        fault: json!({ "_typeName": fault_type }),
        localized_message: Some(message),
    }
}

fn submit(
    client: &MockVSphereClient,
    call: &str,
    method: &str,
    obj: &ManagedObjectReference,
    effect: Effect,
) -> Result<ManagedObjectReference, VSphereError> {
    client.take_failure(call)?;
    client
        .submissions
        .lock()
        .unwrap()
        .push(format!("{}:{}", method, obj.value));

    let key = format!("task-{}", client.next_id());
    let task = ManagedObjectReference::new(mo_type::TASK, key.clone());
    let script = client
        .scripts
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(TaskScript::success);

    let info = TaskInfo {
        key: key.clone(),
        task: task.clone(),
        description_id: Some(method.to_string()),
        state: TaskState::Queued,
        cancelled: false,
        error: None,
        result: None,
        queue_time: Some(Utc::now()),
        start_time: None,
        complete_time: None,
    };
    client.tasks.lock().unwrap().insert(
        key,
        MockTask {
            info,
            script,
            polls: 0,
            effect: Some(effect),
        },
    );
    Ok(task)
}

fn folder_path_of(client: &MockVSphereClient, folder: &ManagedObjectReference) -> Option<String> {
    client
        .paths
        .lock()
        .unwrap()
        .iter()
        .find(|(_, r)| *r == folder)
        .map(|(p, _)| p.clone())
}

fn not_found(obj: &ManagedObjectReference) -> VSphereError {
    VSphereError::NotFound(format!("ManagedObjectNotFound: {}", obj))
}

pub async fn create_dvs(
    client: &MockVSphereClient,
    folder: &ManagedObjectReference,
    spec: &DvsCreateSpec,
) -> Result<ManagedObjectReference, VSphereError> {
    let folder_path = folder_path_of(client, folder).ok_or_else(|| not_found(folder))?;
    submit(
        client,
        "create_dvs",
        "CreateDVS_Task",
        folder,
        Effect::CreateDvs {
            folder_path,
            spec: spec.config_spec.clone(),
        },
    )
}

pub async fn reconfigure_dvs(
    client: &MockVSphereClient,
    dvs: &ManagedObjectReference,
    spec: &DvsConfigSpec,
) -> Result<ManagedObjectReference, VSphereError> {
    if !client.switches.lock().unwrap().contains_key(&dvs.value) {
        return Err(not_found(dvs));
    }
    submit(
        client,
        "reconfigure_dvs",
        "ReconfigureDvs_Task",
        dvs,
        Effect::ReconfigureDvs {
            dvs: dvs.clone(),
            spec: spec.clone(),
        },
    )
}

pub async fn create_dv_portgroup(
    client: &MockVSphereClient,
    dvs: &ManagedObjectReference,
    spec: &DvPortgroupConfigSpec,
) -> Result<ManagedObjectReference, VSphereError> {
    if !client.switches.lock().unwrap().contains_key(&dvs.value) {
        return Err(not_found(dvs));
    }
    submit(
        client,
        "create_dv_portgroup",
        "CreateDVPortgroup_Task",
        dvs,
        Effect::CreatePortgroup {
            dvs: dvs.clone(),
            spec: spec.clone(),
        },
    )
}

pub async fn reconfigure_vm(
    client: &MockVSphereClient,
    vm: &ManagedObjectReference,
    spec: &VirtualMachineConfigSpec,
) -> Result<ManagedObjectReference, VSphereError> {
    if !client.vms.lock().unwrap().contains_key(&vm.value) {
        return Err(not_found(vm));
    }
    submit(
        client,
        "reconfigure_vm",
        "ReconfigVM_Task",
        vm,
        Effect::ReconfigureVm {
            vm: vm.clone(),
            spec: spec.clone(),
        },
    )
}

pub async fn destroy(client: &MockVSphereClient, obj: &ManagedObjectReference) -> Result<ManagedObjectReference, VSphereError> {
    let exists = client.switches.lock().unwrap().contains_key(&obj.value)
        || client.portgroups.lock().unwrap().contains_key(&obj.value);
    if !exists {
        return Err(not_found(obj));
    }
    submit(client, "destroy", "Destroy_Task", obj, Effect::Destroy { obj: obj.clone() })
}

pub async fn task_info(client: &MockVSphereClient, task: &ManagedObjectReference) -> Result<TaskInfo, VSphereError> {
    client.take_failure("task_info")?;

    let mut tasks = client.tasks.lock().unwrap();
    let entry = tasks.get_mut(&task.value).ok_or_else(|| not_found(task))?;

    if matches!(entry.info.state, TaskState::Success | TaskState::Error) {
        return Ok(entry.info.clone());
    }

    if entry.polls < entry.script.pending_polls {
        entry.polls += 1;
        if entry.polls > 1 {
            entry.info.state = TaskState::Running;
            entry.info.start_time.get_or_insert_with(Utc::now);
        }
        return Ok(entry.info.clone());
    }

    match entry.script.outcome.clone() {
        ScriptedOutcome::Success => match entry.effect.take().map(|e| apply(client, e)) {
            Some(Err(f)) => {
                entry.info.state = TaskState::Error;
                entry.info.error = Some(method_fault(f));
            }
            Some(Ok(result)) => {
                entry.info.state = TaskState::Success;
                entry.info.result = result;
            }
            None => entry.info.state = TaskState::Success,
        },
        ScriptedOutcome::Fault { fault_type, message } => {
            entry.info.state = TaskState::Error;
            entry.info.error = Some(method_fault((fault_type, message)));
        }
        ScriptedOutcome::Cancelled => {
            entry.info.state = TaskState::Error;
            entry.info.cancelled = true;
            entry.info.error = Some(method_fault(fault("RequestCanceled", "The task was canceled by a user.")));
        }
        ScriptedOutcome::ConnectionLost => {
            return Err(VSphereError::Connection(format!(
                "connection reset while polling {}",
                task
            )));
        }
    }
    entry.info.complete_time = Some(Utc::now());
    Ok(entry.info.clone())
}

fn apply(client: &MockVSphereClient, effect: Effect) -> Result<Option<serde_json::Value>, Fault> {
    match effect {
        Effect::CreateDvs { folder_path, spec } => {
            let dvs = insert_switch(client, &folder_path, &spec)?;
            Ok(Some(json!(dvs)))
        }
        Effect::ReconfigureDvs { dvs, spec } => reconfigure_switch(client, &dvs, &spec).map(|_| None),
        Effect::CreatePortgroup { dvs, spec } => {
            let pg = insert_portgroup(client, &dvs, &spec)?;
            Ok(Some(json!(pg)))
        }
        Effect::ReconfigureVm { vm, spec } => edit_devices(client, &vm, &spec).map(|_| None),
        Effect::Destroy { obj } => destroy_object(client, &obj).map(|_| None),
    }
}

fn apply_host_changes(members: &mut Vec<HostMember>, changes: &[HostMemberConfigSpec]) -> Result<(), Fault> {
    for change in changes {
        let position = members
            .iter()
            .position(|m| m.config.host.as_ref() == Some(&change.host));
        let backing = change
            .backing
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| fault("InvalidArgument", e.to_string()))?
            .unwrap_or_default();
        match (change.operation, position) {
            (ConfigSpecOperation::Add, Some(_)) => {
                return Err(fault("AlreadyExists", format!("host {} is already a member", change.host)));
            }
            (ConfigSpecOperation::Add, None) => members.push(HostMember {
                config: HostMemberConfigInfo {
                    host: Some(change.host.clone()),
                    backing,
                },
            }),
            (ConfigSpecOperation::Edit, Some(i)) => members[i].config.backing = backing,
            (ConfigSpecOperation::Remove, Some(i)) => {
                members.remove(i);
            }
            (_, None) => {
                return Err(fault("NotFound", format!("host {} is not a member", change.host)));
            }
        }
    }
    Ok(())
}

pub(crate) fn insert_switch(
    client: &MockVSphereClient,
    folder_path: &str,
    spec: &DvsConfigSpec,
) -> Result<ManagedObjectReference, Fault> {
    let name = spec
        .name
        .clone()
        .ok_or_else(|| fault("InvalidArgument", "spec.name"))?;
    let path = format!("{}/{}", folder_path, name);
    if client.paths.lock().unwrap().contains_key(&path) {
        return Err(fault("DuplicateName", format!("The name '{}' already exists.", name)));
    }

    let mut members = Vec::new();
    apply_host_changes(&mut members, &spec.host)?;

    let dvs = ManagedObjectReference::new(
        mo_type::VMWARE_DISTRIBUTED_SWITCH,
        format!("dvs-{}", client.next_id()),
    );
    let uplink_id = client.next_id();
    let uplink = ManagedObjectReference::new(mo_type::DISTRIBUTED_PORTGROUP, format!("dvportgroup-{}", uplink_id));
    let uplink_name = format!("{}-DVUplinks-{}", name, uplink_id);
    let uuid = uuid::Uuid::new_v4().to_string();

    let config = DvsConfigInfo {
        uuid: uuid.clone(),
        name: name.clone(),
        config_version: "1".to_string(),
        description: spec.description.clone(),
        extension_key: spec.extension_key.clone(),
        contact: spec.contact.clone(),
        num_standalone_ports: spec.num_standalone_ports.unwrap_or(0),
        policy: spec.policy.clone(),
        switch_ip_address: spec.switch_ip_address.clone(),
        host: members,
        uplink_portgroup: vec![uplink.clone()],
    };

    let uplink_path = format!("{}/{}", path, uplink_name);
    client.portgroups.lock().unwrap().insert(
        uplink.value.clone(),
        MockPortgroup {
            path: uplink_path.clone(),
            properties: DvPortgroupProperties {
                key: uplink.value.clone(),
                config: DvPortgroupConfigInfo {
                    key: uplink.value.clone(),
                    name: uplink_name,
                    num_ports: 0,
                    binding_type: PortgroupType::EarlyBinding,
                    description: None,
                    auto_expand: None,
                    port_name_format: None,
                    policy: None,
                    distributed_virtual_switch: Some(dvs.clone()),
                    default_port_config: None,
                },
                port_keys: Vec::new(),
            },
        },
    );
    client.switches.lock().unwrap().insert(
        dvs.value.clone(),
        MockSwitch {
            folder_path: folder_path.to_string(),
            properties: DvsProperties {
                uuid,
                config,
                portgroup: vec![uplink.clone()],
            },
        },
    );

    let mut paths = client.paths.lock().unwrap();
    paths.insert(path, dvs.clone());
    paths.insert(uplink_path, uplink);
    Ok(dvs)
}

fn reconfigure_switch(client: &MockVSphereClient, dvs: &ManagedObjectReference, spec: &DvsConfigSpec) -> Result<(), Fault> {
    let mut switches = client.switches.lock().unwrap();
    let switch = switches
        .get_mut(&dvs.value)
        .ok_or_else(|| fault("ManagedObjectNotFound", dvs.to_string()))?;
    let config = &mut switch.properties.config;

    if let Some(version) = &spec.config_version {
        if *version != config.config_version {
            return Err(fault(
                "ConcurrentAccess",
                format!("configVersion {} is stale, current is {}", version, config.config_version),
            ));
        }
    }

    let mut members = config.host.clone();
    apply_host_changes(&mut members, &spec.host)?;
    config.host = members;

    if let Some(name) = &spec.name {
        config.name = name.clone();
    }
    if spec.description.is_some() {
        config.description = spec.description.clone();
    }
    if spec.contact.is_some() {
        config.contact = spec.contact.clone();
    }
    if spec.policy.is_some() {
        config.policy = spec.policy.clone();
    }
    if let Some(ports) = spec.num_standalone_ports {
        config.num_standalone_ports = ports;
    }

    let next: u64 = config.config_version.parse().unwrap_or(0) + 1;
    config.config_version = next.to_string();
    Ok(())
}

pub(crate) fn insert_portgroup(
    client: &MockVSphereClient,
    dvs: &ManagedObjectReference,
    spec: &DvPortgroupConfigSpec,
) -> Result<ManagedObjectReference, Fault> {
    // port groups are looked up below their switch
    let switch_path = client
        .switches
        .lock()
        .unwrap()
        .get(&dvs.value)
        .map(|s| format!("{}/{}", s.folder_path, s.properties.config.name))
        .ok_or_else(|| fault("ManagedObjectNotFound", dvs.to_string()))?;

    let mut portgroups = client.portgroups.lock().unwrap();
    let on_switch: Vec<&MockPortgroup> = portgroups
        .values()
        .filter(|p| p.properties.config.distributed_virtual_switch.as_ref() == Some(dvs))
        .collect();
    if on_switch.iter().any(|p| p.properties.config.name == spec.name) {
        return Err(fault("DuplicateName", format!("The name '{}' already exists.", spec.name)));
    }
    let first_port: usize = on_switch.iter().map(|p| p.properties.port_keys.len()).sum();

    let pg = ManagedObjectReference::new(
        mo_type::DISTRIBUTED_PORTGROUP,
        format!("dvportgroup-{}", client.next_id()),
    );
    let path = format!("{}/{}", switch_path, spec.name);
    portgroups.insert(
        pg.value.clone(),
        MockPortgroup {
            path: path.clone(),
            properties: DvPortgroupProperties {
                key: pg.value.clone(),
                config: DvPortgroupConfigInfo {
                    key: pg.value.clone(),
                    name: spec.name.clone(),
                    num_ports: spec.num_ports,
                    binding_type: spec.binding_type,
                    description: spec.description.clone(),
                    auto_expand: spec.auto_expand,
                    port_name_format: spec.port_name_format.clone(),
                    policy: spec.policy.clone(),
                    distributed_virtual_switch: Some(dvs.clone()),
                    default_port_config: spec.default_port_config.clone(),
                },
                port_keys: (first_port..first_port + spec.num_ports.max(0) as usize)
                    .map(|k| k.to_string())
                    .collect(),
            },
        },
    );
    drop(portgroups);

    if let Some(switch) = client.switches.lock().unwrap().get_mut(&dvs.value) {
        switch.properties.portgroup.push(pg.clone());
    }
    client.paths.lock().unwrap().insert(path, pg.clone());
    Ok(pg)
}

fn edit_devices(client: &MockVSphereClient, vm: &ManagedObjectReference, spec: &VirtualMachineConfigSpec) -> Result<(), Fault> {
    let mut vms = client.vms.lock().unwrap();
    let config = vms
        .get_mut(&vm.value)
        .ok_or_else(|| fault("ManagedObjectNotFound", vm.to_string()))?;
    let devices = &mut config.hardware.device;

    for change in &spec.device_change {
        let position = devices.iter().position(|d| d.key == change.device.key);
        match (change.operation, position) {
            (ConfigSpecOperation::Add, None) => devices.push(change.device.clone()),
            (ConfigSpecOperation::Edit, Some(i)) => devices[i] = change.device.clone(),
            (ConfigSpecOperation::Remove, Some(i)) => {
                devices.remove(i);
            }
            _ => {
                return Err(fault(
                    "InvalidDeviceSpec",
                    format!("invalid {:?} of device {}", change.operation, change.device.key),
                ));
            }
        }
    }
    Ok(())
}

/// Port group keys referenced by any VM NIC backing
fn portgroups_in_use(client: &MockVSphereClient) -> Vec<String> {
    client
        .vms
        .lock()
        .unwrap()
        .values()
        .flat_map(|c| c.hardware.device.iter())
        .filter_map(|d| match d.ethernet_backing() {
            Ok(Some(EthernetBacking::DistributedPort { port })) => port.portgroup_key,
            _ => None,
        })
        .collect()
}

fn destroy_object(client: &MockVSphereClient, obj: &ManagedObjectReference) -> Result<(), Fault> {
    let in_use = portgroups_in_use(client);

    if client.switches.lock().unwrap().contains_key(&obj.value) {
        let owned: Vec<String> = client
            .portgroups
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.properties.config.distributed_virtual_switch.as_ref() == Some(obj))
            .map(|p| p.properties.key.clone())
            .collect();
        if let Some(busy) = owned.iter().find(|k| in_use.contains(k)) {
            return Err(fault("ResourceInUse", format!("port group {} is in use", busy)));
        }
        let mut portgroups = client.portgroups.lock().unwrap();
        let mut paths = client.paths.lock().unwrap();
        for key in &owned {
            portgroups.remove(key);
            paths.retain(|_, r| r.value != *key);
        }
        paths.retain(|_, r| r != obj);
        drop(paths);
        drop(portgroups);
        client.switches.lock().unwrap().remove(&obj.value);
        return Ok(());
    }

    if client.portgroups.lock().unwrap().contains_key(&obj.value) {
        if in_use.contains(&obj.value) {
            return Err(fault("ResourceInUse", format!("port group {} is in use", obj.value)));
        }
        client.portgroups.lock().unwrap().remove(&obj.value);
        client.paths.lock().unwrap().retain(|_, r| r != obj);
        for switch in client.switches.lock().unwrap().values_mut() {
            switch.properties.portgroup.retain(|p| p != obj);
        }
        return Ok(());
    }

    Err(fault("ManagedObjectNotFound", obj.to_string()))
}
