//! Declaration-driven reconciliation.
//!
//! The `Controller` walks a declaration file in dependency order and brings
//! vSphere in line with it, using the state file to remember which objects it
//! created. Each object is handled on its own: a failure is logged and
//! collected in the [`RunSummary`], and processing moves on to the next one.

use crate::error::DvsError;
use crate::identity::{normalize_folder, HostBindingId, PortGroupId, ResourceKind, SwitchId, VmNicBindingId};
use crate::reconcile_helpers::{check_existing, ignore_gone};
use crate::reconciler::Reconciler;
use crate::state::StateFile;
use dvs_resources::{
    Declarations, HostBindingDeclaration, PortGroupSpec, SwitchSpec, VmNicBindingDeclaration,
};
use tracing::{error, info, warn};

/// An object that could not be brought in line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub object: String,
    pub error: String,
}

/// Outcome of one run, as identifiers per outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: Vec<String>,
    pub unchanged: Vec<String>,
    /// Objects replaced because they were gone or had drifted
    pub recreated: Vec<String>,
    pub deleted: Vec<String>,
    /// Recorded objects found gone by a refresh and dropped from the state
    pub forgotten: Vec<String>,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, object: impl ToString, err: &DvsError) {
        let object = object.to_string();
        error!("{}: {}", object, err);
        self.failures.push(Failure {
            object,
            error: err.to_string(),
        });
    }
}

/// A recorded identifier of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordedId {
    Switch(SwitchId),
    PortGroup(PortGroupId),
    HostBinding(HostBindingId),
    VmNicBinding(VmNicBindingId),
}

impl RecordedId {
    fn parse(id: &str) -> Result<Self, DvsError> {
        match ResourceKind::of_identifier(id) {
            Some(ResourceKind::Switch) => id.parse().map(RecordedId::Switch),
            Some(ResourceKind::PortGroup) => id.parse().map(RecordedId::PortGroup),
            Some(ResourceKind::HostBinding) => id.parse().map(RecordedId::HostBinding),
            Some(ResourceKind::VmNicBinding) => id.parse().map(RecordedId::VmNicBinding),
            None => Err(DvsError::MalformedIdentifier {
                kind: "recorded",
                id: id.to_string(),
            }),
        }
    }

    fn kind(&self) -> ResourceKind {
        match self {
            RecordedId::Switch(_) => ResourceKind::Switch,
            RecordedId::PortGroup(_) => ResourceKind::PortGroup,
            RecordedId::HostBinding(_) => ResourceKind::HostBinding,
            RecordedId::VmNicBinding(_) => ResourceKind::VmNicBinding,
        }
    }
}

/// Switch attributes the way they read back from vSphere
fn normalized_switch(spec: &SwitchSpec) -> SwitchSpec {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());
    let mut spec = spec.clone();
    spec.folder = normalize_folder(&spec.folder);
    spec.extension_key = non_empty(&spec.extension_key);
    spec.description = non_empty(&spec.description);
    spec.contact.name = non_empty(&spec.contact.name);
    spec.contact.infos = non_empty(&spec.contact.infos);
    spec.switch_ip_address = non_empty(&spec.switch_ip_address);
    spec
}

/// Port group attributes the way they read back from vSphere
fn normalized_port_group(spec: &PortGroupSpec) -> PortGroupSpec {
    let mut spec = spec.clone();
    spec.description = spec.description.filter(|d| !d.is_empty());
    spec.port_name_format = spec.port_name_format.filter(|f| !f.is_empty());
    spec
}

pub struct Controller {
    reconciler: Reconciler,
    declarations: Declarations,
}

impl Controller {
    pub fn new(reconciler: Reconciler, declarations: Declarations) -> Self {
        Self {
            reconciler,
            declarations,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    fn cancelled(&self) -> bool {
        if self.reconciler.cancellation().is_cancelled() {
            warn!("Cancellation requested, stopping before the next object");
            return true;
        }
        false
    }

    fn switch_id(&self, name: &str) -> Result<SwitchId, DvsError> {
        let spec = self
            .declarations
            .switch(name)
            .ok_or_else(|| DvsError::InvalidConfig(format!("switch '{}' is not declared", name)))?;
        SwitchId::new(&spec.datacenter, &spec.folder, &spec.name)
    }

    /// NIC label declared for a recorded binding, if it is still declared
    fn declared_nic_label(&self, id: &VmNicBindingId) -> Option<&str> {
        self.declarations
            .vm_nic_bindings
            .iter()
            .find(|decl| {
                self.switch_id(&decl.switch)
                    .and_then(|switch| PortGroupId::new(switch, &decl.port_group))
                    .and_then(|port_group| VmNicBindingId::new(port_group, &decl.spec.vm))
                    .is_ok_and(|declared| &declared == id)
            })
            .map(|decl| decl.spec.nic_label.as_str())
    }

    /// Create or verify every declared object, parents first
    pub async fn apply(&self, state: &mut StateFile) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(
            "Applying {} switch(es), {} port group(s), {} host binding(s), {} vm nic binding(s)",
            self.declarations.switches.len(),
            self.declarations.port_groups.len(),
            self.declarations.host_bindings.len(),
            self.declarations.vm_nic_bindings.len()
        );

        for spec in &self.declarations.switches {
            if self.cancelled() {
                return summary;
            }
            if let Err(e) = self.apply_switch(spec, state, &mut summary).await {
                summary.fail(format!("switch {}", spec.name), &e);
            }
        }
        for decl in &self.declarations.port_groups {
            if self.cancelled() {
                return summary;
            }
            if let Err(e) = self.apply_port_group(&decl.switch, &decl.spec, state, &mut summary).await {
                summary.fail(format!("port group {}/{}", decl.switch, decl.spec.name), &e);
            }
        }
        for decl in &self.declarations.host_bindings {
            if self.cancelled() {
                return summary;
            }
            if let Err(e) = self.apply_host_binding(decl, state, &mut summary).await {
                summary.fail(format!("host binding {}/{}", decl.switch, decl.spec.host), &e);
            }
        }
        for decl in &self.declarations.vm_nic_bindings {
            if self.cancelled() {
                return summary;
            }
            if let Err(e) = self.apply_vm_nic_binding(decl, state, &mut summary).await {
                summary.fail(
                    format!("vm nic binding {}/{}/{}", decl.switch, decl.port_group, decl.spec.vm),
                    &e,
                );
            }
        }
        summary
    }

    async fn apply_switch(&self, spec: &SwitchSpec, state: &mut StateFile, summary: &mut RunSummary) -> Result<(), DvsError> {
        let id = SwitchId::new(&spec.datacenter, &spec.folder, &spec.name)?;
        if !state.contains(&id) {
            let id = self.reconciler.create_switch(spec).await?;
            state.record(&id);
            summary.created.push(id.to_string());
            return Ok(());
        }

        match check_existing(&format!("switch {}", id), self.reconciler.read_switch(&id)).await? {
            Some(live) if live == normalized_switch(spec) => summary.unchanged.push(id.to_string()),
            Some(_) => {
                warn!("Switch {} has drifted from its declaration", id);
                self.reconciler.update_switch(&id, spec).await?;
                summary.unchanged.push(id.to_string());
            }
            None => {
                self.reconciler.create_switch(spec).await?;
                state.record(&id);
                summary.recreated.push(id.to_string());
            }
        }
        Ok(())
    }

    async fn apply_port_group(
        &self,
        switch: &str,
        spec: &PortGroupSpec,
        state: &mut StateFile,
        summary: &mut RunSummary,
    ) -> Result<(), DvsError> {
        let owner = self.switch_id(switch)?;
        let id = PortGroupId::new(owner.clone(), &spec.name)?;
        if !state.contains(&id) {
            let id = self.reconciler.create_port_group(&owner.to_string(), spec).await?;
            state.record(&id);
            summary.created.push(id.to_string());
            return Ok(());
        }

        match check_existing(&format!("port group {}", id), self.reconciler.read_port_group(&id)).await? {
            Some(live) if live.spec == normalized_port_group(spec) => summary.unchanged.push(id.to_string()),
            Some(_) => {
                warn!("Port group {} has drifted from its declaration", id);
                self.reconciler.update_port_group(&id, spec).await?;
                summary.unchanged.push(id.to_string());
            }
            None => {
                self.reconciler.create_port_group(&owner.to_string(), spec).await?;
                state.record(&id);
                summary.recreated.push(id.to_string());
            }
        }
        Ok(())
    }

    async fn apply_host_binding(
        &self,
        decl: &HostBindingDeclaration,
        state: &mut StateFile,
        summary: &mut RunSummary,
    ) -> Result<(), DvsError> {
        let spec = &decl.spec;
        let id = HostBindingId::new(self.switch_id(&decl.switch)?, &spec.host)?;
        if !state.contains(&id) {
            self.reconciler.create_host_binding(&id.switch, spec).await?;
            state.record(&id);
            summary.created.push(id.to_string());
            return Ok(());
        }

        match check_existing(&format!("host binding {}", id), self.reconciler.read_host_binding(&id)).await? {
            Some(live) if live.nic_names == spec.nic_names => summary.unchanged.push(id.to_string()),
            Some(live) => {
                warn!(
                    "Host binding {} uses {:?}, declared {:?}; rebinding",
                    id, live.nic_names, spec.nic_names
                );
                self.reconciler.delete_host_binding(&id).await?;
                self.reconciler.create_host_binding(&id.switch, spec).await?;
                summary.recreated.push(id.to_string());
            }
            None => {
                self.reconciler.create_host_binding(&id.switch, spec).await?;
                summary.recreated.push(id.to_string());
            }
        }
        Ok(())
    }

    async fn apply_vm_nic_binding(
        &self,
        decl: &VmNicBindingDeclaration,
        state: &mut StateFile,
        summary: &mut RunSummary,
    ) -> Result<(), DvsError> {
        let spec = &decl.spec;
        let port_group = PortGroupId::new(self.switch_id(&decl.switch)?, &decl.port_group)?;
        let id = VmNicBindingId::new(port_group, &spec.vm)?;
        if !state.contains(&id) {
            self.reconciler.create_vm_nic_binding(&id.port_group, spec).await?;
            state.record(&id);
            summary.created.push(id.to_string());
            return Ok(());
        }

        let read = self.reconciler.read_vm_nic_binding(&id, Some(spec.nic_label.as_str()));
        match check_existing(&format!("binding {}", id), read).await? {
            Some(live) if live.answers_to(&spec.nic_label) => summary.unchanged.push(id.to_string()),
            Some(live) => {
                warn!(
                    "Binding {} uses {}, declared {}; moving it",
                    id, live.spec.nic_label, spec.nic_label
                );
                let bound = live.device_name.as_deref().unwrap_or(&live.spec.nic_label);
                self.reconciler.unbind_vm_nic(&id, bound).await?;
                self.reconciler.create_vm_nic_binding(&id.port_group, spec).await?;
                summary.recreated.push(id.to_string());
            }
            None => {
                self.reconciler.create_vm_nic_binding(&id.port_group, spec).await?;
                summary.recreated.push(id.to_string());
            }
        }
        Ok(())
    }

    /// Recorded identifiers that parse, children first
    fn recorded(state: &StateFile, summary: &mut RunSummary) -> Vec<(String, RecordedId)> {
        let mut recorded: Vec<(String, RecordedId)> = state
            .ids()
            .filter_map(|raw| match RecordedId::parse(raw) {
                Ok(id) => Some((raw.to_string(), id)),
                Err(e) => {
                    summary.fail(raw, &e);
                    None
                }
            })
            .collect();
        recorded.sort_by_key(|(_, id)| std::cmp::Reverse(id.kind()));
        recorded
    }

    /// Delete every recorded object, children first
    pub async fn destroy(&self, state: &mut StateFile) -> RunSummary {
        let mut summary = RunSummary::default();
        let recorded = Self::recorded(state, &mut summary);
        info!("Destroying {} recorded object(s)", recorded.len());

        for (raw, id) in recorded {
            if self.cancelled() {
                break;
            }
            let result = match &id {
                RecordedId::VmNicBinding(id) => {
                    self.reconciler
                        .delete_vm_nic_binding(id, self.declared_nic_label(id))
                        .await
                }
                RecordedId::HostBinding(id) => self.reconciler.delete_host_binding(id).await,
                RecordedId::PortGroup(id) => self.reconciler.delete_port_group(id).await,
                RecordedId::Switch(id) => self.reconciler.destroy_switch(id).await,
            };
            match ignore_gone(&raw, result) {
                Ok(()) => {
                    state.forget(&raw);
                    summary.deleted.push(raw);
                }
                Err(e) => summary.fail(raw, &e),
            }
        }
        summary
    }

    /// Read every recorded object and forget the ones that are gone
    pub async fn refresh(&self, state: &mut StateFile) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut recorded = Self::recorded(state, &mut summary);
        recorded.reverse();

        for (raw, id) in recorded {
            if self.cancelled() {
                break;
            }
            let exists = match &id {
                RecordedId::Switch(id) => check_existing(&raw, self.reconciler.read_switch(id)).await.map(|r| r.is_some()),
                RecordedId::PortGroup(id) => check_existing(&raw, self.reconciler.read_port_group(id)).await.map(|r| r.is_some()),
                RecordedId::HostBinding(id) => check_existing(&raw, self.reconciler.read_host_binding(id)).await.map(|r| r.is_some()),
                RecordedId::VmNicBinding(id) => check_existing(&raw, self.reconciler.read_vm_nic_binding(id, self.declared_nic_label(id))).await.map(|r| r.is_some()),
            };
            match exists {
                Ok(true) => summary.unchanged.push(raw),
                Ok(false) => {
                    state.forget(&raw);
                    summary.forgotten.push(raw);
                }
                Err(e) => summary.fail(raw, &e),
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::nic::neutral_backing;
    use dvs_resources::{HostBindingSpec, PortGroupDeclaration, VmNicBindingSpec};
    use vsphere_client::{EthernetBacking, ManagedObjectReference, MockVSphereClient};

    fn declarations() -> Declarations {
        Declarations {
            switches: vec![create_test_switch_spec()],
            port_groups: vec![PortGroupDeclaration {
                switch: "dvs1".to_string(),
                spec: create_test_port_group_spec("pg1"),
            }],
            host_bindings: vec![HostBindingDeclaration {
                switch: "dvs1".to_string(),
                spec: HostBindingSpec {
                    host: "esxi1".to_string(),
                    nic_names: ["vmnic1".to_string()].into(),
                },
            }],
            vm_nic_bindings: vec![VmNicBindingDeclaration {
                switch: "dvs1".to_string(),
                port_group: "pg1".to_string(),
                spec: VmNicBindingSpec {
                    vm: "web/vm1".to_string(),
                    nic_label: "Network adapter 2".to_string(),
                },
            }],
        }
    }

    fn controller(declarations: Declarations) -> (MockVSphereClient, Controller) {
        let mock = create_test_inventory();
        mock.add_host("dc1", "esxi1");
        create_test_vm(&mock, "web/vm1", None);
        let reconciler = create_test_reconciler(&mock);
        (mock, Controller::new(reconciler, declarations))
    }

    #[tokio::test]
    async fn test_apply_creates_in_dependency_order() {
        let (_mock, controller) = controller(declarations());
        let mut state = StateFile::default();

        let summary = controller.apply(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(
            summary.created,
            vec![
                "dvs|dc1|/net/dvs1",
                "dvpg|dc1|/net/dvs1|pg1",
                "maphostdvs|dc1|/net/dvs1|esxi1",
                "mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1",
            ]
        );
        assert_eq!(state.len(), 4);
    }

    #[tokio::test]
    async fn test_second_apply_is_a_no_op() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;
        let submitted = mock.submissions().len();

        let summary = controller.apply(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert!(summary.created.is_empty());
        assert_eq!(summary.unchanged.len(), 4);
        assert_eq!(mock.submissions().len(), submitted);
    }

    #[tokio::test]
    async fn test_apply_recreates_gone_port_group() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;

        let dc = controller.reconciler().resolve_datacenter("dc1").await.unwrap();
        let pg_id: PortGroupId = "dvpg|dc1|/net/dvs1|pg1".parse().unwrap();
        let pg = controller.reconciler().resolve_port_group(&dc, &pg_id).await.unwrap();
        mock.remove_object(&pg);

        let summary = controller.apply(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert!(summary.recreated.contains(&"dvpg|dc1|/net/dvs1|pg1".to_string()));
        // the binding pointed at the old port group and is rebound to the new one
        assert!(summary.recreated.contains(&"mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1".to_string()));
    }

    #[tokio::test]
    async fn test_port_group_drift_reports_unimplemented_update() {
        let (_mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;

        let mut changed = declarations();
        changed.port_groups[0].spec.num_ports = 32;
        let controller = Controller::new(controller.reconciler, changed);

        let summary = controller.apply(&mut state).await;
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].object.starts_with("port group"));
        assert!(summary.failures[0].error.contains("Not implemented"));
        assert_eq!(summary.unchanged.len(), 3);
    }

    #[tokio::test]
    async fn test_nic_label_drift_moves_the_binding() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;

        let mut changed = declarations();
        changed.vm_nic_bindings[0].spec.nic_label = "ethernet-0".to_string();
        let controller = Controller::new(controller.reconciler, changed);

        let summary = controller.apply(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(summary.recreated, vec!["mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1"]);

        let id: VmNicBindingId = "mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1".parse().unwrap();
        let loaded = controller.reconciler().read_vm_nic_binding(&id, None).await.unwrap();
        assert_eq!(loaded.device_name.as_deref(), Some("ethernet-0"));
        let reconfigures = mock
            .submissions()
            .iter()
            .filter(|s| s.starts_with("ReconfigVM_Task:"))
            .count();
        assert_eq!(reconfigures, 3);
    }

    #[tokio::test]
    async fn test_host_nic_drift_rebinds() {
        let (_mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;

        let mut changed = declarations();
        changed.host_bindings[0].spec.nic_names.insert("vmnic2".to_string());
        let controller = Controller::new(controller.reconciler, changed);

        let summary = controller.apply(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(summary.recreated, vec!["maphostdvs|dc1|/net/dvs1|esxi1"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_run() {
        let mut decl = declarations();
        decl.host_bindings[0].spec.host = "esxi9".to_string();
        let (_mock, controller) = controller(decl);
        let mut state = StateFile::default();

        let summary = controller.apply(&mut state).await;
        assert!(!summary.is_success());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.created.len(), 3);
        assert!(!state.contains("maphostdvs|dc1|/net/dvs1|esxi9"));
    }

    #[tokio::test]
    async fn test_destroy_removes_children_first() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;

        let summary = controller.destroy(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(
            summary.deleted,
            vec![
                "mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1",
                "maphostdvs|dc1|/net/dvs1|esxi1",
                "dvpg|dc1|/net/dvs1|pg1",
                "dvs|dc1|/net/dvs1",
            ]
        );
        assert!(state.is_empty());
        assert!(mock.submissions().iter().any(|s| s.starts_with("Destroy_Task:dvs-")));
    }

    /// Attach "Network adapter 1" of web/vm1 to whatever "Network adapter 2" is bound to
    async fn attach_first_adapter_alongside(mock: &MockVSphereClient, controller: &Controller) -> ManagedObjectReference {
        let dc = controller.reconciler().resolve_datacenter("dc1").await.unwrap();
        let vm = controller.reconciler().resolve_vm(&dc, "web/vm1").await.unwrap();
        mock.update_vm_devices(&vm, |devices| {
            let bound = devices.iter().find(|d| d.key == 4001).and_then(|d| d.backing.clone());
            if let Some(first) = devices.iter_mut().find(|d| d.key == 4000) {
                first.backing = bound;
            }
        });
        vm
    }

    fn backing_of(mock: &MockVSphereClient, vm: &ManagedObjectReference, key: i32) -> Option<EthernetBacking> {
        mock.vm_devices(vm)
            .into_iter()
            .find(|d| d.key == key)
            .and_then(|d| d.ethernet_backing().unwrap())
    }

    #[tokio::test]
    async fn test_reapply_leaves_other_adapters_on_the_port_group_alone() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;
        let vm = attach_first_adapter_alongside(&mock, &controller).await;
        let submitted = mock.submissions().len();

        let summary = controller.apply(&mut state).await;
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert!(summary.recreated.is_empty());
        assert!(summary.unchanged.contains(&"mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1".to_string()));
        assert_eq!(mock.submissions().len(), submitted);
        assert!(matches!(backing_of(&mock, &vm, 4000), Some(EthernetBacking::DistributedPort { .. })));
        assert!(matches!(backing_of(&mock, &vm, 4001), Some(EthernetBacking::DistributedPort { .. })));
    }

    #[tokio::test]
    async fn test_destroy_detaches_only_the_declared_adapter() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;
        let vm = attach_first_adapter_alongside(&mock, &controller).await;

        let summary = controller.destroy(&mut state).await;
        assert!(summary.deleted.contains(&"mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1".to_string()));
        assert_eq!(backing_of(&mock, &vm, 4001), Some(neutral_backing()));
        assert!(matches!(backing_of(&mock, &vm, 4000), Some(EthernetBacking::DistributedPort { .. })));

        // the port group is still in use by the other adapter
        assert!(state.contains("dvpg|dc1|/net/dvs1|pg1"));
        assert!(summary.failures.iter().any(|f| f.object == "dvpg|dc1|/net/dvs1|pg1"));
    }

    #[tokio::test]
    async fn test_destroy_keeps_host_binding_when_lookup_fails() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;
        mock.fail_next("find_host", "connection reset by peer");

        let summary = controller.destroy(&mut state).await;
        assert!(state.contains("maphostdvs|dc1|/net/dvs1|esxi1"));
        assert!(!summary.deleted.contains(&"maphostdvs|dc1|/net/dvs1|esxi1".to_string()));
        assert!(
            summary
                .failures
                .iter()
                .any(|f| f.object == "maphostdvs|dc1|/net/dvs1|esxi1" && f.error.starts_with("Transport error"))
        );
    }

    #[tokio::test]
    async fn test_refresh_forgets_gone_objects() {
        let (mock, controller) = controller(declarations());
        let mut state = StateFile::default();
        controller.apply(&mut state).await;
        state.record("dvs|dc1|/net/dvs-old");
        state.record("bogus|id");

        let summary = controller.refresh(&mut state).await;
        assert_eq!(summary.forgotten, vec!["dvs|dc1|/net/dvs-old"]);
        assert_eq!(summary.unchanged.len(), 4);
        assert_eq!(summary.failures.len(), 1);
        assert!(!state.contains("dvs|dc1|/net/dvs-old"));
        assert!(state.contains("bogus|id"));
        assert!(mock.submissions().iter().all(|s| !s.starts_with("Destroy_Task")));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_early() {
        let (_mock, controller) = controller(declarations());
        controller.reconciler().cancellation().cancel();
        let mut state = StateFile::default();

        let summary = controller.apply(&mut state).await;
        assert!(summary.created.is_empty());
        assert!(summary.is_success());
        assert!(state.is_empty());
    }
}
