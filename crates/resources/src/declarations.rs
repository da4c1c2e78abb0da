//! Declaration file
//!
//! A YAML document listing the switches, port groups and bindings that should
//! exist. Port groups and bindings refer to their switch (and port group) by
//! name; references are checked when the file is loaded.
//!
//! ```yaml
//! switches:
//!   - name: dvs1
//!     datacenter: dc1
//!     folder: /net
//! portGroups:
//!   - switch: dvs1
//!     name: pg1
//!     numPorts: 16
//! hostBindings:
//!   - switch: dvs1
//!     host: cluster1/esxi1
//!     nicNames: [vmnic1]
//! vmNicBindings:
//!   - switch: dvs1
//!     portGroup: pg1
//!     vm: web/vm1
//!     nicLabel: Network adapter 1
//! ```

use crate::binding::{HostBindingSpec, VmNicBindingSpec};
use crate::port_group::PortGroupSpec;
use crate::switch::SwitchSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a declaration file
#[derive(Debug, Error)]
pub enum DeclarationError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema
    #[error("failed to parse declarations: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two declarations share the same natural key
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    /// A declaration names a switch or port group that is not declared
    #[error("{kind} '{name}' references unknown {target} '{reference}'")]
    UnknownReference {
        kind: &'static str,
        name: String,
        target: &'static str,
        reference: String,
    },

    /// A required field is empty
    #[error("{kind} has an empty {field}")]
    Empty { kind: &'static str, field: &'static str },
}

/// A port group and the switch it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortGroupDeclaration {
    /// Name of the owning switch
    pub switch: String,
    #[serde(flatten)]
    pub spec: PortGroupSpec,
}

/// A host binding and the switch it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostBindingDeclaration {
    /// Name of the switch
    pub switch: String,
    #[serde(flatten)]
    pub spec: HostBindingSpec,
}

/// A VM NIC binding and the port group it targets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmNicBindingDeclaration {
    /// Name of the switch owning the port group
    pub switch: String,
    /// Name of the target port group
    pub port_group: String,
    #[serde(flatten)]
    pub spec: VmNicBindingSpec,
}

/// All declared objects
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Declarations {
    #[serde(default)]
    pub switches: Vec<SwitchSpec>,
    #[serde(default)]
    pub port_groups: Vec<PortGroupDeclaration>,
    #[serde(default)]
    pub host_bindings: Vec<HostBindingDeclaration>,
    #[serde(default)]
    pub vm_nic_bindings: Vec<VmNicBindingDeclaration>,
}

impl Declarations {
    /// Load and validate a declaration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DeclarationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DeclarationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded declarations from {}", path.display());
        Self::from_yaml(&content)
    }

    /// Parse and validate declarations from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, DeclarationError> {
        let declarations: Declarations = serde_yaml::from_str(content)?;
        declarations.validate()?;
        Ok(declarations)
    }

    /// Find a declared switch by name
    pub fn switch(&self, name: &str) -> Option<&SwitchSpec> {
        self.switches.iter().find(|s| s.name == name)
    }

    /// Check names are present and unique and every reference resolves
    pub fn validate(&self) -> Result<(), DeclarationError> {
        let mut switches = HashSet::new();
        for switch in &self.switches {
            require("switch", "name", &switch.name)?;
            require("switch", "datacenter", &switch.datacenter)?;
            if !switches.insert(switch.name.as_str()) {
                return Err(DeclarationError::Duplicate {
                    kind: "switch",
                    name: switch.name.clone(),
                });
            }
        }

        let mut port_groups = HashSet::new();
        for pg in &self.port_groups {
            require("port group", "name", &pg.spec.name)?;
            if !switches.contains(pg.switch.as_str()) {
                return Err(unknown("port group", &pg.spec.name, "switch", &pg.switch));
            }
            if !port_groups.insert((pg.switch.as_str(), pg.spec.name.as_str())) {
                return Err(DeclarationError::Duplicate {
                    kind: "port group",
                    name: format!("{}/{}", pg.switch, pg.spec.name),
                });
            }
        }

        let mut hosts = HashSet::new();
        for binding in &self.host_bindings {
            require("host binding", "host", &binding.spec.host)?;
            if !switches.contains(binding.switch.as_str()) {
                return Err(unknown("host binding", &binding.spec.host, "switch", &binding.switch));
            }
            if !hosts.insert((binding.switch.as_str(), binding.spec.host.as_str())) {
                return Err(DeclarationError::Duplicate {
                    kind: "host binding",
                    name: format!("{}/{}", binding.switch, binding.spec.host),
                });
            }
        }

        let mut nics = HashSet::new();
        for binding in &self.vm_nic_bindings {
            require("vm nic binding", "vm", &binding.spec.vm)?;
            require("vm nic binding", "nicLabel", &binding.spec.nic_label)?;
            if !port_groups.contains(&(binding.switch.as_str(), binding.port_group.as_str())) {
                return Err(unknown(
                    "vm nic binding",
                    &binding.spec.vm,
                    "port group",
                    &format!("{}/{}", binding.switch, binding.port_group),
                ));
            }
            // One binding per VM and port group
            let key = (binding.switch.as_str(), binding.port_group.as_str(), binding.spec.vm.as_str());
            if !nics.insert(key) {
                return Err(DeclarationError::Duplicate {
                    kind: "vm nic binding",
                    name: format!("{}/{}/{}", binding.switch, binding.port_group, binding.spec.vm),
                });
            }
        }

        Ok(())
    }
}

fn require(kind: &'static str, field: &'static str, value: &str) -> Result<(), DeclarationError> {
    if value.trim().is_empty() {
        return Err(DeclarationError::Empty { kind, field });
    }
    Ok(())
}

fn unknown(kind: &'static str, name: &str, target: &'static str, reference: &str) -> DeclarationError {
    DeclarationError::UnknownReference {
        kind,
        name: name.to_string(),
        target,
        reference: reference.to_string(),
    }
}
