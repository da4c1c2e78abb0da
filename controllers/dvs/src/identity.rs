//! Durable identifiers
//!
//! Every managed object is named by a single string built from its natural
//! key: the datacenter, then the ancestors outward-in, then the object itself.
//!
//! | kind           | template                                  |
//! |----------------|-------------------------------------------|
//! | switch         | `dvs\|<dc>\|<switch path>`                 |
//! | port group     | `dvpg\|<dc>\|<switch path>\|<name>`         |
//! | host binding   | `maphostdvs\|<dc>\|<switch path>\|<host>`   |
//! | VM NIC binding | `mapvmdvpg\|<dc>\|<switch path>\|<pg>\|<vm>` |
//!
//! Components never contain the delimiter, which is enforced when typed ids
//! are constructed. Decoding matches the whole string against an anchored
//! pattern, so a trailing or missing component is rejected rather than
//! absorbed into a neighbour.

use crate::error::DvsError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Separates components of an identifier
pub const DELIMITER: char = '|';

static SWITCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^dvs\|([^|]+)\|([^|]+)$").expect("switch id pattern"));
static PORT_GROUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^dvpg\|([^|]+)\|([^|]+)\|([^|/]+)$").expect("port group id pattern"));
static HOST_BINDING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^maphostdvs\|([^|]+)\|([^|]+)\|([^|]+)$").expect("host binding id pattern"));
static VM_NIC_BINDING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^mapvmdvpg\|([^|]+)\|([^|]+)\|([^|/]+)\|([^|]+)$").expect("vm nic binding id pattern")
});

/// Kinds of managed objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Switch,
    PortGroup,
    HostBinding,
    VmNicBinding,
}

impl ResourceKind {
    /// Dependency order: parents before children
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Switch,
        ResourceKind::PortGroup,
        ResourceKind::HostBinding,
        ResourceKind::VmNicBinding,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            ResourceKind::Switch => "dvs",
            ResourceKind::PortGroup => "dvpg",
            ResourceKind::HostBinding => "maphostdvs",
            ResourceKind::VmNicBinding => "mapvmdvpg",
        }
    }

    /// Number of components in the natural key
    pub fn arity(self) -> usize {
        match self {
            ResourceKind::Switch => 2,
            ResourceKind::PortGroup | ResourceKind::HostBinding => 3,
            ResourceKind::VmNicBinding => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Switch => "switch",
            ResourceKind::PortGroup => "port group",
            ResourceKind::HostBinding => "host binding",
            ResourceKind::VmNicBinding => "vm nic binding",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            ResourceKind::Switch => &SWITCH_PATTERN,
            ResourceKind::PortGroup => &PORT_GROUP_PATTERN,
            ResourceKind::HostBinding => &HOST_BINDING_PATTERN,
            ResourceKind::VmNicBinding => &VM_NIC_BINDING_PATTERN,
        }
    }

    /// Kind named by an identifier's prefix, without validating the rest
    pub fn of_identifier(id: &str) -> Option<ResourceKind> {
        let prefix = id.split(DELIMITER).next()?;
        ResourceKind::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode a natural key. Components must already be validated.
pub fn encode(kind: ResourceKind, components: &[&str]) -> String {
    debug_assert_eq!(components.len(), kind.arity());
    let mut id = kind.prefix().to_string();
    for component in components {
        id.push(DELIMITER);
        id.push_str(component);
    }
    id
}

/// Decode an identifier into its natural key
pub fn decode(kind: ResourceKind, id: &str) -> Result<Vec<String>, DvsError> {
    let captures = kind
        .pattern()
        .captures(id)
        .ok_or_else(|| DvsError::MalformedIdentifier {
            kind: kind.name(),
            id: id.to_string(),
        })?;
    Ok(captures
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Reject component values that cannot be encoded
pub fn validate_component(field: &str, value: &str) -> Result<(), DvsError> {
    if value.is_empty() {
        return Err(DvsError::InvalidConfig(format!("{} must not be empty", field)));
    }
    if value.contains(DELIMITER) {
        return Err(DvsError::InvalidConfig(format!(
            "{} '{}' must not contain '{}'",
            field, value, DELIMITER
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(DvsError::InvalidConfig(format!(
            "{} '{}' contains control characters",
            field,
            value.escape_default()
        )));
    }
    Ok(())
}

/// Normalise a folder path: "" for the root, otherwise "/a/b" without a trailing slash
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Join a folder and a name into an absolute path
pub fn join_path(folder: &str, name: &str) -> String {
    format!("{}/{}", normalize_folder(folder), name)
}

/// Split an absolute path into its folder and last segment
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Identity of a distributed switch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwitchId {
    pub datacenter: String,
    /// Absolute path below the network folder, e.g. "/net/dvs1"
    pub path: String,
}

impl SwitchId {
    pub fn new(datacenter: &str, folder: &str, name: &str) -> Result<Self, DvsError> {
        validate_component("datacenter", datacenter)?;
        validate_component("switch name", name)?;
        if name.contains('/') {
            return Err(DvsError::InvalidConfig(format!("switch name '{}' must not contain '/'", name)));
        }
        let path = join_path(folder, name);
        validate_component("switch path", &path)?;
        Ok(Self {
            datacenter: datacenter.to_string(),
            path,
        })
    }

    pub fn name(&self) -> &str {
        split_path(&self.path).1
    }

    pub fn folder(&self) -> &str {
        split_path(&self.path).0
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(ResourceKind::Switch, &[&self.datacenter, &self.path]))
    }
}

impl FromStr for SwitchId {
    type Err = DvsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut c = decode(ResourceKind::Switch, s)?.into_iter();
        match (c.next(), c.next()) {
            (Some(datacenter), Some(path)) => Ok(Self { datacenter, path }),
            _ => Err(DvsError::MalformedIdentifier {
                kind: ResourceKind::Switch.name(),
                id: s.to_string(),
            }),
        }
    }
}

/// Identity of a distributed port group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortGroupId {
    pub switch: SwitchId,
    pub name: String,
}

impl PortGroupId {
    pub fn new(switch: SwitchId, name: &str) -> Result<Self, DvsError> {
        validate_component("port group name", name)?;
        if name.contains('/') {
            return Err(DvsError::InvalidConfig(format!("port group name '{}' must not contain '/'", name)));
        }
        Ok(Self {
            switch,
            name: name.to_string(),
        })
    }

    /// Inventory path of the port group: the switch path followed by its name
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.switch.path, self.name)
    }
}

impl fmt::Display for PortGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(
            ResourceKind::PortGroup,
            &[&self.switch.datacenter, &self.switch.path, &self.name],
        ))
    }
}

impl FromStr for PortGroupId {
    type Err = DvsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut c = decode(ResourceKind::PortGroup, s)?.into_iter();
        match (c.next(), c.next(), c.next()) {
            (Some(datacenter), Some(path), Some(name)) => Ok(Self {
                switch: SwitchId { datacenter, path },
                name,
            }),
            _ => Err(DvsError::MalformedIdentifier {
                kind: ResourceKind::PortGroup.name(),
                id: s.to_string(),
            }),
        }
    }
}

/// Identity of a host's membership in a switch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostBindingId {
    pub switch: SwitchId,
    /// Host path below the datacenter's host folder
    pub host: String,
}

impl HostBindingId {
    pub fn new(switch: SwitchId, host: &str) -> Result<Self, DvsError> {
        validate_component("host", host)?;
        Ok(Self {
            switch,
            host: host.to_string(),
        })
    }
}

impl fmt::Display for HostBindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(
            ResourceKind::HostBinding,
            &[&self.switch.datacenter, &self.switch.path, &self.host],
        ))
    }
}

impl FromStr for HostBindingId {
    type Err = DvsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut c = decode(ResourceKind::HostBinding, s)?.into_iter();
        match (c.next(), c.next(), c.next()) {
            (Some(datacenter), Some(path), Some(host)) => Ok(Self {
                switch: SwitchId { datacenter, path },
                host,
            }),
            _ => Err(DvsError::MalformedIdentifier {
                kind: ResourceKind::HostBinding.name(),
                id: s.to_string(),
            }),
        }
    }
}

/// Identity of a VM NIC attached to a port group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VmNicBindingId {
    pub port_group: PortGroupId,
    /// VM path below the datacenter's vm folder
    pub vm: String,
}

impl VmNicBindingId {
    pub fn new(port_group: PortGroupId, vm: &str) -> Result<Self, DvsError> {
        validate_component("vm", vm)?;
        Ok(Self {
            port_group,
            vm: vm.to_string(),
        })
    }
}

impl fmt::Display for VmNicBindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let switch = &self.port_group.switch;
        f.write_str(&encode(
            ResourceKind::VmNicBinding,
            &[&switch.datacenter, &switch.path, &self.port_group.name, &self.vm],
        ))
    }
}

impl FromStr for VmNicBindingId {
    type Err = DvsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut c = decode(ResourceKind::VmNicBinding, s)?.into_iter();
        match (c.next(), c.next(), c.next(), c.next()) {
            (Some(datacenter), Some(path), Some(name), Some(vm)) => Ok(Self {
                port_group: PortGroupId {
                    switch: SwitchId { datacenter, path },
                    name,
                },
                vm,
            }),
            _ => Err(DvsError::MalformedIdentifier {
                kind: ResourceKind::VmNicBinding.name(),
                id: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dvs1() -> SwitchId {
        SwitchId::new("dc1", "/net", "dvs1").unwrap()
    }

    #[test]
    fn test_switch_id_encodes_folder_and_name() {
        let id = dvs1();
        assert_eq!(id.path, "/net/dvs1");
        assert_eq!(id.to_string(), "dvs|dc1|/net/dvs1");

        let decoded: SwitchId = "dvs|dc1|/net/dvs1".parse().unwrap();
        assert_eq!(decoded, id);
        assert_eq!(decoded.name(), "dvs1");
        assert_eq!(decoded.folder(), "/net");
    }

    #[test]
    fn test_switch_in_root_folder() {
        let id = SwitchId::new("dc1", "", "dvs1").unwrap();
        assert_eq!(id.path, "/dvs1");
        assert_eq!(id.folder(), "");
    }

    #[test]
    fn test_all_kinds_decode_what_they_encode() {
        let pg = PortGroupId::new(dvs1(), "pg 1").unwrap();
        assert_eq!(pg.to_string().parse::<PortGroupId>().unwrap(), pg);
        assert_eq!(pg.full_path(), "/net/dvs1/pg 1");

        let host = HostBindingId::new(dvs1(), "cluster1/esxi1.example.invalid").unwrap();
        assert_eq!(host.to_string().parse::<HostBindingId>().unwrap(), host);

        let nic = VmNicBindingId::new(pg.clone(), "web/vm-01").unwrap();
        assert_eq!(nic.to_string(), "mapvmdvpg|dc1|/net/dvs1|pg 1|web/vm-01");
        assert_eq!(nic.to_string().parse::<VmNicBindingId>().unwrap(), nic);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = "not-a-valid-id".parse::<PortGroupId>().unwrap_err();
        assert!(matches!(err, DvsError::MalformedIdentifier { kind: "port group", .. }));
    }

    #[test]
    fn test_decode_rejects_trailing_component() {
        assert!(decode(ResourceKind::Switch, "dvs|dc1|/dvs1|extra").is_err());
        assert!(decode(ResourceKind::PortGroup, "dvpg|dc1|/dvs1|pg1|").is_err());
    }

    #[test]
    fn test_decode_rejects_missing_and_empty_components() {
        assert!(decode(ResourceKind::PortGroup, "dvpg|dc1|/dvs1").is_err());
        assert!(decode(ResourceKind::PortGroup, "dvpg|dc1||pg1").is_err());
        assert!(decode(ResourceKind::Switch, "dvs|dc1|").is_err());
    }

    #[test]
    fn test_decode_rejects_other_kind() {
        let switch = dvs1().to_string();
        assert!(decode(ResourceKind::PortGroup, &switch).is_err());
        assert!(decode(ResourceKind::HostBinding, "dvpg|dc1|/dvs1|esxi1").is_err());
    }

    #[test]
    fn test_delimiter_rejected_at_construction() {
        assert!(matches!(
            SwitchId::new("dc|1", "", "dvs1"),
            Err(DvsError::InvalidConfig(_))
        ));
        assert!(PortGroupId::new(dvs1(), "pg|1").is_err());
        assert!(PortGroupId::new(dvs1(), "").is_err());
        assert!(VmNicBindingId::new(PortGroupId::new(dvs1(), "pg1").unwrap(), "vm\n1").is_err());
    }

    #[test]
    fn test_port_group_name_is_a_single_path_segment() {
        assert!(matches!(
            PortGroupId::new(dvs1(), "pg1/extra"),
            Err(DvsError::InvalidConfig(msg)) if msg.contains("'/'")
        ));
        assert!(matches!(
            "dvpg|dc1|/net/dvs1|pg1/extra".parse::<PortGroupId>(),
            Err(DvsError::MalformedIdentifier { .. })
        ));
        assert!(matches!(
            "mapvmdvpg|dc1|/net/dvs1|pg1/extra|web/vm1".parse::<VmNicBindingId>(),
            Err(DvsError::MalformedIdentifier { .. })
        ));
        let id: VmNicBindingId = "mapvmdvpg|dc1|/net/dvs1|pg1|web/vm1".parse().unwrap();
        assert_eq!(id.vm, "web/vm1");
    }

    #[test]
    fn test_of_identifier() {
        assert_eq!(ResourceKind::of_identifier("dvs|dc1|/dvs1"), Some(ResourceKind::Switch));
        assert_eq!(ResourceKind::of_identifier("mapvmdvpg|a|b|c|d"), Some(ResourceKind::VmNicBinding));
        assert_eq!(ResourceKind::of_identifier("DVS:[dc1] /dvs1"), None);
    }

    #[test]
    fn test_paths() {
        assert_eq!(normalize_folder("net/"), "/net");
        assert_eq!(normalize_folder("/"), "");
        assert_eq!(join_path("", "dvs1"), "/dvs1");
        assert_eq!(split_path("/a/b/dvs1"), ("/a/b", "dvs1"));
    }
}
