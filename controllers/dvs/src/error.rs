//! Controller-specific error types.
//!
//! Every reconciler operation returns exactly one of these kinds. Remote
//! errors are kept as the source of the kind they map onto.

use thiserror::Error;
use vsphere_client::VSphereError;

/// Errors that can occur while reconciling DVS objects.
#[derive(Debug, Error)]
pub enum DvsError {
    /// Object or one of its ancestors does not exist remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resolved object is not of the expected kind
    #[error("Type mismatch: '{path}' is a {actual}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: String,
    },

    /// Identifier does not match the template of its kind
    #[error("Malformed {kind} identifier: '{id}'")]
    MalformedIdentifier { kind: &'static str, id: String },

    /// Nullable remote fields were absent where a value is required
    #[error("Missing policy field(s) on {object}: {}", .fields.join(", "))]
    MissingPolicyField {
        object: String,
        fields: Vec<&'static str>,
    },

    /// Virtual machine path did not resolve
    #[error("Virtual machine not found: {0}")]
    VmNotFound(String),

    /// No virtual NIC carries the requested label
    #[error("Device not found: no network adapter labelled '{label}' on {vm}")]
    DeviceNotFound { vm: String, label: String },

    /// No NIC of the VM is backed by the port group, or the host is not a member
    #[error("Binding not found: {0}")]
    BindingNotFound(String),

    /// Remote task ended in error or was cancelled
    #[error("{context}: {cause}")]
    TaskFailed {
        context: String,
        cause: String,
        cancelled: bool,
    },

    /// Session or connectivity failure (including await timeouts)
    #[error("Transport error: {0}")]
    Transport(#[source] VSphereError),

    /// Operation is not supported
    #[error("Not implemented: {0}")]
    Unimplemented(String),

    /// Switch destroy refused because objects still depend on it
    #[error("{object} still has dependent objects: {}", .dependents.join(", "))]
    DependentObjects {
        object: String,
        dependents: Vec<String>,
    },

    /// Invalid configuration (rejected before any remote call)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The cancellation signal was observed
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl DvsError {
    /// Whether the error says the object no longer exists
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            DvsError::NotFound(_) | DvsError::VmNotFound(_) | DvsError::BindingNotFound(_)
        )
    }
}

impl From<VSphereError> for DvsError {
    fn from(err: VSphereError) -> Self {
        match err {
            VSphereError::NotFound(what) => DvsError::NotFound(what),
            other => DvsError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_not_found_maps_to_not_found() {
        let err: DvsError = VSphereError::NotFound("inventory path 'dc1/network/x'".to_string()).into();
        assert!(matches!(err, DvsError::NotFound(_)));
        assert!(err.is_gone());
    }

    #[test]
    fn test_other_remote_errors_map_to_transport() {
        let err: DvsError = VSphereError::Connection("reset".to_string()).into();
        assert!(matches!(err, DvsError::Transport(VSphereError::Connection(_))));
        assert!(!err.is_gone());
    }

    #[test]
    fn test_missing_policy_field_lists_fields() {
        let err = DvsError::MissingPolicyField {
            object: "port group pg1".to_string(),
            fields: vec!["blockOverrideAllowed", "shapingOverrideAllowed"],
        };
        assert_eq!(
            err.to_string(),
            "Missing policy field(s) on port group pg1: blockOverrideAllowed, shapingOverrideAllowed"
        );
    }
}
