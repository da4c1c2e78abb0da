//! Common utilities for the vSphere API client
//!
//! Provides the VI/JSON transport shared by the client and a few helpers
//! that work against any [`VSphereClientTrait`] implementation.

use crate::error::VSphereError;
use crate::models::{Datacenter, ManagedObjectReference};
use crate::vsphere_trait::VSphereClientTrait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Header carrying the session token on every authenticated request
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// HTTP client wrapper speaking the VI/JSON protocol
pub struct HttpClient {
    client: Client,
    base_url: String,
    release: String,
    session: Option<String>,
}

impl HttpClient {
    /// Create a new, unauthenticated HTTP client wrapper
    pub fn new(client: Client, base_url: String, release: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            release,
            session: None,
        }
    }

    /// Attach a session token
    pub fn with_session(mut self, session: String) -> Self {
        self.session = Some(session);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of a managed object method or property
    pub fn build_url(&self, obj: &ManagedObjectReference, member: &str) -> String {
        format!(
            "{}/sdk/vim25/{}/{}/{}/{}",
            self.base_url,
            self.release,
            obj.kind,
            urlencoding::encode(&obj.value),
            member
        )
    }

    /// Read a property of a managed object. `None` when the property is unset.
    pub async fn get_property<T: DeserializeOwned>(
        &self,
        obj: &ManagedObjectReference,
        property: &str,
    ) -> Result<Option<T>, VSphereError> {
        let url = self.build_url(obj, property);
        debug!("GET {}", url);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(session) = &self.session {
            request = request.header(SESSION_HEADER, session);
        }
        let response = request.send().await?;
        Self::decode_optional(response, &format!("{}.{}", obj, property)).await
    }

    /// Invoke a method on a managed object. `None` when the method returned nothing.
    pub async fn invoke<B: Serialize, T: DeserializeOwned>(
        &self,
        obj: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> Result<Option<T>, VSphereError> {
        let response = self.invoke_raw(obj, method, body).await?;
        Self::decode_optional(response, &format!("{}.{}", obj, method)).await
    }

    /// Invoke a method that must return a value
    pub async fn invoke_required<B: Serialize, T: DeserializeOwned>(
        &self,
        obj: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> Result<T, VSphereError> {
        self.invoke(obj, method, body).await?.ok_or_else(|| {
            VSphereError::Api(format!("{}.{} returned no value", obj, method))
        })
    }

    /// Invoke a method and hand back the raw response (used for login)
    pub async fn invoke_raw<B: Serialize>(
        &self,
        obj: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> Result<Response, VSphereError> {
        let url = self.build_url(obj, method);
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(session) = &self.session {
            request = request.header(SESSION_HEADER, session);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(fault_from_body(status, &body_text, &format!("{}.{}", obj, method)));
        }
        Ok(response)
    }

    async fn decode_optional<T: DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<Option<T>, VSphereError> {
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(fault_from_body(status, &body_text, what));
        }
        if status == StatusCode::NO_CONTENT || body_text.trim().is_empty() || body_text.trim() == "null" {
            return Ok(None);
        }

        serde_json::from_str(&body_text).map(Some).map_err(|e| {
            VSphereError::Api(format!(
                "error decoding response body for {}: {} - Response (first 500 chars): {}",
                what,
                e,
                body_text.chars().take(500).collect::<String>()
            ))
        })
    }
}

/// Turn a failed VI/JSON response into an error.
///
/// Faults arrive as a JSON object whose `_typeName` names the fault.
pub fn fault_from_body(status: StatusCode, body: &str, what: &str) -> VSphereError {
    let fault: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let fault_type = fault
        .as_ref()
        .and_then(|f| f.get("_typeName"))
        .and_then(|t| t.as_str())
        .map(str::to_string);
    let message = fault
        .as_ref()
        .and_then(|f| f.get("message").or_else(|| f.get("localizedMessage")))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} failed: {}", what, status));

    match (status, fault_type.as_deref()) {
        (_, Some("ManagedObjectNotFound")) | (StatusCode::NOT_FOUND, _) => {
            VSphereError::NotFound(format!("{}: {}", what, message))
        }
        (_, Some("NotAuthenticated" | "InvalidLogin")) | (StatusCode::UNAUTHORIZED, _) => {
            VSphereError::Authentication(message)
        }
        (_, Some(ty)) => VSphereError::Fault {
            fault_type: ty.to_string(),
            message,
        },
        _ => VSphereError::Api(format!("{} - {}", message, body)),
    }
}

/// Compose the inventory path of an entity below one of a datacenter's root folders.
///
/// `root` is "network", "host" or "vm". Paths already rooted at the datacenter
/// are returned as they are (without the leading '/').
pub fn inventory_path(datacenter: &Datacenter, root: &str, path: &str) -> String {
    let dc = datacenter.inventory_path.trim_matches('/');
    let path = path.trim_start_matches('/');
    let rooted = format!("{}/{}/", dc, root);
    if path.starts_with(&rooted) {
        path.to_string()
    } else if path.is_empty() {
        format!("{}/{}", dc, root)
    } else {
        format!("{}{}", rooted, path)
    }
}

/// Retrieve properties and decode them into a typed view
pub async fn fetch_properties<T: DeserializeOwned>(
    client: &dyn VSphereClientTrait,
    obj: &ManagedObjectReference,
    properties: &[&str],
) -> Result<T, VSphereError> {
    let value = client.retrieve_properties(obj, properties).await?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc() -> Datacenter {
        Datacenter {
            reference: ManagedObjectReference::new("Datacenter", "datacenter-3"),
            inventory_path: "/dc1".to_string(),
        }
    }

    #[test]
    fn test_inventory_path_relative() {
        assert_eq!(inventory_path(&dc(), "network", "dvs1"), "dc1/network/dvs1");
        assert_eq!(inventory_path(&dc(), "network", "/net/dvs1"), "dc1/network/net/dvs1");
        assert_eq!(inventory_path(&dc(), "host", ""), "dc1/host");
    }

    #[test]
    fn test_inventory_path_already_rooted() {
        assert_eq!(
            inventory_path(&dc(), "vm", "/dc1/vm/web/vm1"),
            "dc1/vm/web/vm1"
        );
    }

    #[test]
    fn test_fault_from_body_not_found() {
        let body = r#"{"_typeName":"ManagedObjectNotFound","obj":{"type":"Task","value":"task-1"}}"#;
        let err = fault_from_body(StatusCode::INTERNAL_SERVER_ERROR, body, "Task:task-1.info");
        assert!(matches!(err, VSphereError::NotFound(_)));
    }

    #[test]
    fn test_fault_from_body_typed_fault() {
        let body = r#"{"_typeName":"DuplicateName","message":"The name 'dvs1' already exists."}"#;
        match fault_from_body(StatusCode::INTERNAL_SERVER_ERROR, body, "x") {
            VSphereError::Fault { fault_type, message } => {
                assert_eq!(fault_type, "DuplicateName");
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fault_from_body_unparseable() {
        let err = fault_from_body(StatusCode::BAD_GATEWAY, "<html>", "x");
        assert!(matches!(err, VSphereError::Api(_)));
    }
}
