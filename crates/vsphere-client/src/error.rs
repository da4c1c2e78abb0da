//! vSphere client errors

use thiserror::Error;

/// Errors that can occur when talking to the vSphere API
#[derive(Debug, Error)]
pub enum VSphereError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// vSphere API returned an unexpected response
    #[error("vSphere API error: {0}")]
    Api(String),

    /// vSphere API returned a method fault
    #[error("vSphere fault {fault_type}: {message}")]
    Fault { fault_type: String, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Login failed or the session expired
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Inventory path or managed object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., an object of the wrong type)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection dropped while talking to the endpoint
    #[error("Connection error: {0}")]
    Connection(String),

    /// A caller-imposed deadline expired
    #[error("Timed out: {0}")]
    Timeout(String),
}
