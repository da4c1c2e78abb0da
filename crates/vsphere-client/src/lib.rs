//! vSphere API Client
//!
//! A Rust client library for the parts of the vSphere Web Services API needed
//! to manage distributed virtual switches, distributed port groups, host
//! membership and virtual NIC backings. Speaks the VI/JSON protocol.
//!
//! # Example
//!
//! ```no_run
//! use vsphere_client::{VSphereClient, VSphereClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VSphereClient::login(
//!     "https://vcenter.example.com".to_string(),
//!     "administrator@vsphere.local",
//!     "secret",
//!     "8.0.2.0".to_string(),
//!     false,
//! )
//! .await?;
//!
//! let dc = client.find_datacenter(Some("dc1")).await?;
//! let dvs = client.find_network(&dc, "/dvs1").await?;
//! let info = client.retrieve_properties(&dvs, &["uuid"]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Inventory lookups**: datacenters, network entities, hosts, VMs by path
//! - **Tasks**: every mutation returns a task reference; poll it with `task_info`
//! - **Mocking**: `MockVSphereClient` behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod vsphere_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::VSphereClient;
pub use common::{HttpClient, fetch_properties};
pub use error::VSphereError;
pub use models::*;
pub use vsphere_trait::VSphereClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockVSphereClient, TaskScript};
