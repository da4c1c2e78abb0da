//! Command line and environment configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Reconcile distributed switches, port groups and their bindings against vSphere
#[derive(Parser, Debug, Clone)]
#[command(name = "dvs-controller", version, about)]
pub struct Cli {
    /// vCenter base URL, e.g. https://vcenter.example.com
    #[arg(long, env = "VSPHERE_URL")]
    pub url: String,

    #[arg(long, env = "VSPHERE_USER")]
    pub user: String,

    #[arg(long, env = "VSPHERE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// VI/JSON API release
    #[arg(long, env = "VSPHERE_API_RELEASE", default_value = "8.0.2.0")]
    pub api_release: String,

    /// Accept self-signed certificates
    #[arg(long, env = "VSPHERE_INSECURE")]
    pub insecure: bool,

    /// YAML file listing the declared objects
    #[arg(long, env = "DVS_DECLARATIONS", default_value = "dvs.yaml")]
    pub declarations: PathBuf,

    /// JSON file recording the identifiers of created objects
    #[arg(long, env = "DVS_STATE", default_value = "dvs-state.json")]
    pub state: PathBuf,

    /// Give up waiting for a vSphere task after this many seconds
    #[arg(long, env = "DVS_TASK_TIMEOUT_SECS")]
    pub task_timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create or verify every declared object
    Apply,
    /// Delete every object recorded in the state file
    Destroy,
    /// Drop recorded objects that no longer exist
    Refresh,
}

impl Cli {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}
