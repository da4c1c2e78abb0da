//! State file
//!
//! Durable identifiers of the objects this tool created, persisted as JSON
//! between runs. The identifier is the only thing stored; everything else is
//! read back from vSphere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Bookkeeping kept next to an identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub recorded_at: DateTime<Utc>,
}

/// Identifiers of created objects, keyed by their encoded form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    objects: BTreeMap<String, ObjectRecord>,
}

impl StateFile {
    /// Load a state file; a file that does not exist yet is an empty state
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the state next to `path` and rename it into place
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StateError> {
        let path = path.as_ref();
        let write_err = |source| StateError::Write {
            path: path.to_path_buf(),
            source,
        };
        let content = serde_json::to_string_pretty(self).map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, content).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)?;
        debug!("Saved {} identifier(s) to {}", self.objects.len(), path.display());
        Ok(())
    }

    pub fn record(&mut self, id: impl ToString) {
        self.objects.insert(
            id.to_string(),
            ObjectRecord {
                recorded_at: Utc::now(),
            },
        );
    }

    /// Forget an identifier; returns whether it was recorded
    pub fn forget(&mut self, id: impl ToString) -> bool {
        self.objects.remove(&id.to_string()).is_some()
    }

    pub fn contains(&self, id: impl ToString) -> bool {
        self.objects.contains_key(&id.to_string())
    }

    pub fn record_of(&self, id: impl ToString) -> Option<&ObjectRecord> {
        self.objects.get(&id.to_string())
    }

    /// Recorded identifiers in their encoded form
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
