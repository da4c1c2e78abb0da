//! Helper functions for common reconciliation patterns
//!
//! This module provides reusable functions shared by the per-kind reconcilers.

use crate::error::DvsError;
use std::future::Future;
use tracing::{debug, error, warn};

/// Reads nullable remote booleans, collecting every absent field.
///
/// Remote policy flags are optional on the wire. An absent flag is never
/// defaulted: each one is recorded and [`FlagReader::finish`] reports them
/// all at once as `MissingPolicyField`.
#[derive(Debug)]
pub struct FlagReader {
    object: String,
    missing: Vec<&'static str>,
}

impl FlagReader {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            missing: Vec::new(),
        }
    }

    /// Value of `field`, or `false` (recorded as missing) when absent
    pub fn read(&mut self, field: &'static str, value: Option<bool>) -> bool {
        match value {
            Some(value) => value,
            None => {
                self.missing.push(field);
                false
            }
        }
    }

    /// Record every field as missing, for an absent policy structure
    pub fn all_missing(&mut self, fields: &[&'static str]) {
        self.missing.extend_from_slice(fields);
    }

    pub fn finish(self) -> Result<(), DvsError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(DvsError::MissingPolicyField {
                object: self.object,
                fields: self.missing,
            })
        }
    }
}

/// Simple drift detection
///
/// Returns:
/// - `Ok(Some(resource))` if the resource exists
/// - `Ok(None)` if the resource is gone (drift detected)
/// - `Err(e)` for any other error, which must not be taken as deletion
pub async fn check_existing<F, T>(resource_name: &str, read: F) -> Result<Option<T>, DvsError>
where
    F: Future<Output = Result<T, DvsError>>,
{
    match read.await {
        Ok(existing) => {
            debug!("{} exists", resource_name);
            Ok(Some(existing))
        }
        Err(e) if e.is_gone() => {
            warn!("{} no longer exists (drift detected): {}", resource_name, e);
            Ok(None)
        }
        Err(e) => {
            error!("Failed to verify {} exists: {}", resource_name, e);
            Err(e)
        }
    }
}

/// Treat an already-absent object as successfully removed
pub fn ignore_gone(resource_name: &str, result: Result<(), DvsError>) -> Result<(), DvsError> {
    match result {
        Err(e) if e.is_gone() => {
            warn!("{} was already gone: {}", resource_name, e);
            Ok(())
        }
        other => other,
    }
}
