//! Incoming storage allocation requests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use strata_core::{Error, ProjectId, Protocol, Result};

/// A request to provision a storage allocation (or sub-allocation).
///
/// Hosts typically deserialize this from a form or API payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Project the allocation belongs to.
    pub project: ProjectId,

    /// Requested storage name. Sub-allocation names are scoped under the
    /// parent's name.
    pub name: String,

    /// Requested path. Relative paths are placed under the storage root
    /// (or the parent's `Active` directory); blank means "use the name".
    #[serde(default)]
    pub path: String,

    /// NFS export path; required when `nfs` is requested.
    #[serde(default)]
    pub export_path: Option<String>,

    /// Quota limit in bytes.
    pub quota_limit_bytes: u64,

    /// Protocol names (`nfs`, `smb`, `s3`).
    #[serde(default)]
    pub protocols: Vec<String>,

    /// Accounts for the read-write group.
    #[serde(default)]
    pub rw_users: Vec<String>,

    /// Accounts for the read-only group.
    #[serde(default)]
    pub ro_users: Vec<String>,

    /// Optional billing and contact fields.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl AllocationRequest {
    /// A request with no protocols, users, or attributes.
    pub fn new(project: ProjectId, name: impl Into<String>, quota_limit_bytes: u64) -> Self {
        Self {
            project,
            name: name.into(),
            path: String::new(),
            export_path: None,
            quota_limit_bytes,
            protocols: Vec::new(),
            rw_users: Vec::new(),
            ro_users: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the requested path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the protocol names.
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the NFS export path.
    pub fn with_export_path(mut self, export_path: impl Into<String>) -> Self {
        self.export_path = Some(export_path.into());
        self
    }

    /// Sets the RW and RO account lists.
    pub fn with_users(mut self, rw_users: Vec<String>, ro_users: Vec<String>) -> Self {
        self.rw_users = rw_users;
        self.ro_users = ro_users;
        self
    }

    /// Sets an optional attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Checks the request and returns its parsed protocol set.
    pub fn validate(&self) -> Result<BTreeSet<Protocol>> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::validation_field("name", "storage name is required"));
        }
        if name.contains('/') {
            return Err(Error::validation_field(
                "name",
                format!("storage name '{name}' must not contain '/'"),
            ));
        }
        if self.quota_limit_bytes == 0 {
            return Err(Error::validation_field("quota_limit_bytes", "quota must be positive"));
        }
        let protocols = Protocol::parse_all(&self.protocols)?;
        if protocols.contains(&Protocol::Nfs) {
            match self.export_path.as_deref().map(str::trim) {
                Some(p) if p.starts_with('/') => {}
                _ => {
                    return Err(Error::validation_field(
                        "export_path",
                        "NFS requires an absolute export path",
                    ));
                }
            }
        }
        Ok(protocols)
    }
}
