//! Storage and access allocation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::naming::access_group_name;
use crate::types::{AllocationId, AllocationStatus, ProjectId, QuotaUsage};

/// Well-known keys for the optional attribute side-map.
pub mod attribute_keys {
    /// Billing cost center.
    pub const COST_CENTER: &str = "cost_center";
    /// Department number used by billing.
    pub const DEPARTMENT_NUMBER: &str = "department_number";
    /// Technical contact username.
    pub const TECHNICAL_CONTACT: &str = "technical_contact";
    /// Billing contact username.
    pub const BILLING_CONTACT: &str = "billing_contact";
    /// Service rate name.
    pub const SERVICE_RATE: &str = "service_rate";
    /// Billing cycle (monthly, prepaid, ...).
    pub const BILLING_CYCLE: &str = "billing_cycle";
    /// Ticket the allocation was requested under.
    pub const STORAGE_TICKET: &str = "storage_ticket";
}

/// Protocol a storage allocation is exported over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// NFS export.
    Nfs,
    /// SMB share.
    Smb,
    /// S3 bucket.
    S3,
}

impl Protocol {
    /// Every protocol the backend supports.
    pub const ALL: [Protocol; 3] = [Protocol::Nfs, Protocol::Smb, Protocol::S3];

    /// Parses a list of protocol names, rejecting unknown ones.
    pub fn parse_all<I, S>(names: I) -> Result<BTreeSet<Protocol>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Nfs => write!(f, "nfs"),
            Protocol::Smb => write!(f, "smb"),
            Protocol::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nfs" => Ok(Protocol::Nfs),
            "smb" => Ok(Protocol::Smb),
            "s3" => Ok(Protocol::S3),
            other => Err(Error::validation_field(
                "protocols",
                format!("{other} protocol is not valid"),
            )),
        }
    }
}

/// Read-write or read-only access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// Read-write group.
    #[serde(rename = "rw")]
    ReadWrite,
    /// Read-only group.
    #[serde(rename = "ro")]
    ReadOnly,
}

impl AccessKind {
    /// Both kinds, RW first.
    pub const BOTH: [AccessKind; 2] = [AccessKind::ReadWrite, AccessKind::ReadOnly];

    /// Suffix used in group names.
    pub fn suffix(&self) -> &'static str {
        match self {
            AccessKind::ReadWrite => "rw",
            AccessKind::ReadOnly => "ro",
        }
    }

    /// Human-readable label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            AccessKind::ReadWrite => "Read Write",
            AccessKind::ReadOnly => "Read Only",
        }
    }
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A provisioned, quota-bound directory owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageAllocation {
    /// Record identifier.
    pub id: AllocationId,

    /// Owning project.
    pub project: ProjectId,

    /// Storage name; also the basis of the access group names.
    pub name: String,

    /// Absolute filesystem path on the backend.
    pub path: String,

    /// NFS export path, when exported over NFS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,

    /// Quota limit in bytes.
    pub quota_limit_bytes: u64,

    /// Protocols the allocation is exported over.
    #[serde(default)]
    pub protocols: BTreeSet<Protocol>,

    /// Lifecycle status.
    pub status: AllocationStatus,

    /// Parent allocation, for sub-allocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<AllocationId>,

    /// When the record was created.
    pub created: DateTime<Utc>,

    /// Most recent quota usage reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<QuotaUsage>,

    /// Optional fields (billing, contacts) keyed by [`attribute_keys`].
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl StorageAllocation {
    /// Creates a new Pending storage allocation.
    pub fn new(
        project: ProjectId,
        name: impl Into<String>,
        path: impl Into<String>,
        quota_limit_bytes: u64,
    ) -> Self {
        Self {
            id: AllocationId::new(),
            project,
            name: name.into(),
            path: path.into(),
            export_path: None,
            quota_limit_bytes,
            protocols: BTreeSet::new(),
            status: AllocationStatus::Pending,
            parent: None,
            created: Utc::now(),
            usage: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the protocol set.
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.protocols = protocols.into_iter().collect();
        self
    }

    /// Sets the NFS export path.
    pub fn with_export_path(mut self, export_path: impl Into<String>) -> Self {
        self.export_path = Some(export_path.into());
        self
    }

    /// Sets the parent link.
    pub fn with_parent(mut self, parent: AllocationId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: AllocationStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns an optional attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns `true` if this is a sub-allocation.
    pub fn is_sub_allocation(&self) -> bool {
        self.parent.is_some()
    }
}

/// A read-write or read-only grant on a storage allocation, backed by a
/// directory group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessAllocation {
    /// Record identifier.
    pub id: AllocationId,

    /// Owning project (same as the owner's).
    pub project: ProjectId,

    /// The storage allocation this grant belongs to.
    ///
    /// Stores validate that this refers to an existing storage allocation.
    pub owner: AllocationId,

    /// RW or RO.
    pub kind: AccessKind,

    /// Directory group name, `storage-<storage name>-<rw|ro>`.
    pub group_name: String,

    /// Lifecycle status.
    pub status: AllocationStatus,

    /// Accounts recorded as members.
    #[serde(default)]
    pub users: BTreeSet<String>,

    /// When the record was created.
    pub created: DateTime<Utc>,
}

impl AccessAllocation {
    /// Creates a new Pending access allocation for `owner`.
    pub fn new(owner: &StorageAllocation, kind: AccessKind) -> Self {
        Self {
            id: AllocationId::new(),
            project: owner.project,
            owner: owner.id,
            kind,
            group_name: access_group_name(&owner.name, kind),
            status: AllocationStatus::Pending,
            users: BTreeSet::new(),
            created: Utc::now(),
        }
    }

    /// Overrides the creation time.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }
}
