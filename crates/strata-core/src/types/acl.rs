//! Access-control list model exchanged with the storage backend.
//!
//! The serialized shape mirrors the backend's JSON representation
//! (`SCREAMING_SNAKE_CASE` enum names, `type` for the ACE type), so an
//! [`Acl`] read from the backend can be written straight back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name the backend uses for the synthetic trustee that stands for
/// whoever owns a file.
pub const FILE_OWNER: &str = "File Owner";

/// Name of the world trustee.
pub const EVERYONE: &str = "Everyone";

/// Identity namespace a trustee name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrusteeDomain {
    /// Directory-service (AD/LDAP) account or group.
    ActiveDirectory,
    /// Account local to the storage cluster.
    Local,
    /// The world.
    World,
    /// POSIX user id.
    PosixUser,
    /// POSIX group id.
    PosixGroup,
    /// The owner of the object the ACE is attached to.
    ApiCreatorOwner,
}

/// The subject an ACE grants rights to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Trustee {
    /// Account or group name, as the backend reports it.
    pub name: String,

    /// Namespace of `name`, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<TrusteeDomain>,
}

impl Trustee {
    /// A directory-service group trustee.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: Some(TrusteeDomain::ActiveDirectory),
        }
    }

    /// The synthetic file-owner trustee.
    pub fn file_owner() -> Self {
        Self {
            name: FILE_OWNER.to_string(),
            domain: None,
        }
    }

    /// The world trustee.
    pub fn everyone() -> Self {
        Self {
            name: EVERYONE.to_string(),
            domain: None,
        }
    }
}

/// Inheritance flags on an ACE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AceFlag {
    /// Inherited by files created below.
    ObjectInherit,
    /// Inherited by directories created below.
    ContainerInherit,
    /// Inherited one level only.
    NoPropagateInherit,
    /// Applies to children only, not the object itself.
    InheritOnly,
    /// This ACE was inherited from a parent.
    Inherited,
}

/// Whether an ACE grants or denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AceType {
    /// Grants the rights.
    Allowed,
    /// Denies the rights.
    Denied,
}

/// A single right within an ACE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum AceRight {
    Read,
    ReadEa,
    ReadAttr,
    ReadAcl,
    WriteEa,
    WriteAttr,
    WriteAcl,
    ChangeOwner,
    WriteGroup,
    Delete,
    Execute,
    Modify,
    Extend,
    AddFile,
    AddSubdir,
    DeleteChild,
    Synchronize,
}

/// One access-control entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AceEntry {
    /// Who the entry applies to.
    pub trustee: Trustee,

    /// Inheritance flags (order-insensitive).
    #[serde(default)]
    pub flags: BTreeSet<AceFlag>,

    /// Allow or deny.
    #[serde(rename = "type")]
    pub ace_type: AceType,

    /// Rights granted or denied (order-insensitive).
    #[serde(default)]
    pub rights: BTreeSet<AceRight>,
}

impl AceEntry {
    /// Builds an `ALLOWED` entry.
    pub fn allowed(
        trustee: Trustee,
        flags: impl IntoIterator<Item = AceFlag>,
        rights: impl IntoIterator<Item = AceRight>,
    ) -> Self {
        Self {
            trustee,
            flags: flags.into_iter().collect(),
            ace_type: AceType::Allowed,
            rights: rights.into_iter().collect(),
        }
    }

    /// Returns `true` if this entry carries container or object inherit.
    pub fn is_inheritable(&self) -> bool {
        self.flags.contains(&AceFlag::ContainerInherit) || self.flags.contains(&AceFlag::ObjectInherit)
    }
}

/// ACL control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum AclControl {
    Present,
    Defaulted,
    Trusted,
    AutoInherit,
    Protected,
}

/// POSIX special permission bits carried alongside the ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PosixSpecialPermission {
    SetUid,
    SetGid,
    StickyBit,
}

/// A full access-control list: the unit read from and written to a path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Acl {
    /// Control flags.
    #[serde(default)]
    pub control: Vec<AclControl>,

    /// POSIX special permissions.
    #[serde(default)]
    pub posix_special_permissions: Vec<PosixSpecialPermission>,

    /// Ordered entries.
    #[serde(default)]
    pub aces: Vec<AceEntry>,
}

impl Acl {
    /// Replaces the entries, keeping control metadata.
    pub fn with_aces(mut self, aces: Vec<AceEntry>) -> Self {
        self.aces = aces;
        self
    }
}
