//! Canonical ACE sets for allocation roles.
//!
//! Every function here is pure. The catalog only carries the configured
//! administrator group, which appears in the default and "existing entry"
//! shapes.

use strata_core::{AceEntry, AceFlag, AceRight, Acl, AclControl, StrataConfig, Trustee};

use AceFlag::{ContainerInherit, InheritOnly, Inherited, ObjectInherit};
use AceRight::*;

const READ: [AceRight; 5] = [Read, Synchronize, ReadAcl, ReadAttr, ReadEa];

const TRAVERSE: [AceRight; 6] = [Read, Synchronize, ReadAcl, ReadAttr, ReadEa, Execute];

const RW_DIRECTORY: [AceRight; 11] = [
    Read,
    Synchronize,
    ReadAcl,
    ReadAttr,
    ReadEa,
    Execute,
    AddFile,
    AddSubdir,
    DeleteChild,
    WriteAttr,
    WriteEa,
];

const RW_FILE: [AceRight; 10] = [
    Read,
    Synchronize,
    ReadAcl,
    ReadAttr,
    ReadEa,
    AddFile,
    AddSubdir,
    DeleteChild,
    WriteAttr,
    WriteEa,
];

const OWNER_DIRECTORY: [AceRight; 13] = [
    Read,
    AddFile,
    AddSubdir,
    Synchronize,
    ReadAcl,
    ReadAttr,
    ReadEa,
    DeleteChild,
    ChangeOwner,
    Execute,
    WriteAcl,
    WriteAttr,
    WriteEa,
];

const OWNER_FILE: [AceRight; 11] = [
    Read,
    AddFile,
    AddSubdir,
    Synchronize,
    ReadAcl,
    ReadAttr,
    ReadEa,
    ChangeOwner,
    WriteAcl,
    WriteAttr,
    WriteEa,
];

// Shapes the backend reports on entries created inside an allocation.
const EXISTING_WRITE: [AceRight; 10] = [
    Read,
    ReadEa,
    ReadAttr,
    ReadAcl,
    WriteEa,
    WriteAttr,
    Modify,
    Extend,
    DeleteChild,
    Synchronize,
];

const EXISTING_WRITE_DIRECTORY: [AceRight; 11] = [
    Read,
    ReadEa,
    ReadAttr,
    ReadAcl,
    WriteEa,
    WriteAttr,
    Execute,
    Modify,
    Extend,
    DeleteChild,
    Synchronize,
];

/// Builds the ACE sets Strata writes to allocation directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AceCatalog {
    admin_group: String,
}

impl AceCatalog {
    /// Creates a catalog granting administration to `admin_group`.
    pub fn new(admin_group: impl Into<String>) -> Self {
        Self {
            admin_group: admin_group.into(),
        }
    }

    /// Creates a catalog from `storage.admin_group`.
    pub fn from_config(config: &StrataConfig) -> Self {
        Self::new(config.storage.admin_group.clone())
    }

    /// The administrator group name.
    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// An empty ACL: control `PRESENT`, no special permissions, no entries.
    pub fn base_acl() -> Acl {
        Acl {
            control: vec![AclControl::Present],
            posix_special_permissions: Vec::new(),
            aces: Vec::new(),
        }
    }

    /// Entries every allocation directory carries: the file owner and the
    /// administrator group (container and object inherit), and read-only
    /// `Everyone` on the directory itself.
    pub fn default_aces(&self) -> Vec<AceEntry> {
        let admin = Trustee::group(&self.admin_group);
        vec![
            AceEntry::allowed(Trustee::file_owner(), [ContainerInherit], OWNER_DIRECTORY),
            AceEntry::allowed(Trustee::file_owner(), [ObjectInherit], OWNER_FILE),
            AceEntry::allowed(admin.clone(), [ContainerInherit], admin_rights(true)),
            AceEntry::allowed(admin, [ObjectInherit], admin_rights(false)),
            AceEntry::allowed(Trustee::everyone(), [], [Read]),
        ]
    }

    /// Inheritable entries granting the allocation's RW and RO groups
    /// access to its content.
    pub fn allocation_aces(rw_group: &str, ro_group: &str) -> Vec<AceEntry> {
        vec![
            AceEntry::allowed(Trustee::group(rw_group), [ContainerInherit], RW_DIRECTORY),
            AceEntry::allowed(Trustee::group(rw_group), [ObjectInherit], RW_FILE),
            AceEntry::allowed(Trustee::group(ro_group), [ContainerInherit], TRAVERSE),
            AceEntry::allowed(Trustee::group(ro_group), [ObjectInherit], READ),
        ]
    }

    /// Entries for directories between the storage root and an allocation.
    ///
    /// Root allocations get container/object-inherit shapes; sub-allocations
    /// get a single non-inheritable entry per group so members can pass
    /// through the parent without seeing its content.
    pub fn traverse_aces(rw_group: &str, ro_group: &str, is_root_allocation: bool) -> Vec<AceEntry> {
        if is_root_allocation {
            [rw_group, ro_group]
                .into_iter()
                .flat_map(|group| {
                    [
                        AceEntry::allowed(Trustee::group(group), [ContainerInherit], TRAVERSE),
                        AceEntry::allowed(Trustee::group(group), [ObjectInherit], READ),
                    ]
                })
                .collect()
        } else {
            [rw_group, ro_group]
                .into_iter()
                .map(|group| AceEntry::allowed(Trustee::group(group), [], TRAVERSE))
                .collect()
        }
    }

    /// The inherited entries an existing file inside the allocation should
    /// carry.
    pub fn existing_file_aces(&self, rw_group: &str, ro_group: &str) -> Vec<AceEntry> {
        let mut aces = vec![
            AceEntry::allowed(Trustee::file_owner(), [], EXISTING_WRITE),
            AceEntry::allowed(Trustee::group(&self.admin_group), [Inherited], EXISTING_WRITE),
        ];
        aces.extend(Self::parent_file_aces(rw_group, ro_group));
        aces
    }

    /// The inherited entries an existing directory inside the allocation
    /// should carry.
    pub fn existing_directory_aces(&self, rw_group: &str, ro_group: &str) -> Vec<AceEntry> {
        let admin = Trustee::group(&self.admin_group);
        let rw = Trustee::group(rw_group);
        let ro = Trustee::group(ro_group);
        vec![
            AceEntry::allowed(Trustee::file_owner(), [], EXISTING_WRITE_DIRECTORY),
            AceEntry::allowed(admin.clone(), [ContainerInherit, Inherited], EXISTING_WRITE_DIRECTORY),
            AceEntry::allowed(admin, [ObjectInherit, InheritOnly, Inherited], EXISTING_WRITE),
            AceEntry::allowed(rw.clone(), [ContainerInherit, Inherited], EXISTING_WRITE_DIRECTORY),
            AceEntry::allowed(rw, [ObjectInherit, InheritOnly, Inherited], EXISTING_WRITE),
            AceEntry::allowed(ro.clone(), [ContainerInherit, Inherited], TRAVERSE),
            AceEntry::allowed(ro, [ObjectInherit, InheritOnly, Inherited], READ),
        ]
    }

    /// Inherited file entries for a group pair.
    ///
    /// During a sub-allocation reset these are appended to every file for
    /// the parent's groups.
    pub fn parent_file_aces(rw_group: &str, ro_group: &str) -> Vec<AceEntry> {
        vec![
            AceEntry::allowed(Trustee::group(rw_group), [Inherited], EXISTING_WRITE),
            AceEntry::allowed(Trustee::group(ro_group), [Inherited], READ),
        ]
    }
}

fn admin_rights(directory: bool) -> Vec<AceRight> {
    let mut rights = vec![
        Read,
        AddFile,
        AddSubdir,
        Synchronize,
        ReadAcl,
        ReadAttr,
        ReadEa,
        DeleteChild,
        WriteAttr,
        WriteEa,
    ];
    if directory {
        rights.push(Execute);
    }
    rights
}
