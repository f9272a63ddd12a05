//! Core record types.

mod acl;
mod allocation;
mod directory;
mod ids;
mod quota;
mod status;

pub use acl::{
    AceEntry, AceFlag, AceRight, AceType, Acl, AclControl, EVERYONE, FILE_OWNER,
    PosixSpecialPermission, Trustee, TrusteeDomain,
};
pub use allocation::{AccessAllocation, AccessKind, Protocol, StorageAllocation, attribute_keys};
pub use directory::{DirectoryEntry, EntryKind};
pub use ids::{AllocationId, ProjectId};
pub use quota::{QuotaPage, QuotaUsage, QuotaUsageSample};
pub use status::AllocationStatus;
