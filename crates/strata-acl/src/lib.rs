//! ACL management for Strata storage allocations.
//!
//! - [`catalog`]: canonical ACE sets ([`AceCatalog`])
//! - [`merge`]: ACE deduplication by normalized trustee, flags, and type
//! - [`manager`]: access allocation lifecycle and ACL application
//!   ([`AclAllocationManager`])
//! - [`membership`]: chunked group membership updates ([`MembershipSync`])
//! - [`provision`]: directory, export, and quota provisioning
//!   ([`StorageProvisioner`])
//! - [`reset`]: recursive tree resets ([`AclResetEngine`])
//! - [`requests`]: incoming allocation requests ([`AllocationRequest`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod manager;
pub mod membership;
pub mod merge;
pub mod provision;
pub mod requests;
pub mod reset;

pub use catalog::AceCatalog;
pub use manager::AclAllocationManager;
pub use membership::{MembershipReport, MembershipSync};
pub use provision::StorageProvisioner;
pub use requests::AllocationRequest;
pub use reset::{AclResetEngine, ResetReport};
