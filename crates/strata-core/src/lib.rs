//! Strata Core: shared types, traits, errors, and configuration.
//!
//! This crate provides the foundational types used across all Strata
//! crates. It has no internal Strata dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`types`]: Allocation, ACL, quota, and directory records
//! - [`config`]: [`StrataConfig`] and its sections
//! - [`paths`]: Storage-root path rules ([`StorageRoot`])
//! - [`naming`]: Group and sub-allocation naming
//! - [`traits`]: Contracts for the storage backend, group directory,
//!   allocation store, and notifier

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod naming;
pub mod paths;
pub mod traits;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::StrataConfig;
pub use error::{Error, Result};
pub use paths::StorageRoot;
pub use traits::{
    AllocationStore, DirectoryMember, GroupDirectory, Notification, Notifier, StorageBackend,
};
pub use types::{
    AccessAllocation, AccessKind, AceEntry, AceFlag, AceRight, AceType, Acl, AclControl,
    AllocationId, AllocationStatus, DirectoryEntry, EntryKind, ProjectId, Protocol, QuotaPage,
    QuotaUsage, QuotaUsageSample, StorageAllocation, Trustee, TrusteeDomain,
};
