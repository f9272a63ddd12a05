//! Contracts for the external systems Strata reconciles against.
//!
//! - [`StorageBackend`]: the network-attached storage cluster (ACLs,
//!   exports, quotas, directory listings)
//! - [`GroupDirectory`]: the identity service that owns groups and
//!   membership
//! - [`AllocationStore`]: durable allocation records
//! - [`Notifier`]: user-support notifications
//!
//! All traits are object-safe and `Send + Sync` so components can hold
//! them as `Arc<dyn Trait>`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AccessAllocation, AccessKind, Acl, AllocationId, AllocationStatus, DirectoryEntry, ProjectId,
    Protocol, QuotaPage, QuotaUsage, StorageAllocation,
};

/// The storage cluster.
///
/// Failures are reported as [`crate::Error::TransientBackend`]; a missing
/// path or export as [`crate::Error::NotFound`]; an export that already
/// exists as [`crate::Error::Conflict`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Reads the ACL at `path`.
    async fn get_acl(&self, path: &str) -> Result<Acl>;

    /// Replaces the ACL at `path`.
    async fn set_acl(&self, path: &str, acl: &Acl) -> Result<()>;

    /// Creates directory `name` inside `parent`.
    async fn create_directory(&self, parent: &str, name: &str) -> Result<()>;

    /// Exports `fs_path` over `protocol`.
    ///
    /// NFS exports are published at `export_path`; SMB shares and S3
    /// buckets are published under `name`.
    async fn create_export(
        &self,
        protocol: Protocol,
        fs_path: &str,
        export_path: Option<&str>,
        name: &str,
    ) -> Result<()>;

    /// Removes an export created by [`StorageBackend::create_export`].
    async fn delete_export(
        &self,
        protocol: Protocol,
        export_path: Option<&str>,
        name: &str,
    ) -> Result<()>;

    /// Attaches a quota to `fs_path`.
    async fn create_quota(&self, fs_path: &str, limit_bytes: u64) -> Result<()>;

    /// Changes the quota limit on `fs_path`.
    async fn update_quota(&self, fs_path: &str, limit_bytes: u64) -> Result<()>;

    /// Removes the quota on `fs_path`.
    async fn delete_quota(&self, fs_path: &str) -> Result<()>;

    /// Lists the immediate children of `path`.
    async fn enumerate_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>>;

    /// Returns one page of quota usage.
    ///
    /// Pass the previous page's `next` cursor to continue; `None` starts
    /// from the beginning.
    async fn quotas_with_usage(&self, page_limit: usize, cursor: Option<&str>)
    -> Result<QuotaPage>;
}

/// A resolved directory account or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMember {
    /// Account name as supplied.
    pub account: String,

    /// Distinguished name in the directory.
    pub dn: String,

    /// Whether the account is itself a group.
    pub is_group: bool,
}

/// The identity service.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Creates a group.
    async fn create_group(&self, name: &str) -> Result<()>;

    /// Deletes a group.
    async fn delete_group(&self, name: &str) -> Result<()>;

    /// Looks a group up. `Ok(false)` means it does not exist (yet).
    async fn lookup_group(&self, name: &str) -> Result<bool>;

    /// Resolves an account (user or group) by name.
    ///
    /// `Ok(None)` means no such account.
    async fn resolve_member(&self, account: &str) -> Result<Option<DirectoryMember>>;

    /// Adds resolved members to a group in one operation.
    async fn add_members(&self, group: &str, members: &[DirectoryMember]) -> Result<()>;

    /// Removes one account from a group.
    async fn remove_member(&self, group: &str, account: &str) -> Result<()>;
}

/// Durable allocation records.
///
/// Writes are last-write-wins.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Inserts a storage allocation.
    async fn create_storage_allocation(&self, allocation: &StorageAllocation) -> Result<()>;

    /// Fetches a storage allocation.
    async fn get_storage_allocation(&self, id: AllocationId) -> Result<Option<StorageAllocation>>;

    /// Replaces a storage allocation.
    async fn update_storage_allocation(&self, allocation: &StorageAllocation) -> Result<()>;

    /// Every storage allocation in `status`.
    async fn storage_allocations_with_status(
        &self,
        status: AllocationStatus,
    ) -> Result<Vec<StorageAllocation>>;

    /// The storage allocation whose stored path equals `path` exactly,
    /// optionally restricted to `status`.
    async fn find_storage_allocation_by_path(
        &self,
        path: &str,
        status: Option<AllocationStatus>,
    ) -> Result<Option<StorageAllocation>>;

    /// Records quota usage against a storage allocation.
    async fn record_quota_usage(&self, id: AllocationId, usage: QuotaUsage) -> Result<()>;

    /// Links `child` under `parent`.
    async fn link_child(&self, parent: AllocationId, child: AllocationId) -> Result<()>;

    /// Sub-allocations of `parent`.
    async fn children_of(&self, parent: AllocationId) -> Result<Vec<StorageAllocation>>;

    /// Parent of `child`, if it is a sub-allocation.
    async fn parent_of(&self, child: AllocationId) -> Result<Option<StorageAllocation>>;

    /// Inserts an access allocation.
    ///
    /// Fails with a validation error unless `owner` names an existing
    /// storage allocation in the same project.
    async fn create_access_allocation(&self, allocation: &AccessAllocation) -> Result<()>;

    /// Fetches an access allocation.
    async fn get_access_allocation(&self, id: AllocationId) -> Result<Option<AccessAllocation>>;

    /// Replaces an access allocation.
    async fn update_access_allocation(&self, allocation: &AccessAllocation) -> Result<()>;

    /// Deletes an access allocation.
    async fn delete_access_allocation(&self, id: AllocationId) -> Result<()>;

    /// Every access allocation in a project.
    async fn access_allocations_for_project(
        &self,
        project: ProjectId,
    ) -> Result<Vec<AccessAllocation>>;

    /// Every access allocation in `status`.
    async fn access_allocations_with_status(
        &self,
        status: AllocationStatus,
    ) -> Result<Vec<AccessAllocation>>;
}

/// A user-support notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Usernames that did not resolve in the directory.
    InvalidUsers {
        /// Access allocation the users were requested for.
        access_allocation: AllocationId,
        /// RW or RO.
        kind: AccessKind,
        /// Unresolvable usernames.
        usernames: Vec<String>,
    },

    /// Usernames that resolved but could not be added to the group.
    FailedToAddUsers {
        /// Access allocation the users were requested for.
        access_allocation: AllocationId,
        /// RW or RO.
        kind: AccessKind,
        /// Usernames whose add failed.
        usernames: Vec<String>,
    },
}

/// Delivers notifications to user support.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one notification.
    async fn notify(&self, notification: Notification) -> Result<()>;
}
