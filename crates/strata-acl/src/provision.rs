//! Directory, export, and quota provisioning on the storage backend.

use std::sync::Arc;

use strata_core::paths::{ACTIVE_DIR, trim_trailing_slash};
use strata_core::{Error, Protocol, Result, StorageAllocation, StorageBackend, StorageRoot};

use crate::catalog::AceCatalog;

/// Creates, updates, and removes an allocation's backend objects.
///
/// "Already exists" on create and "does not exist" on delete are logged
/// and treated as success, so every operation can be re-run.
#[derive(Clone)]
pub struct StorageProvisioner {
    backend: Arc<dyn StorageBackend>,
    root: StorageRoot,
    catalog: AceCatalog,
}

impl std::fmt::Debug for StorageProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvisioner")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl StorageProvisioner {
    /// Creates a provisioner.
    pub fn new(backend: Arc<dyn StorageBackend>, root: StorageRoot, catalog: AceCatalog) -> Self {
        Self {
            backend,
            root,
            catalog,
        }
    }

    /// Creates the allocation directory, one export per protocol, and the
    /// quota.
    pub async fn create_allocation(&self, allocation: &StorageAllocation) -> Result<()> {
        let path = allocation_path(allocation)?;
        let (parent, name) = split_parent(path)?;

        ignore_conflict(
            self.backend.create_directory(parent, name).await,
            "directory",
            path,
        )?;
        for protocol in &allocation.protocols {
            self.create_export(allocation, *protocol).await?;
        }
        ignore_conflict(
            self.backend
                .create_quota(path, allocation.quota_limit_bytes)
                .await,
            "quota",
            path,
        )?;

        tracing::info!(
            allocation_id = %allocation.id,
            path,
            protocols = allocation.protocols.len(),
            "Allocation provisioned"
        );
        Ok(())
    }

    /// Prepares a root allocation: creates `<path>/Active` and writes the
    /// default ACL on `<path>`. Sub-allocations need nothing here.
    pub async fn setup_allocation(&self, allocation: &StorageAllocation) -> Result<()> {
        let path = allocation_path(allocation)?;
        if !self.root.is_base_allocation(path) {
            return Ok(());
        }
        ignore_conflict(
            self.backend.create_directory(path, ACTIVE_DIR).await,
            "directory",
            path,
        )?;
        let acl = AceCatalog::base_acl().with_aces(self.catalog.default_aces());
        self.backend.set_acl(path, &acl).await
    }

    /// Brings exports in line with the protocol set and applies the quota
    /// limit.
    pub async fn update_allocation(&self, allocation: &StorageAllocation) -> Result<()> {
        let path = allocation_path(allocation)?;
        for protocol in Protocol::ALL {
            if allocation.protocols.contains(&protocol) {
                self.create_export(allocation, protocol).await?;
            } else {
                self.delete_export(allocation, protocol).await?;
            }
        }
        self.backend
            .update_quota(path, allocation.quota_limit_bytes)
            .await
    }

    /// Removes the quota and every export.
    pub async fn delete_allocation(&self, allocation: &StorageAllocation) -> Result<()> {
        let path = allocation_path(allocation)?;
        ignore_missing(self.backend.delete_quota(path).await, "quota", path)?;
        for protocol in &allocation.protocols {
            self.delete_export(allocation, *protocol).await?;
        }
        tracing::info!(allocation_id = %allocation.id, path, "Allocation deprovisioned");
        Ok(())
    }

    async fn create_export(&self, allocation: &StorageAllocation, protocol: Protocol) -> Result<()> {
        let result = self
            .backend
            .create_export(
                protocol,
                trim_trailing_slash(&allocation.path),
                allocation.export_path.as_deref(),
                &allocation.name,
            )
            .await;
        ignore_conflict(result, "export", &allocation.name)
    }

    async fn delete_export(&self, allocation: &StorageAllocation, protocol: Protocol) -> Result<()> {
        if protocol == Protocol::Nfs && allocation.export_path.is_none() {
            tracing::debug!(allocation_id = %allocation.id, "No NFS export path, nothing to delete");
            return Ok(());
        }
        let result = self
            .backend
            .delete_export(protocol, allocation.export_path.as_deref(), &allocation.name)
            .await;
        ignore_missing(result, "export", &allocation.name)
    }
}

fn allocation_path(allocation: &StorageAllocation) -> Result<&str> {
    let path = trim_trailing_slash(&allocation.path);
    if !path.starts_with('/') {
        return Err(Error::validation_field(
            "path",
            format!("allocation path must be absolute, got '{path}'"),
        ));
    }
    Ok(path)
}

fn split_parent(path: &str) -> Result<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((_, "")) | None => Err(Error::validation_field(
            "path",
            format!("'{path}' has no directory name"),
        )),
        Some(("", name)) => Ok(("/", name)),
        Some(split) => Ok(split),
    }
}

fn ignore_conflict(result: Result<()>, what: &str, target: &str) -> Result<()> {
    match result {
        Err(e) if e.is_conflict() => {
            tracing::info!(target_name = target, "{what} already exists");
            Ok(())
        }
        other => other,
    }
}

fn ignore_missing(result: Result<()>, what: &str, target: &str) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::info!(target_name = target, "{what} does not exist");
            Ok(())
        }
        other => other,
    }
}
