//! Access allocation lifecycle and ACL application.

use std::sync::Arc;

use strata_core::naming::sub_allocation_name;
use strata_core::paths::{is_within, trim_trailing_slash};
use strata_core::{
    AccessAllocation, AccessKind, AceEntry, AllocationStatus, AllocationStore, Error,
    GroupDirectory, Notifier, Result, StorageAllocation, StorageBackend, StorageRoot, StrataConfig,
};

use crate::catalog::AceCatalog;
use crate::membership::{MembershipReport, MembershipSync};
use crate::merge::{merge, strip_trustee};
use crate::provision::StorageProvisioner;
use crate::requests::AllocationRequest;

/// Owns access allocations and the ACLs they imply.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct AclAllocationManager {
    backend: Arc<dyn StorageBackend>,
    store: Arc<dyn AllocationStore>,
    directory: Arc<dyn GroupDirectory>,
    membership: MembershipSync,
    provisioner: StorageProvisioner,
    catalog: AceCatalog,
    root: StorageRoot,
}

impl std::fmt::Debug for AclAllocationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclAllocationManager")
            .field("root", &self.root)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl AclAllocationManager {
    /// Wires a manager to its collaborators.
    pub fn new(
        config: &StrataConfig,
        backend: Arc<dyn StorageBackend>,
        store: Arc<dyn AllocationStore>,
        directory: Arc<dyn GroupDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let catalog = AceCatalog::from_config(config);
        let root = config.storage.root.clone();
        Self {
            membership: MembershipSync::new(
                config,
                Arc::clone(&directory),
                Arc::clone(&store),
                notifier,
            ),
            provisioner: StorageProvisioner::new(
                Arc::clone(&backend),
                root.clone(),
                catalog.clone(),
            ),
            backend,
            store,
            directory,
            catalog,
            root,
        }
    }

    /// The ACE catalog in use.
    pub fn catalog(&self) -> &AceCatalog {
        &self.catalog
    }

    /// Group membership operations.
    pub fn membership(&self) -> &MembershipSync {
        &self.membership
    }

    /// Backend provisioning operations.
    pub fn provisioner(&self) -> &StorageProvisioner {
        &self.provisioner
    }

    /// The configured storage root.
    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub(crate) fn store(&self) -> &Arc<dyn AllocationStore> {
        &self.store
    }

    /// `true` iff `path` is exactly one segment below the storage root.
    pub fn is_base_allocation(&self, path: &str) -> bool {
        self.root.is_base_allocation(path)
    }

    /// Creates the `kind` access allocation for `storage`, its directory
    /// group, and adds `users` to it.
    ///
    /// If the group cannot be created the new record is deleted again.
    pub async fn create_access_allocation(
        &self,
        storage: &StorageAllocation,
        kind: AccessKind,
        users: &[String],
    ) -> Result<AccessAllocation> {
        if self.get_access_allocation(storage, kind).await?.is_some() {
            return Err(Error::conflict(format!(
                "{} access allocation already exists for {}",
                kind, storage.name
            )));
        }

        let access = AccessAllocation::new(storage, kind);
        self.store.create_access_allocation(&access).await?;

        match self.directory.create_group(&access.group_name).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::info!(group = %access.group_name, "Group already exists");
            }
            Err(e) => {
                tracing::warn!(
                    group = %access.group_name,
                    error = %e,
                    "Group creation failed, removing access allocation"
                );
                self.store.delete_access_allocation(access.id).await?;
                return Err(e);
            }
        }

        let report = self.membership.add_users(&access, users).await?;
        if !report.is_complete() {
            tracing::warn!(
                group = %access.group_name,
                invalid = report.invalid.len(),
                failed = report.failed.len(),
                unresolved = report.unresolved.len(),
                "Some users were not added"
            );
        }

        tracing::info!(
            access_id = %access.id,
            storage_id = %storage.id,
            group = %access.group_name,
            "Access allocation created"
        );
        Ok(self
            .store
            .get_access_allocation(access.id)
            .await?
            .unwrap_or(access))
    }

    /// Adds users to an existing access allocation.
    pub async fn add_users(
        &self,
        access: &AccessAllocation,
        users: &[String],
    ) -> Result<MembershipReport> {
        self.membership.add_users(access, users).await
    }

    /// The `kind` access allocation owned by `storage`, if any.
    pub async fn get_access_allocation(
        &self,
        storage: &StorageAllocation,
        kind: AccessKind,
    ) -> Result<Option<AccessAllocation>> {
        Ok(self
            .get_access_allocations(storage)
            .await?
            .into_iter()
            .find(|a| a.kind == kind))
    }

    /// Every access allocation owned by `storage`.
    pub async fn get_access_allocations(
        &self,
        storage: &StorageAllocation,
    ) -> Result<Vec<AccessAllocation>> {
        Ok(self
            .store
            .access_allocations_for_project(storage.project)
            .await?
            .into_iter()
            .filter(|a| a.owner == storage.id)
            .collect())
    }

    /// RW and RO group names for `storage`.
    pub async fn group_names(&self, storage: &StorageAllocation) -> Result<(String, String)> {
        let accesses = self.get_access_allocations(storage).await?;
        let group = |kind: AccessKind| {
            accesses
                .iter()
                .find(|a| a.kind == kind)
                .map(|a| a.group_name.clone())
                .ok_or_else(|| {
                    Error::not_found("access allocation", format!("{} {}", storage.name, kind))
                })
        };
        Ok((group(AccessKind::ReadWrite)?, group(AccessKind::ReadOnly)?))
    }

    /// Applies the canonical ACLs for `storage`.
    ///
    /// Traverse entries go on every directory strictly between the storage
    /// root and the content path first, outermost first. Then the default
    /// and allocation entries are merged into the allocation's own
    /// directories.
    pub async fn set_allocation_acls(&self, storage: &StorageAllocation) -> Result<()> {
        self.apply_allocation_acls(storage, &[]).await
    }

    /// The reset flavor of [`Self::set_allocation_acls`].
    ///
    /// Root allocations additionally re-apply the traverse entries of each
    /// sub-allocation; sub-allocations also receive their parent's
    /// allocation entries.
    pub async fn reset_allocation_acls(&self, storage: &StorageAllocation) -> Result<()> {
        if self.is_base_allocation(&storage.path) {
            self.apply_allocation_acls(storage, &[]).await?;
            for child in self.store.children_of(storage.id).await? {
                let (rw, ro) = self.group_names(&child).await?;
                self.set_traverse_acls(&self.root.content_path(&child.path), &rw, &ro, false)
                    .await?;
            }
            Ok(())
        } else {
            let parent_aces = match self.store.parent_of(storage.id).await? {
                Some(parent) => {
                    let (rw, ro) = self.group_names(&parent).await?;
                    AceCatalog::allocation_aces(&rw, &ro)
                }
                None => {
                    tracing::warn!(allocation_id = %storage.id, "Sub-allocation has no parent link");
                    Vec::new()
                }
            };
            self.apply_allocation_acls(storage, &parent_aces).await
        }
    }

    async fn apply_allocation_acls(
        &self,
        storage: &StorageAllocation,
        extra: &[AceEntry],
    ) -> Result<()> {
        let (rw, ro) = self.group_names(storage).await?;
        let path = trim_trailing_slash(&storage.path);
        let is_root = self.is_base_allocation(path);
        let content = self.root.content_path(path);

        self.set_traverse_acls(&content, &rw, &ro, is_root).await?;

        let mut aces = self.catalog.default_aces();
        if is_root {
            self.merge_into(path, &aces).await?;
        }
        aces.extend(AceCatalog::allocation_aces(&rw, &ro));
        aces.extend_from_slice(extra);
        self.merge_into(&content, &aces).await?;

        tracing::info!(allocation_id = %storage.id, path = %content, "Allocation ACLs applied");
        Ok(())
    }

    async fn set_traverse_acls(
        &self,
        content_path: &str,
        rw: &str,
        ro: &str,
        is_root: bool,
    ) -> Result<()> {
        let aces = AceCatalog::traverse_aces(rw, ro, is_root);
        for ancestor in self.root.ancestors_below_root(content_path) {
            self.merge_into(&ancestor, &aces).await?;
        }
        Ok(())
    }

    async fn merge_into(&self, path: &str, aces: &[AceEntry]) -> Result<()> {
        let mut acl = self.backend.get_acl(path).await?;
        acl.aces = merge(&acl.aces, aces);
        self.backend.set_acl(path, &acl).await
    }

    /// Strips each access group from the content path's ACL and marks the
    /// access allocations Revoked.
    pub async fn remove_acl_access(&self, storage: &StorageAllocation) -> Result<()> {
        let content = self.root.content_path(&storage.path);
        for mut access in self.get_access_allocations(storage).await? {
            let mut acl = self.backend.get_acl(&content).await?;
            acl.aces = strip_trustee(&acl.aces, &access.group_name);
            self.backend.set_acl(&content, &acl).await?;

            access.status = AllocationStatus::Revoked;
            self.store.update_access_allocation(&access).await?;
            tracing::info!(group = %access.group_name, path = %content, "Access revoked");
        }
        Ok(())
    }

    /// Records a new storage allocation (Pending) with its RW and RO
    /// access allocations.
    ///
    /// With a `parent`, the name is scoped under the parent's name and the
    /// path is placed under the parent's `Active` directory.
    pub async fn create_storage_allocation(
        &self,
        request: &AllocationRequest,
        parent: Option<&StorageAllocation>,
    ) -> Result<StorageAllocation> {
        let protocols = request.validate()?;
        let requested = request.name.trim();
        let name = match parent {
            Some(parent) => sub_allocation_name(requested, &parent.name),
            None => requested.to_string(),
        };
        let requested_path = match request.path.trim() {
            "" => name.as_str(),
            p => p,
        };
        let path = self
            .root
            .compose_allocation_path(requested_path, parent.map(|p| p.path.as_str()));

        if !self.root.contains(&path) {
            return Err(Error::validation_field(
                "path",
                format!("{path} is not under the storage root {}", self.root),
            ));
        }
        if let Some(parent) = parent {
            if parent.project != request.project {
                return Err(Error::validation_field(
                    "project",
                    "sub-allocation must belong to the parent's project",
                ));
            }
            let parent_content = self.root.content_path(&parent.path);
            if !is_within(&path, &parent_content) || path == parent_content {
                return Err(Error::validation_field(
                    "path",
                    format!("{path} is not below {parent_content}"),
                ));
            }
        }
        if self
            .store
            .find_storage_allocation_by_path(&path, None)
            .await?
            .is_some()
        {
            return Err(Error::validation_field(
                "path",
                format!("{path} is already allocated"),
            ));
        }

        let mut storage = StorageAllocation::new(
            request.project,
            name,
            path,
            request.quota_limit_bytes,
        )
        .with_protocols(protocols);
        storage.export_path = request.export_path.as_deref().map(str::trim).map(str::to_string);
        storage.attributes = request.attributes.clone();
        if let Some(parent) = parent {
            storage = storage.with_parent(parent.id);
        }

        self.store.create_storage_allocation(&storage).await?;
        if let Some(parent) = parent {
            self.store.link_child(parent.id, storage.id).await?;
        }

        self.create_access_allocation(&storage, AccessKind::ReadWrite, &request.rw_users)
            .await?;
        self.create_access_allocation(&storage, AccessKind::ReadOnly, &request.ro_users)
            .await?;

        tracing::info!(
            allocation_id = %storage.id,
            name = %storage.name,
            path = %storage.path,
            "Storage allocation created"
        );
        Ok(storage)
    }

    /// First-time setup after promotion: provisions the backend objects,
    /// prepares the `Active` directory, and applies ACLs.
    pub async fn activate_storage_allocation(&self, storage: &StorageAllocation) -> Result<()> {
        self.provisioner.create_allocation(storage).await?;
        self.provisioner.setup_allocation(storage).await?;
        self.set_allocation_acls(storage).await
    }
}
