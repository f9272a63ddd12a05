//! In-memory allocation store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use strata_core::{
    AccessAllocation, AllocationId, AllocationStatus, AllocationStore, Error, ProjectId,
    QuotaUsage, Result, StorageAllocation,
};

#[derive(Debug, Default)]
struct State {
    storage: BTreeMap<AllocationId, StorageAllocation>,
    access: BTreeMap<AllocationId, AccessAllocation>,
    fail_access_updates: bool,
}

/// An in-memory [`AllocationStore`].
#[derive(Debug, Default)]
pub struct MemoryAllocationStore {
    state: RwLock<State>,
}

impl MemoryAllocationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of access allocation records.
    pub async fn access_allocation_count(&self) -> usize {
        self.state.read().await.access.len()
    }

    /// Makes `update_access_allocation` fail with a transient error.
    pub async fn set_access_updates_failing(&self, failing: bool) {
        self.state.write().await.fail_access_updates = failing;
    }
}

#[async_trait]
impl AllocationStore for MemoryAllocationStore {
    async fn create_storage_allocation(&self, allocation: &StorageAllocation) -> Result<()> {
        let mut state = self.state.write().await;
        if state.storage.contains_key(&allocation.id) {
            return Err(Error::conflict(format!(
                "storage allocation {} already exists",
                allocation.id
            )));
        }
        state.storage.insert(allocation.id, allocation.clone());
        Ok(())
    }

    async fn get_storage_allocation(&self, id: AllocationId) -> Result<Option<StorageAllocation>> {
        Ok(self.state.read().await.storage.get(&id).cloned())
    }

    async fn update_storage_allocation(&self, allocation: &StorageAllocation) -> Result<()> {
        let mut state = self.state.write().await;
        let slot = state
            .storage
            .get_mut(&allocation.id)
            .ok_or_else(|| Error::not_found("storage allocation", allocation.id.to_string()))?;
        *slot = allocation.clone();
        Ok(())
    }

    async fn storage_allocations_with_status(
        &self,
        status: AllocationStatus,
    ) -> Result<Vec<StorageAllocation>> {
        let state = self.state.read().await;
        Ok(state
            .storage
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect())
    }

    async fn find_storage_allocation_by_path(
        &self,
        path: &str,
        status: Option<AllocationStatus>,
    ) -> Result<Option<StorageAllocation>> {
        let state = self.state.read().await;
        Ok(state
            .storage
            .values()
            .find(|a| a.path == path && status.is_none_or(|s| a.status == s))
            .cloned())
    }

    async fn record_quota_usage(&self, id: AllocationId, usage: QuotaUsage) -> Result<()> {
        let mut state = self.state.write().await;
        let allocation = state
            .storage
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("storage allocation", id.to_string()))?;
        allocation.usage = Some(usage);
        Ok(())
    }

    async fn link_child(&self, parent: AllocationId, child: AllocationId) -> Result<()> {
        let mut state = self.state.write().await;
        if parent == child {
            return Err(Error::validation_field(
                "parent",
                "an allocation cannot be its own parent",
            ));
        }
        if !state.storage.contains_key(&parent) {
            return Err(Error::not_found("storage allocation", parent.to_string()));
        }
        let allocation = state
            .storage
            .get_mut(&child)
            .ok_or_else(|| Error::not_found("storage allocation", child.to_string()))?;
        allocation.parent = Some(parent);
        Ok(())
    }

    async fn children_of(&self, parent: AllocationId) -> Result<Vec<StorageAllocation>> {
        let state = self.state.read().await;
        Ok(state
            .storage
            .values()
            .filter(|a| a.parent == Some(parent))
            .cloned()
            .collect())
    }

    async fn parent_of(&self, child: AllocationId) -> Result<Option<StorageAllocation>> {
        let state = self.state.read().await;
        Ok(state
            .storage
            .get(&child)
            .and_then(|a| a.parent)
            .and_then(|p| state.storage.get(&p))
            .cloned())
    }

    async fn create_access_allocation(&self, allocation: &AccessAllocation) -> Result<()> {
        let mut state = self.state.write().await;
        match state.storage.get(&allocation.owner) {
            Some(owner) if owner.project == allocation.project => {}
            Some(_) => {
                return Err(Error::validation_field(
                    "owner",
                    "access allocation must belong to its owner's project",
                ));
            }
            None => {
                return Err(Error::validation_field(
                    "owner",
                    format!("storage allocation {} does not exist", allocation.owner),
                ));
            }
        }
        state.access.insert(allocation.id, allocation.clone());
        Ok(())
    }

    async fn get_access_allocation(&self, id: AllocationId) -> Result<Option<AccessAllocation>> {
        Ok(self.state.read().await.access.get(&id).cloned())
    }

    async fn update_access_allocation(&self, allocation: &AccessAllocation) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_access_updates {
            return Err(Error::backend(format!(
                "access allocation {} could not be saved",
                allocation.id
            )));
        }
        let slot = state
            .access
            .get_mut(&allocation.id)
            .ok_or_else(|| Error::not_found("access allocation", allocation.id.to_string()))?;
        *slot = allocation.clone();
        Ok(())
    }

    async fn delete_access_allocation(&self, id: AllocationId) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .access
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("access allocation", id.to_string()))
    }

    async fn access_allocations_for_project(
        &self,
        project: ProjectId,
    ) -> Result<Vec<AccessAllocation>> {
        let state = self.state.read().await;
        Ok(state
            .access
            .values()
            .filter(|a| a.project == project)
            .cloned()
            .collect())
    }

    async fn access_allocations_with_status(
        &self,
        status: AllocationStatus,
    ) -> Result<Vec<AccessAllocation>> {
        let state = self.state.read().await;
        Ok(state
            .access
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect())
    }
}
