//! Shared harness for strata-reconcile integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use strata_acl::{AclAllocationManager, AllocationRequest};
use strata_core::{
    AllocationStatus, AllocationStore, ProjectId, StorageAllocation, StorageRoot, StrataConfig,
};
use strata_reconcile::ReconciliationScheduler;
use strata_storage::{
    MemoryAllocationStore, MemoryGroupDirectory, MemoryStorageBackend, RecordingNotifier,
};

pub const ROOT: &str = "/storage2/fs1";

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct TestHarness {
    pub config: StrataConfig,
    pub backend: Arc<MemoryStorageBackend>,
    pub directory: Arc<MemoryGroupDirectory>,
    pub store: Arc<MemoryAllocationStore>,
    pub manager: AclAllocationManager,
    pub scheduler: ReconciliationScheduler,
    pub project: ProjectId,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: StrataConfig) -> Self {
        init_tracing();
        let backend = Arc::new(MemoryStorageBackend::new());
        let directory = Arc::new(MemoryGroupDirectory::new());
        let store = Arc::new(MemoryAllocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        backend.add_directory(config.storage.root.as_str()).await;
        directory.add_accounts(["alice", "bob"]).await;

        let manager = AclAllocationManager::new(
            &config,
            backend.clone(),
            store.clone(),
            directory.clone(),
            notifier,
        );
        let scheduler = ReconciliationScheduler::new(
            &config,
            manager.clone(),
            backend.clone(),
            store.clone(),
            directory.clone(),
        );

        Self {
            config,
            backend,
            directory,
            store,
            manager,
            scheduler,
            project: ProjectId::new(),
        }
    }

    pub fn request(&self, name: &str) -> AllocationRequest {
        AllocationRequest::new(self.project, name, 1 << 30)
            .with_protocols(["smb"])
            .with_users(vec!["alice".to_string()], vec!["bob".to_string()])
    }

    /// Requests an allocation and drives it to Active through the
    /// scheduler passes.
    pub async fn active_allocation(&self, name: &str) -> StorageAllocation {
        let requested = self
            .manager
            .create_storage_allocation(&self.request(name), None)
            .await
            .unwrap();
        self.scheduler.poll_pending_access_allocations().await.unwrap();
        self.scheduler
            .promote_pending_storage_allocations()
            .await
            .unwrap();
        let allocation = self
            .store
            .get_storage_allocation(requested.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(allocation.status, AllocationStatus::Active);
        allocation
    }

    /// Creates and activates a sub-allocation of `parent`.
    pub async fn sub_allocation(&self, parent: &StorageAllocation, name: &str) -> StorageAllocation {
        let allocation = self
            .manager
            .create_storage_allocation(&self.request(name), Some(parent))
            .await
            .unwrap();
        self.manager
            .activate_storage_allocation(&allocation)
            .await
            .unwrap();
        allocation
    }
}

pub fn config() -> StrataConfig {
    let mut config = StrataConfig::default();
    config.storage.root = StorageRoot::new(ROOT).unwrap();
    config
}
