//! Shared harness for strata-acl integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use strata_acl::{AclAllocationManager, AllocationRequest};
use strata_core::{ProjectId, StorageAllocation, StorageRoot, StrataConfig};
use strata_storage::{
    MemoryAllocationStore, MemoryGroupDirectory, MemoryStorageBackend, RecordingNotifier,
};

pub const ROOT: &str = "/storage2/fs1";

static TRACING: Once = Once::new();

/// Installs a test subscriber once per binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory collaborators plus a manager wired to them.
pub struct TestHarness {
    pub config: StrataConfig,
    pub backend: Arc<MemoryStorageBackend>,
    pub directory: Arc<MemoryGroupDirectory>,
    pub store: Arc<MemoryAllocationStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: AclAllocationManager,
    pub project: ProjectId,
}

impl TestHarness {
    /// Harness with the default config rooted at [`ROOT`].
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    /// Harness with a custom config.
    pub async fn with_config(config: StrataConfig) -> Self {
        init_tracing();
        let backend = Arc::new(MemoryStorageBackend::new());
        let directory = Arc::new(MemoryGroupDirectory::new());
        let store = Arc::new(MemoryAllocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        backend.add_directory(config.storage.root.as_str()).await;
        directory
            .add_accounts(["alice", "bob", "carol", "dave"])
            .await;

        let manager = AclAllocationManager::new(
            &config,
            backend.clone(),
            store.clone(),
            directory.clone(),
            notifier.clone(),
        );

        Self {
            config,
            backend,
            directory,
            store,
            notifier,
            manager,
            project: ProjectId::new(),
        }
    }

    /// A request for an SMB allocation with one RW and one RO user.
    pub fn request(&self, name: &str) -> AllocationRequest {
        AllocationRequest::new(self.project, name, 1 << 30)
            .with_protocols(["smb"])
            .with_users(vec!["alice".to_string()], vec!["bob".to_string()])
    }

    /// Creates and activates a root allocation.
    pub async fn root_allocation(&self, name: &str) -> StorageAllocation {
        let allocation = self
            .manager
            .create_storage_allocation(&self.request(name), None)
            .await
            .unwrap();
        self.manager
            .activate_storage_allocation(&allocation)
            .await
            .unwrap();
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

/// Default test config rooted at [`ROOT`].
pub fn config() -> StrataConfig {
    let mut config = StrataConfig::default();
    config.storage.root = StorageRoot::new(ROOT).unwrap();
    config
}
