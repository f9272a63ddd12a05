//! StorageProvisioner against the in-memory backend.

use strata_core::{Protocol, ProjectId, StorageAllocation};

use crate::common::{ROOT, TestHarness};

fn allocation(name: &str, protocols: &[Protocol]) -> StorageAllocation {
    StorageAllocation::new(ProjectId::new(), name, format!("{ROOT}/{name}"), 1000)
        .with_protocols(protocols.iter().copied())
        .with_export_path(format!("/{name}"))
}

#[tokio::test]
async fn test_create_allocation_is_rerunnable() {
    let h = TestHarness::new().await;
    let provisioner = h.manager.provisioner();
    let lab = allocation("lab", &[Protocol::Nfs, Protocol::Smb]);

    provisioner.create_allocation(&lab).await.unwrap();
    provisioner.create_allocation(&lab).await.unwrap();

    assert!(h.backend.exists(&format!("{ROOT}/lab")).await);
    assert_eq!(h.backend.export_count().await, 2);
    assert_eq!(
        h.backend.export(Protocol::Nfs, "/lab").await,
        Some(format!("{ROOT}/lab"))
    );
    assert_eq!(h.backend.quota_limit(&format!("{ROOT}/lab")).await, Some(1000));
}

#[tokio::test]
async fn test_setup_creates_active_only_for_root_allocations() {
    let h = TestHarness::new().await;
    let provisioner = h.manager.provisioner();
    let lab = allocation("lab", &[]);
    provisioner.create_allocation(&lab).await.unwrap();
    provisioner.setup_allocation(&lab).await.unwrap();
    assert!(h.backend.exists(&format!("{ROOT}/lab/Active")).await);

    let nested = StorageAllocation::new(
        ProjectId::new(),
        "lab-sub",
        format!("{ROOT}/lab/Active/lab-sub"),
        10,
    );
    provisioner.create_allocation(&nested).await.unwrap();
    provisioner.setup_allocation(&nested).await.unwrap();
    assert!(!h.backend.exists(&format!("{ROOT}/lab/Active/lab-sub/Active")).await);
}

#[tokio::test]
async fn test_update_allocation_syncs_exports_and_quota() {
    let h = TestHarness::new().await;
    let provisioner = h.manager.provisioner();
    let mut lab = allocation("lab", &[Protocol::Smb]);
    provisioner.create_allocation(&lab).await.unwrap();

    lab = lab.with_protocols([Protocol::S3]);
    lab.quota_limit_bytes = 5000;
    provisioner.update_allocation(&lab).await.unwrap();

    assert!(h.backend.export(Protocol::Smb, "lab").await.is_none());
    assert!(h.backend.export(Protocol::S3, "lab").await.is_some());
    assert_eq!(h.backend.quota_limit(&format!("{ROOT}/lab")).await, Some(5000));

    // Re-running changes nothing.
    provisioner.update_allocation(&lab).await.unwrap();
    assert_eq!(h.backend.export_count().await, 1);
}

#[tokio::test]
async fn test_delete_allocation_tolerates_missing_objects() {
    let h = TestHarness::new().await;
    let provisioner = h.manager.provisioner();
    let lab = allocation("lab", &[Protocol::Nfs, Protocol::Smb]);
    provisioner.create_allocation(&lab).await.unwrap();

    provisioner.delete_allocation(&lab).await.unwrap();
    provisioner.delete_allocation(&lab).await.unwrap();

    assert_eq!(h.backend.export_count().await, 0);
    assert!(h.backend.quota_limit(&format!("{ROOT}/lab")).await.is_none());
}
