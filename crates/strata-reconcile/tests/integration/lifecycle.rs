//! Promotion from Pending to Active and first-time activation.

use strata_core::{AccessKind, AllocationStatus, AllocationStore, StorageAllocation};
use strata_reconcile::PromotionOutcome;

use crate::common::{ROOT, TestHarness};

async fn set_access_status(
    h: &TestHarness,
    storage: &StorageAllocation,
    kind: AccessKind,
    status: AllocationStatus,
) {
    let mut access = h
        .manager
        .get_access_allocation(storage, kind)
        .await
        .unwrap()
        .unwrap();
    access.status = status;
    h.store.update_access_allocation(&access).await.unwrap();
}

#[tokio::test]
async fn test_promotion_waits_for_every_access_allocation() {
    let h = TestHarness::new().await;
    let storage = h
        .manager
        .create_storage_allocation(&h.request("lab"), None)
        .await
        .unwrap();

    set_access_status(&h, &storage, AccessKind::ReadWrite, AllocationStatus::Active).await;
    let outcome = h.scheduler.promote_storage_allocation(&storage).await.unwrap();
    assert_eq!(outcome, PromotionOutcome::Waiting { not_active: 1 });

    set_access_status(&h, &storage, AccessKind::ReadOnly, AllocationStatus::Active).await;
    let outcome = h.scheduler.promote_storage_allocation(&storage).await.unwrap();
    assert!(outcome.is_promoted());

    // The caller's copy is stale; the store decides.
    let outcome = h.scheduler.promote_storage_allocation(&storage).await.unwrap();
    assert_eq!(outcome, PromotionOutcome::NotPending(AllocationStatus::Active));

    let stored = h.store.get_storage_allocation(storage.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AllocationStatus::Active);
}

#[tokio::test]
async fn test_expired_access_blocks_promotion() {
    let h = TestHarness::new().await;
    let storage = h
        .manager
        .create_storage_allocation(&h.request("lab"), None)
        .await
        .unwrap();
    set_access_status(&h, &storage, AccessKind::ReadWrite, AllocationStatus::Active).await;
    set_access_status(&h, &storage, AccessKind::ReadOnly, AllocationStatus::Expired).await;

    let report = h.scheduler.promote_pending_storage_allocations().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.waiting, 1);
    assert!(report.promoted.is_empty());
}

#[tokio::test]
async fn test_pending_allocation_is_provisioned_once_groups_exist() {
    let h = TestHarness::new().await;
    let storage = h
        .manager
        .create_storage_allocation(&h.request("lab"), None)
        .await
        .unwrap();
    assert!(!h.backend.exists(&format!("{ROOT}/lab")).await);

    let polled = h.scheduler.poll_pending_access_allocations().await.unwrap();
    assert_eq!(polled.activated, 2);

    let report = h.scheduler.promote_pending_storage_allocations().await.unwrap();
    assert_eq!(report.promoted, vec![storage.id]);
    assert!(report.activation_failures.is_empty());

    assert!(h.backend.exists(&format!("{ROOT}/lab/Active")).await);
    assert_eq!(h.backend.quota_limit(&format!("{ROOT}/lab")).await, Some(1 << 30));
    let active = h.backend.acl(&format!("{ROOT}/lab/Active")).await.unwrap();
    assert!(active.aces.iter().any(|a| a.trustee.name == "storage-lab-rw"));

    // Nothing left to promote.
    let again = h.scheduler.promote_pending_storage_allocations().await.unwrap();
    assert_eq!(again.checked, 0);
}

#[tokio::test]
async fn test_activation_failure_keeps_allocation_pending_for_retry() {
    let h = TestHarness::new().await;
    let storage = h
        .manager
        .create_storage_allocation(&h.request("lab"), None)
        .await
        .unwrap();
    h.scheduler.poll_pending_access_allocations().await.unwrap();
    h.backend.fail_acl_writes_at(&format!("{ROOT}/lab")).await;

    let report = h.scheduler.promote_pending_storage_allocations().await.unwrap();

    assert!(report.promoted.is_empty());
    assert_eq!(report.activation_failures, vec![storage.id]);
    let stored = h.store.get_storage_allocation(storage.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AllocationStatus::Pending);

    h.backend.clear_failures().await;
    let retried = h.scheduler.promote_pending_storage_allocations().await.unwrap();
    assert_eq!(retried.checked, 1);
    assert_eq!(retried.promoted, vec![storage.id]);
    assert!(retried.activation_failures.is_empty());

    let stored = h.store.get_storage_allocation(storage.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AllocationStatus::Active);
    let active = h.backend.acl(&format!("{ROOT}/lab/Active")).await.unwrap();
    assert!(active.aces.iter().any(|a| a.trustee.name == "storage-lab-ro"));
}

#[tokio::test]
async fn test_missing_read_only_access_blocks_promotion() {
    let h = TestHarness::new().await;
    let storage = StorageAllocation::new(h.project, "lab", format!("{ROOT}/lab"), 1 << 30);
    h.store.create_storage_allocation(&storage).await.unwrap();
    h.manager
        .create_access_allocation(&storage, AccessKind::ReadWrite, &["alice".to_string()])
        .await
        .unwrap();

    h.directory.set_group_creation_failing(true).await;
    let ro = h
        .manager
        .create_access_allocation(&storage, AccessKind::ReadOnly, &[])
        .await;
    assert!(ro.is_err());
    h.directory.set_group_creation_failing(false).await;

    let polled = h.scheduler.poll_pending_access_allocations().await.unwrap();
    assert_eq!(polled.activated, 1);

    let outcome = h.scheduler.promote_storage_allocation(&storage).await.unwrap();
    assert_eq!(outcome, PromotionOutcome::Waiting { not_active: 1 });
    let report = h.scheduler.promote_pending_storage_allocations().await.unwrap();
    assert_eq!(report.waiting, 1);
    assert!(report.activation_failures.is_empty());

    let stored = h.store.get_storage_allocation(storage.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AllocationStatus::Pending);
    assert!(!h.backend.exists(&format!("{ROOT}/lab")).await);

    // Once the RO side exists and its group is found, promotion proceeds.
    h.manager
        .create_access_allocation(&storage, AccessKind::ReadOnly, &["bob".to_string()])
        .await
        .unwrap();
    h.scheduler.poll_pending_access_allocations().await.unwrap();
    let report = h.scheduler.promote_pending_storage_allocations().await.unwrap();
    assert_eq!(report.promoted, vec![storage.id]);
}

#[tokio::test]
async fn test_storage_without_access_allocations_waits_on_both() {
    let h = TestHarness::new().await;
    let storage = StorageAllocation::new(h.project, "bare", format!("{ROOT}/bare"), 1 << 30);
    h.store.create_storage_allocation(&storage).await.unwrap();

    let outcome = h.scheduler.promote_storage_allocation(&storage).await.unwrap();
    assert_eq!(outcome, PromotionOutcome::Waiting { not_active: 2 });
}
