//! Group polling and expiration.

use chrono::{TimeDelta, Utc};
use std::time::Duration;

use strata_core::{AccessAllocation, AccessKind, AllocationStatus, AllocationStore, StorageAllocation};

use crate::common::{ROOT, TestHarness};

const HOUR: Duration = Duration::from_secs(3600);

async fn pending_access(h: &TestHarness, age_secs: i64) -> AccessAllocation {
    let storage = StorageAllocation::new(h.project, "lab", format!("{ROOT}/lab"), 1);
    h.store.create_storage_allocation(&storage).await.unwrap();
    let access = AccessAllocation::new(&storage, AccessKind::ReadWrite)
        .with_created(Utc::now() - TimeDelta::seconds(age_secs));
    h.store.create_access_allocation(&access).await.unwrap();
    access
}

async fn stored_status(h: &TestHarness, access: &AccessAllocation) -> AllocationStatus {
    h.store
        .get_access_allocation(access.id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_missing_group_within_expiration_stays_pending() {
    let h = TestHarness::new().await;
    let access = pending_access(&h, 1800).await;

    let status = h.scheduler.poll_access_allocation(&access, HOUR).await.unwrap();

    assert_eq!(status, AllocationStatus::Pending);
    assert_eq!(stored_status(&h, &access).await, AllocationStatus::Pending);
}

#[tokio::test]
async fn test_missing_group_after_expiration_expires() {
    let h = TestHarness::new().await;
    let access = pending_access(&h, 3700).await;

    let status = h.scheduler.poll_access_allocation(&access, HOUR).await.unwrap();

    assert_eq!(status, AllocationStatus::Expired);
    assert_eq!(stored_status(&h, &access).await, AllocationStatus::Expired);
}

#[tokio::test]
async fn test_found_group_activates_at_any_age() {
    for age in [0, 1800, 3700, 86_400 * 30] {
        let h = TestHarness::new().await;
        let access = pending_access(&h, age).await;
        h.directory.insert_group(&access.group_name).await;

        let status = h.scheduler.poll_access_allocation(&access, HOUR).await.unwrap();

        assert_eq!(status, AllocationStatus::Active, "age {age}");
        assert_eq!(stored_status(&h, &access).await, AllocationStatus::Active);
    }
}

#[tokio::test]
async fn test_lookup_failure_counts_as_not_found() {
    let h = TestHarness::new().await;
    let young = pending_access(&h, 60).await;
    h.directory.insert_group(&young.group_name).await;
    h.directory.set_lookups_failing(true).await;

    let now = young.created + TimeDelta::seconds(60);
    let status = h
        .scheduler
        .poll_access_allocation_at(&young, HOUR, now)
        .await
        .unwrap();
    assert_eq!(status, AllocationStatus::Pending);

    let later = young.created + TimeDelta::seconds(3600);
    let status = h
        .scheduler
        .poll_access_allocation_at(&young, HOUR, later)
        .await
        .unwrap();
    assert_eq!(status, AllocationStatus::Expired);
}

#[tokio::test]
async fn test_expired_allocation_is_left_alone() {
    let h = TestHarness::new().await;
    let access = pending_access(&h, 3700).await;
    h.scheduler.poll_access_allocation(&access, HOUR).await.unwrap();

    let mut expired = access.clone();
    expired.status = AllocationStatus::Expired;
    h.directory.insert_group(&access.group_name).await;

    let status = h.scheduler.poll_access_allocation(&expired, HOUR).await.unwrap();
    assert_eq!(status, AllocationStatus::Expired);
    assert_eq!(stored_status(&h, &access).await, AllocationStatus::Expired);
}

#[tokio::test]
async fn test_poll_pending_uses_configured_expiration() {
    let h = TestHarness::new().await;
    assert_eq!(
        h.scheduler.group_expiration(),
        Duration::from_secs(h.config.reconcile.group_expiration_secs)
    );

    let storage = StorageAllocation::new(h.project, "lab", format!("{ROOT}/lab"), 1);
    h.store.create_storage_allocation(&storage).await.unwrap();
    let found = AccessAllocation::new(&storage, AccessKind::ReadWrite);
    let stale = AccessAllocation::new(&storage, AccessKind::ReadOnly)
        .with_created(Utc::now() - TimeDelta::days(30));
    h.store.create_access_allocation(&found).await.unwrap();
    h.store.create_access_allocation(&stale).await.unwrap();
    h.directory.insert_group(&found.group_name).await;

    let report = h.scheduler.poll_pending_access_allocations().await.unwrap();

    assert_eq!(report.checked, 2);
    assert_eq!(report.activated, 1);
    assert_eq!(report.expired, 1);
    assert_eq!(report.pending, 0);

    let again = h.scheduler.poll_pending_access_allocations().await.unwrap();
    assert_eq!(again.checked, 0);
}
