//! Quota usage ingestion.

use strata_core::{AllocationStore, QuotaUsageSample};

use crate::common::{ROOT, TestHarness, config};

#[tokio::test]
async fn test_sample_with_trailing_slash_matches_stored_path() {
    let h = TestHarness::new().await;
    let foo = h.active_allocation("foo").await;

    let samples = vec![
        QuotaUsageSample::new(format!("{ROOT}/foo/"), 1 << 30, 4096),
        QuotaUsageSample::new(format!("{ROOT}/nope/"), 100, 10),
    ];
    let report = h.scheduler.ingest_quota_usage(&samples).await.unwrap();

    assert_eq!(report.samples, 2);
    assert_eq!(report.recorded, 1);
    assert_eq!(report.dropped, vec![format!("{ROOT}/nope/")]);
    assert!(!report.is_complete());

    let usage = h
        .store
        .get_storage_allocation(foo.id)
        .await
        .unwrap()
        .unwrap()
        .usage
        .unwrap();
    assert_eq!(usage.used_bytes, 4096);
    assert_eq!(usage.limit_bytes, 1 << 30);
}

#[tokio::test]
async fn test_only_one_trailing_slash_is_ignored() {
    let h = TestHarness::new().await;
    let foo = h.active_allocation("foo").await;

    let samples = vec![QuotaUsageSample::new(format!("{ROOT}/foo//"), 1 << 30, 512)];
    let report = h.scheduler.ingest_quota_usage(&samples).await.unwrap();

    assert_eq!(report.recorded, 0);
    assert_eq!(report.dropped, vec![format!("{ROOT}/foo//")]);
    let stored = h.store.get_storage_allocation(foo.id).await.unwrap().unwrap();
    assert!(stored.usage.is_none());
}

#[tokio::test]
async fn test_pending_allocation_does_not_match() {
    let h = TestHarness::new().await;
    let pending = h
        .manager
        .create_storage_allocation(&h.request("bar"), None)
        .await
        .unwrap();

    let samples = vec![QuotaUsageSample::new(format!("{ROOT}/bar"), 1, 1)];
    let report = h.scheduler.ingest_quota_usage(&samples).await.unwrap();

    assert_eq!(report.recorded, 0);
    assert_eq!(report.dropped.len(), 1);
    let stored = h.store.get_storage_allocation(pending.id).await.unwrap().unwrap();
    assert!(stored.usage.is_none());
}

#[tokio::test]
async fn test_daily_ingest_pages_and_keeps_root_allocations() {
    let mut config = config();
    config.storage.quota_page_limit = 1;
    let h = TestHarness::with_config(config).await;

    let foo = h.active_allocation("foo").await;
    let bar = h.active_allocation("bar").await;
    h.sub_allocation(&foo, "sub").await;
    h.backend.set_quota_usage(&foo.path, 10).await.unwrap();
    h.backend.set_quota_usage(&bar.path, 20).await.unwrap();

    let fetched = h.scheduler.fetch_quota_usage().await.unwrap();
    assert_eq!(fetched.len(), 3);

    let report = h.scheduler.ingest_daily_quota_usage().await.unwrap();
    assert_eq!(report.samples, 2);
    assert_eq!(report.recorded, 2);
    assert!(report.is_complete());

    for (allocation, used) in [(&foo, 10), (&bar, 20)] {
        let stored = h
            .store
            .get_storage_allocation(allocation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.usage.unwrap().used_bytes, used);
    }
}

#[tokio::test(start_paused = true)]
async fn test_daily_ingest_retries_transient_failures() {
    let h = TestHarness::new().await;
    h.active_allocation("foo").await;

    h.backend.fail_next_quota_fetches(2).await;
    let report = h.scheduler.ingest_daily_quota_usage().await.unwrap();
    assert_eq!(report.recorded, 1);

    h.backend
        .fail_next_quota_fetches(h.config.storage.quota_fetch_attempts)
        .await;
    let err = h.scheduler.ingest_daily_quota_usage().await.unwrap_err();
    assert!(err.is_retryable());
}
