//! Allocation tree resets.

use crate::common::{ROOT, TestHarness};

#[tokio::test]
async fn test_reset_tree_with_and_without_subs() {
    let h = TestHarness::new().await;
    let foo = h.active_allocation("foo").await;
    let sub = h.sub_allocation(&foo, "bar").await;
    h.backend.add_file(&format!("{ROOT}/foo/Active/top.txt")).await;
    h.backend
        .add_file(&format!("{ROOT}/foo/Active/foo-bar/inner.txt"))
        .await;

    let reports = h.scheduler.reset_allocation_tree(&foo, false).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, foo.id);
    assert_eq!(reports[0].1.files, 1);
    assert_eq!(reports[0].1.excluded, 1);

    let reports = h.scheduler.reset_allocation_tree(&foo, true).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].0, sub.id);
    assert_eq!(reports[1].1.files, 1);

    let inner = h
        .backend
        .acl(&format!("{ROOT}/foo/Active/foo-bar/inner.txt"))
        .await
        .unwrap();
    assert!(inner.aces.iter().any(|a| a.trustee.name == "storage-foo-bar-rw"));
}
