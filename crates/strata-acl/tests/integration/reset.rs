//! AclResetEngine walks.

use strata_acl::{AceCatalog, AclResetEngine};
use strata_core::{AceFlag, StorageAllocation};

use crate::common::{ROOT, TestHarness};

/// `foo` with sub-allocation `foo-bar` and some content in both.
async fn tree(h: &TestHarness) -> (StorageAllocation, StorageAllocation) {
    let foo = h.root_allocation("foo").await;
    let bar = h.sub_allocation(&foo, "bar").await;

    for file in [
        "foo/Active/a.txt",
        "foo/Active/dir1/b.txt",
        "foo/Active/foo-bar/c.txt",
        "foo/Active/foo-bar/inner/d.txt",
        "foo/Active/foo-bar2/e.txt",
    ] {
        h.backend.add_file(&format!("{ROOT}/{file}")).await;
    }
    h.backend.clear_acl_writes().await;
    (foo, bar)
}

#[tokio::test]
async fn test_root_reset_skips_sub_allocation_subtree() {
    let h = TestHarness::new().await;
    let (foo, _) = tree(&h).await;

    let engine = AclResetEngine::new(&h.manager, foo).await.unwrap();
    assert_eq!(engine.content_path(), format!("{ROOT}/foo/Active"));
    assert_eq!(engine.exclusions(), [format!("{ROOT}/foo/Active/foo-bar")]);

    let report = engine.run().await.unwrap();

    assert_eq!(report.files, 3);
    assert_eq!(report.directories, 2);
    assert_eq!(report.excluded, 1);

    let sub = format!("{ROOT}/foo/Active/foo-bar");
    let walked: Vec<String> = h
        .backend
        .acl_writes()
        .await
        .into_iter()
        .skip_while(|p| !p.ends_with("a.txt"))
        .collect();
    assert_eq!(
        walked,
        vec![
            format!("{ROOT}/foo/Active/a.txt"),
            format!("{ROOT}/foo/Active/dir1"),
            format!("{ROOT}/foo/Active/dir1/b.txt"),
            format!("{ROOT}/foo/Active/foo-bar2"),
            format!("{ROOT}/foo/Active/foo-bar2/e.txt"),
        ]
    );
    assert!(
        walked
            .iter()
            .all(|p| p != &sub && !p.starts_with(&format!("{sub}/")))
    );
}

#[tokio::test]
async fn test_root_reset_clears_then_reapplies_top_level() {
    let h = TestHarness::new().await;
    let (foo, _) = tree(&h).await;

    AclResetEngine::new(&h.manager, foo).await.unwrap().run().await.unwrap();

    let writes = h.backend.acl_writes().await;
    assert_eq!(writes[0], format!("{ROOT}/foo"));
    assert_eq!(writes[1], format!("{ROOT}/foo/Active"));

    let active = h.backend.acl(&format!("{ROOT}/foo/Active")).await.unwrap();
    assert!(
        active
            .aces
            .iter()
            .any(|a| a.trustee.name == "storage-foo-rw" && a.flags.contains(&AceFlag::ContainerInherit))
    );
    // Sub-allocation traverse entries are restored on the parent.
    assert!(
        active
            .aces
            .iter()
            .any(|a| a.trustee.name == "storage-foo-bar-rw" && a.flags.is_empty())
    );
}

#[tokio::test]
async fn test_entries_get_existing_shapes() {
    let h = TestHarness::new().await;
    let (foo, _) = tree(&h).await;
    AclResetEngine::new(&h.manager, foo).await.unwrap().run().await.unwrap();

    let catalog = h.manager.catalog();
    let file = h
        .backend
        .acl(&format!("{ROOT}/foo/Active/a.txt"))
        .await
        .unwrap();
    assert_eq!(
        file.aces,
        catalog.existing_file_aces("storage-foo-rw", "storage-foo-ro")
    );

    let dir = h
        .backend
        .acl(&format!("{ROOT}/foo/Active/dir1"))
        .await
        .unwrap();
    assert_eq!(
        dir.aces,
        catalog.existing_directory_aces("storage-foo-rw", "storage-foo-ro")
    );
    assert_eq!(dir.control, AceCatalog::base_acl().control);
}

#[tokio::test]
async fn test_sub_reset_appends_parent_aces() {
    let h = TestHarness::new().await;
    let (_, bar) = tree(&h).await;

    let engine = AclResetEngine::new(&h.manager, bar).await.unwrap();
    assert!(engine.exclusions().is_empty());
    let report = engine.run().await.unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.directories, 1);

    let file = h
        .backend
        .acl(&format!("{ROOT}/foo/Active/foo-bar/c.txt"))
        .await
        .unwrap();
    let trustees: Vec<&str> = file.aces.iter().map(|a| a.trustee.name.as_str()).collect();
    assert!(trustees.contains(&"storage-foo-bar-rw"));
    assert!(trustees.contains(&"storage-foo-rw"));

    let dir = h
        .backend
        .acl(&format!("{ROOT}/foo/Active/foo-bar/inner"))
        .await
        .unwrap();
    assert!(dir.aces.iter().any(|a| {
        a.trustee.name == "storage-foo-ro" && a.flags.contains(&AceFlag::ObjectInherit)
    }));

    let top = h
        .backend
        .acl(&format!("{ROOT}/foo/Active/foo-bar"))
        .await
        .unwrap();
    assert!(top.aces.iter().any(|a| a.trustee.name == "storage-foo-rw"));
}

#[tokio::test]
async fn test_special_entries_are_skipped() {
    let h = TestHarness::new().await;
    let (foo, _) = tree(&h).await;
    h.backend
        .add_special(&format!("{ROOT}/foo/Active/link"))
        .await;

    let report = AclResetEngine::new(&h.manager, foo)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert!(
        !h.backend
            .acl_writes()
            .await
            .contains(&format!("{ROOT}/foo/Active/link"))
    );
}

#[tokio::test]
async fn test_failed_walk_can_be_rerun() {
    let h = TestHarness::new().await;
    let (foo, _) = tree(&h).await;
    h.backend
        .fail_acl_writes_at(&format!("{ROOT}/foo/Active/dir1/b.txt"))
        .await;

    let engine = AclResetEngine::new(&h.manager, foo).await.unwrap();
    assert!(engine.run().await.is_err());
    // Later siblings were not reached.
    assert!(
        !h.backend
            .acl_writes()
            .await
            .contains(&format!("{ROOT}/foo/Active/foo-bar2"))
    );

    h.backend.clear_failures().await;
    engine.run().await.unwrap();
    let first = h.backend.acl(&format!("{ROOT}/foo/Active")).await.unwrap();
    engine.run().await.unwrap();
    let second = h.backend.acl(&format!("{ROOT}/foo/Active")).await.unwrap();
    assert_eq!(first, second);
}
