//! Recursive ACL reset over an allocation's directory tree.
//!
//! A reset clears the allocation's top-level ACLs, re-applies the
//! canonical allocation ACLs, then walks the content tree and rewrites the
//! ACL of every file and directory to the shape it would have inherited.
//!
//! The walk is sequential and depth-first: a directory's ACL is always
//! written before anything inside it is listed. Sub-allocation subtrees
//! are skipped when resetting a root allocation; they are reset on their
//! own. Nothing is checkpointed, so a failed run should simply be run
//! again.

use serde::Serialize;

use strata_core::paths::{ACTIVE_DIR, is_within, join, trim_trailing_slash};
use strata_core::{AceEntry, DirectoryEntry, EntryKind, Result, StorageAllocation};

use crate::catalog::AceCatalog;
use crate::manager::AclAllocationManager;
use crate::merge::merge;

/// Counts from one reset run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Files rewritten.
    pub files: usize,

    /// Directories rewritten.
    pub directories: usize,

    /// Entries left alone because they are neither files nor directories.
    pub skipped: usize,

    /// Entries left alone because they belong to a sub-allocation.
    pub excluded: usize,
}

#[derive(Debug, Clone)]
struct ParentGroups {
    rw: String,
    ro: String,
}

/// One reset run for one storage allocation.
#[derive(Debug)]
pub struct AclResetEngine<'a> {
    manager: &'a AclAllocationManager,
    allocation: StorageAllocation,
    path: String,
    content_path: String,
    is_root: bool,
    rw_group: String,
    ro_group: String,
    exclusions: Vec<String>,
    sub_allocations: Vec<StorageAllocation>,
    parent: Option<ParentGroups>,
}

impl<'a> AclResetEngine<'a> {
    /// Prepares a reset of `allocation`.
    ///
    /// For a root allocation this collects its sub-allocations' paths as
    /// exclusions; for a sub-allocation it looks up the parent's groups.
    pub async fn new(manager: &'a AclAllocationManager, allocation: StorageAllocation) -> Result<Self> {
        let path = trim_trailing_slash(&allocation.path).to_string();
        let is_root = manager.is_base_allocation(&path);
        let content_path = manager.root().content_path(&path);
        let (rw_group, ro_group) = manager.group_names(&allocation).await?;

        let mut exclusions = Vec::new();
        let mut sub_allocations = Vec::new();
        let mut parent = None;

        if is_root {
            sub_allocations = manager.store().children_of(allocation.id).await?;
            exclusions = sub_allocations
                .iter()
                .map(|s| trim_trailing_slash(&s.path).to_string())
                .collect();
        } else if let Some(p) = manager.store().parent_of(allocation.id).await? {
            let (rw, ro) = manager.group_names(&p).await?;
            parent = Some(ParentGroups { rw, ro });
        }

        Ok(Self {
            manager,
            allocation,
            path,
            content_path,
            is_root,
            rw_group,
            ro_group,
            exclusions,
            sub_allocations,
            parent,
        })
    }

    /// Where the walk starts.
    pub fn content_path(&self) -> &str {
        &self.content_path
    }

    /// Subtrees this run leaves alone.
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// Sub-allocations found while preparing a root allocation reset.
    pub fn sub_allocations(&self) -> &[StorageAllocation] {
        &self.sub_allocations
    }

    /// Runs the reset.
    pub async fn run(&self) -> Result<ResetReport> {
        let backend = self.manager.backend();
        let base = AceCatalog::base_acl();

        if self.is_root {
            backend.set_acl(&self.path, &base).await?;
            backend.set_acl(&join(&self.path, ACTIVE_DIR), &base).await?;
        } else {
            backend.set_acl(&self.path, &base).await?;
        }

        self.manager.reset_allocation_acls(&self.allocation).await?;

        tracing::info!(
            allocation_id = %self.allocation.id,
            path = %self.content_path,
            exclusions = self.exclusions.len(),
            "Starting ACL reset walk"
        );

        let file_acl = base.clone().with_aces(self.file_aces());
        let directory_acl = base.with_aces(self.directory_aces());
        let mut report = ResetReport::default();

        let mut stack = self.listing(&self.content_path, &mut report).await?;
        stack.reverse();

        while let Some(entry) = stack.pop() {
            match entry.kind {
                EntryKind::File => {
                    backend.set_acl(&entry.path, &file_acl).await?;
                    report.files += 1;
                }
                EntryKind::Directory => {
                    backend.set_acl(&entry.path, &directory_acl).await?;
                    report.directories += 1;
                    let children = self.listing(&entry.path, &mut report).await?;
                    stack.extend(children.into_iter().rev());
                }
                EntryKind::Other => {
                    tracing::warn!(path = %entry.path, "Skipping entry that is neither file nor directory");
                    report.skipped += 1;
                }
            }
            tracing::debug!(path = %entry.path, "Entry reset");
        }

        tracing::info!(
            allocation_id = %self.allocation.id,
            files = report.files,
            directories = report.directories,
            skipped = report.skipped,
            excluded = report.excluded,
            "ACL reset walk complete"
        );
        Ok(report)
    }

    fn file_aces(&self) -> Vec<AceEntry> {
        let mut aces = self
            .manager
            .catalog()
            .existing_file_aces(&self.rw_group, &self.ro_group);
        if let Some(parent) = &self.parent {
            aces.extend(AceCatalog::parent_file_aces(&parent.rw, &parent.ro));
        }
        merge(&[], &aces)
    }

    fn directory_aces(&self) -> Vec<AceEntry> {
        let mut aces = self
            .manager
            .catalog()
            .existing_directory_aces(&self.rw_group, &self.ro_group);
        if let Some(parent) = &self.parent {
            aces.extend(AceCatalog::allocation_aces(&parent.rw, &parent.ro));
        }
        merge(&[], &aces)
    }

    /// Children of `path`, normalized, sorted, and with excluded subtrees
    /// removed.
    async fn listing(&self, path: &str, report: &mut ResetReport) -> Result<Vec<DirectoryEntry>> {
        let mut entries: Vec<DirectoryEntry> = self
            .manager
            .backend()
            .enumerate_directory(path)
            .await?
            .into_iter()
            .map(|mut e| {
                e.path = trim_trailing_slash(&e.path).to_string();
                e
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let before = entries.len();
        entries.retain(|e| !self.is_excluded(&e.path));
        report.excluded += before - entries.len();
        Ok(entries)
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclusions.iter().any(|prefix| is_within(path, prefix))
    }
}
