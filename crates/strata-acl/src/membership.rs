//! Group membership synchronization.
//!
//! Usernames are split into chunks and each chunk runs as its own tokio
//! task, so one bad account never holds up the rest of a batch. Failures
//! are collected across all chunks and reported once.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;

use strata_core::{
    AccessAllocation, AllocationStore, DirectoryMember, Error, GroupDirectory, Notification,
    Notifier, Result, StrataConfig,
};

/// Outcome of an [`MembershipSync::add_users`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipReport {
    /// Accounts added to the group and recorded on the allocation.
    pub added: Vec<String>,

    /// Accounts the directory did not recognize.
    pub invalid: Vec<String>,

    /// Accounts that resolved but could not be added.
    pub failed: Vec<String>,

    /// Accounts whose directory lookup errored. Neither valid nor
    /// invalid; adding them again may succeed.
    pub unresolved: Vec<String>,
}

impl MembershipReport {
    /// Returns `true` if every requested account was added.
    pub fn is_complete(&self) -> bool {
        self.invalid.is_empty() && self.failed.is_empty() && self.unresolved.is_empty()
    }

    fn absorb(&mut self, other: MembershipReport) {
        self.added.extend(other.added);
        self.invalid.extend(other.invalid);
        self.failed.extend(other.failed);
        self.unresolved.extend(other.unresolved);
    }

    fn sort(&mut self) {
        self.added.sort();
        self.invalid.sort();
        self.failed.sort();
        self.unresolved.sort();
    }
}

/// Adds and removes access-group members.
#[derive(Clone)]
pub struct MembershipSync {
    directory: Arc<dyn GroupDirectory>,
    store: Arc<dyn AllocationStore>,
    notifier: Arc<dyn Notifier>,
    chunk_size: usize,
}

impl std::fmt::Debug for MembershipSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipSync")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl MembershipSync {
    /// Creates a membership synchronizer.
    pub fn new(
        config: &StrataConfig,
        directory: Arc<dyn GroupDirectory>,
        store: Arc<dyn AllocationStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            directory,
            store,
            notifier,
            chunk_size: config.directory.membership_chunk_size.max(1),
        }
    }

    /// Adds `usernames` to the allocation's group.
    ///
    /// Blank and duplicate names are ignored. At most one invalid-users and
    /// one failed-to-add notification is sent per call, before the added
    /// accounts are recorded on the access allocation. If recording fails
    /// the error is returned, but the group changes and notifications
    /// stand.
    pub async fn add_users(
        &self,
        access: &AccessAllocation,
        usernames: &[String],
    ) -> Result<MembershipReport> {
        let names: Vec<String> = usernames
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Ok(MembershipReport::default());
        }

        let mut tasks = JoinSet::new();
        for chunk in names.chunks(self.chunk_size) {
            let directory = Arc::clone(&self.directory);
            let group = access.group_name.clone();
            let chunk = chunk.to_vec();
            tasks.spawn(async move { add_chunk(directory, group, chunk).await });
        }

        let mut report = MembershipReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| Error::backend_with_source("membership task did not complete", e))?;
            report.absorb(outcome);
        }
        report.sort();

        tracing::info!(
            group = %access.group_name,
            added = report.added.len(),
            invalid = report.invalid.len(),
            failed = report.failed.len(),
            unresolved = report.unresolved.len(),
            "Membership batch complete"
        );

        if !report.invalid.is_empty() {
            self.send(Notification::InvalidUsers {
                access_allocation: access.id,
                kind: access.kind,
                usernames: report.invalid.clone(),
            })
            .await;
        }
        if !report.failed.is_empty() {
            self.send(Notification::FailedToAddUsers {
                access_allocation: access.id,
                kind: access.kind,
                usernames: report.failed.clone(),
            })
            .await;
        }
        if !report.unresolved.is_empty() {
            tracing::warn!(
                group = %access.group_name,
                usernames = ?report.unresolved,
                "Account lookups failed; these users were not added"
            );
        }

        // Notifications above go out even if recording fails.
        if !report.added.is_empty() {
            self.record_users(access, |users| users.extend(report.added.iter().cloned()))
                .await?;
        }

        Ok(report)
    }

    /// Removes `username` from the allocation's group and its record.
    ///
    /// An account that is already absent from the group is not an error.
    pub async fn remove_user(&self, access: &AccessAllocation, username: &str) -> Result<()> {
        match self
            .directory
            .remove_member(&access.group_name, username)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!(group = %access.group_name, username, "Member already absent");
            }
            Err(e) => return Err(e),
        }
        self.record_users(access, |users| {
            users.remove(username);
        })
        .await
    }

    async fn record_users<F>(&self, access: &AccessAllocation, update: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeSet<String>),
    {
        let mut current = self
            .store
            .get_access_allocation(access.id)
            .await?
            .ok_or_else(|| Error::not_found("access allocation", access.id.to_string()))?;
        update(&mut current.users);
        self.store.update_access_allocation(&current).await
    }

    async fn send(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(error = %e, "Failed to send membership notification");
        }
    }
}

async fn add_chunk(
    directory: Arc<dyn GroupDirectory>,
    group: String,
    usernames: Vec<String>,
) -> MembershipReport {
    let mut report = MembershipReport::default();
    let mut resolved: Vec<DirectoryMember> = Vec::with_capacity(usernames.len());

    for username in usernames {
        match directory.resolve_member(&username).await {
            Ok(Some(member)) => resolved.push(member),
            Ok(None) => report.invalid.push(username),
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "Account lookup failed");
                report.unresolved.push(username);
            }
        }
    }

    if resolved.is_empty() {
        return report;
    }

    match directory.add_members(&group, &resolved).await {
        Ok(()) => report
            .added
            .extend(resolved.into_iter().map(|m| m.account)),
        Err(e) => {
            tracing::error!(group = %group, error = %e, "Error adding users to group");
            report
                .failed
                .extend(resolved.into_iter().map(|m| m.account));
        }
    }
    report
}
