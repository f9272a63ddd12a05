//! In-memory group directory.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use strata_core::{DirectoryMember, Error, GroupDirectory, Result};

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, BTreeSet<String>>,
    accounts: BTreeSet<String>,
    failing_accounts: BTreeSet<String>,
    unresolvable_accounts: BTreeSet<String>,
    fail_lookups: bool,
    fail_group_creation: bool,
}

/// An in-memory [`GroupDirectory`].
///
/// Accounts must be registered with [`MemoryGroupDirectory::add_account`]
/// before they resolve. Existing groups resolve as group members.
#[derive(Debug, Default)]
pub struct MemoryGroupDirectory {
    state: RwLock<State>,
}

impl MemoryGroupDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers user accounts.
    pub async fn add_accounts<I, S>(&self, accounts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write().await;
        state.accounts.extend(accounts.into_iter().map(Into::into));
    }

    /// Registers one user account.
    pub async fn add_account(&self, account: &str) {
        self.add_accounts([account]).await;
    }

    /// Creates a group out of band, as the directory's own provisioning
    /// would.
    pub async fn insert_group(&self, name: &str) {
        let mut state = self.state.write().await;
        state.groups.entry(name.to_string()).or_default();
    }

    /// Deletes a group out of band.
    pub async fn drop_group(&self, name: &str) {
        self.state.write().await.groups.remove(name);
    }

    /// Members of `group`, if it exists.
    pub async fn members(&self, group: &str) -> Option<BTreeSet<String>> {
        self.state.read().await.groups.get(group).cloned()
    }

    /// Makes every `add_members` call that includes `account` fail.
    pub async fn fail_adds_for(&self, account: &str) {
        let mut state = self.state.write().await;
        state.failing_accounts.insert(account.to_string());
    }

    /// Makes `resolve_member` fail with a transient error for `account`.
    pub async fn fail_resolves_for(&self, account: &str) {
        let mut state = self.state.write().await;
        state.unresolvable_accounts.insert(account.to_string());
    }

    /// Makes `lookup_group` fail with a transient error.
    pub async fn set_lookups_failing(&self, failing: bool) {
        self.state.write().await.fail_lookups = failing;
    }

    /// Makes `create_group` fail with a transient error.
    pub async fn set_group_creation_failing(&self, failing: bool) {
        self.state.write().await.fail_group_creation = failing;
    }
}

fn dn(name: &str, is_group: bool) -> String {
    let ou = if is_group { "Groups" } else { "Users" };
    format!("CN={name},OU={ou},DC=accounts,DC=example")
}

#[async_trait]
impl GroupDirectory for MemoryGroupDirectory {
    async fn create_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_group_creation {
            return Err(Error::backend(format!("directory refused to create {name}")));
        }
        if state.groups.contains_key(name) {
            return Err(Error::conflict(format!("group {name} already exists")));
        }
        state.groups.insert(name.to_string(), BTreeSet::new());
        Ok(())
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("group", name))
    }

    async fn lookup_group(&self, name: &str) -> Result<bool> {
        let state = self.state.read().await;
        if state.fail_lookups {
            return Err(Error::backend("directory unavailable"));
        }
        Ok(state.groups.contains_key(name))
    }

    async fn resolve_member(&self, account: &str) -> Result<Option<DirectoryMember>> {
        let state = self.state.read().await;
        if state.unresolvable_accounts.contains(account) {
            return Err(Error::backend(format!("directory lookup of {account} timed out")));
        }
        let is_group = state.groups.contains_key(account);
        if !is_group && !state.accounts.contains(account) {
            return Ok(None);
        }
        Ok(Some(DirectoryMember {
            account: account.to_string(),
            dn: dn(account, is_group),
            is_group,
        }))
    }

    async fn add_members(&self, group: &str, members: &[DirectoryMember]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(bad) = members
            .iter()
            .find(|m| state.failing_accounts.contains(&m.account))
        {
            return Err(Error::backend(format!(
                "could not add {} to {group}",
                bad.account
            )));
        }
        let entry = state
            .groups
            .get_mut(group)
            .ok_or_else(|| Error::not_found("group", group))?;
        entry.extend(members.iter().map(|m| m.account.clone()));
        Ok(())
    }

    async fn remove_member(&self, group: &str, account: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .groups
            .get_mut(group)
            .ok_or_else(|| Error::not_found("group", group))?;
        if !entry.remove(account) {
            return Err(Error::not_found("member", account));
        }
        Ok(())
    }
}
