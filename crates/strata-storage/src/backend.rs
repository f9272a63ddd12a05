//! In-memory storage cluster.
//!
//! Models a filesystem tree with per-path ACLs, protocol exports, and
//! quotas. Directory listings and quota reports use the same formatting
//! quirks as the real cluster: directories come back with a trailing
//! slash.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use strata_core::paths::{join, trim_trailing_slash};
use strata_core::{
    Acl, DirectoryEntry, EntryKind, Error, Protocol, QuotaPage, QuotaUsageSample, Result,
    StorageBackend,
};

#[derive(Debug, Clone)]
struct Node {
    kind: EntryKind,
    acl: Acl,
}

#[derive(Debug, Clone, Copy)]
struct Quota {
    limit_bytes: u64,
    used_bytes: u64,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    exports: BTreeMap<(Protocol, String), String>,
    quotas: BTreeMap<String, Quota>,
    acl_writes: Vec<String>,
    failing_acl_paths: BTreeSet<String>,
    failing_listings: BTreeSet<String>,
    quota_fetch_failures: usize,
}

/// An in-memory [`StorageBackend`].
#[derive(Debug, Default)]
pub struct MemoryStorageBackend {
    state: RwLock<State>,
}

impl MemoryStorageBackend {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `path` and any missing parents as directories.
    pub async fn add_directory(&self, path: &str) {
        let mut state = self.state.write().await;
        let path = trim_trailing_slash(path);
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            state.nodes.entry(current.clone()).or_insert_with(|| Node {
                kind: EntryKind::Directory,
                acl: Acl::default(),
            });
        }
    }

    /// Creates a file at `path`, creating parent directories as needed.
    pub async fn add_file(&self, path: &str) {
        self.add_entry(path, EntryKind::File).await;
    }

    /// Creates an entry that is neither a file nor a directory.
    pub async fn add_special(&self, path: &str) {
        self.add_entry(path, EntryKind::Other).await;
    }

    async fn add_entry(&self, path: &str, kind: EntryKind) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_directory(parent).await;
        }
        self.state.write().await.nodes.insert(
            path.to_string(),
            Node {
                kind,
                acl: Acl::default(),
            },
        );
    }

    /// Returns the ACL currently stored at `path`.
    pub async fn acl(&self, path: &str) -> Option<Acl> {
        let state = self.state.read().await;
        state
            .nodes
            .get(trim_trailing_slash(path))
            .map(|n| n.acl.clone())
    }

    /// Every path `set_acl` has written, in write order.
    pub async fn acl_writes(&self) -> Vec<String> {
        self.state.read().await.acl_writes.clone()
    }

    /// Forgets the recorded `set_acl` writes.
    pub async fn clear_acl_writes(&self) {
        self.state.write().await.acl_writes.clear();
    }

    /// Makes `set_acl` on `path` fail with a transient error.
    pub async fn fail_acl_writes_at(&self, path: &str) {
        let mut state = self.state.write().await;
        state
            .failing_acl_paths
            .insert(trim_trailing_slash(path).to_string());
    }

    /// Makes `enumerate_directory` on `path` fail with a transient error.
    pub async fn fail_listing_at(&self, path: &str) {
        let mut state = self.state.write().await;
        state
            .failing_listings
            .insert(trim_trailing_slash(path).to_string());
    }

    /// Makes the next `count` quota-usage fetches fail.
    pub async fn fail_next_quota_fetches(&self, count: usize) {
        self.state.write().await.quota_fetch_failures = count;
    }

    /// Removes every injected failure.
    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.failing_acl_paths.clear();
        state.failing_listings.clear();
        state.quota_fetch_failures = 0;
    }

    /// Sets the bytes in use under an existing quota.
    pub async fn set_quota_usage(&self, fs_path: &str, used_bytes: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let quota = state
            .quotas
            .get_mut(trim_trailing_slash(fs_path))
            .ok_or_else(|| Error::not_found("quota", fs_path))?;
        quota.used_bytes = used_bytes;
        Ok(())
    }

    /// Quota limit on `fs_path`, if one exists.
    pub async fn quota_limit(&self, fs_path: &str) -> Option<u64> {
        let state = self.state.read().await;
        state
            .quotas
            .get(trim_trailing_slash(fs_path))
            .map(|q| q.limit_bytes)
    }

    /// Filesystem path exported over `protocol` under `key` (the NFS
    /// export path or the share/bucket name).
    pub async fn export(&self, protocol: Protocol, key: &str) -> Option<String> {
        let state = self.state.read().await;
        state.exports.get(&(protocol, key.to_string())).cloned()
    }

    /// Number of exports.
    pub async fn export_count(&self) -> usize {
        self.state.read().await.exports.len()
    }

    /// Returns `true` if `path` exists.
    pub async fn exists(&self, path: &str) -> bool {
        let state = self.state.read().await;
        state.nodes.contains_key(trim_trailing_slash(path))
    }
}

fn export_key(protocol: Protocol, export_path: Option<&str>, name: &str) -> Result<String> {
    match protocol {
        Protocol::Nfs => export_path
            .map(|p| trim_trailing_slash(p).to_string())
            .ok_or_else(|| Error::validation_field("export_path", "NFS exports need an export path")),
        Protocol::Smb | Protocol::S3 => Ok(name.to_string()),
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn get_acl(&self, path: &str) -> Result<Acl> {
        self.acl(path)
            .await
            .ok_or_else(|| Error::not_found("path", path))
    }

    async fn set_acl(&self, path: &str, acl: &Acl) -> Result<()> {
        let mut state = self.state.write().await;
        let key = trim_trailing_slash(path).to_string();
        if state.failing_acl_paths.contains(&key) {
            return Err(Error::backend(format!("set_acl failed for {key}")));
        }
        let node = state
            .nodes
            .get_mut(&key)
            .ok_or_else(|| Error::not_found("path", path))?;
        node.acl = acl.clone();
        state.acl_writes.push(key);
        Ok(())
    }

    async fn create_directory(&self, parent: &str, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        match state.nodes.get(trim_trailing_slash(parent)) {
            Some(node) if node.kind == EntryKind::Directory => {}
            _ => return Err(Error::not_found("path", parent)),
        }
        let path = join(parent, name);
        if state.nodes.contains_key(&path) {
            return Err(Error::conflict(format!("{path} already exists")));
        }
        state.nodes.insert(
            path,
            Node {
                kind: EntryKind::Directory,
                acl: Acl::default(),
            },
        );
        Ok(())
    }

    async fn create_export(
        &self,
        protocol: Protocol,
        fs_path: &str,
        export_path: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let key = export_key(protocol, export_path, name)?;
        let mut state = self.state.write().await;
        if state.exports.contains_key(&(protocol, key.clone())) {
            return Err(Error::conflict(format!("{protocol} export {key} already exists")));
        }
        state
            .exports
            .insert((protocol, key), trim_trailing_slash(fs_path).to_string());
        Ok(())
    }

    async fn delete_export(
        &self,
        protocol: Protocol,
        export_path: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let key = export_key(protocol, export_path, name)?;
        let mut state = self.state.write().await;
        state
            .exports
            .remove(&(protocol, key.clone()))
            .map(|_| ())
            .ok_or_else(|| Error::not_found("export", key))
    }

    async fn create_quota(&self, fs_path: &str, limit_bytes: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let key = trim_trailing_slash(fs_path).to_string();
        if !state.nodes.contains_key(&key) {
            return Err(Error::not_found("path", fs_path));
        }
        if state.quotas.contains_key(&key) {
            return Err(Error::conflict(format!("quota on {key} already exists")));
        }
        state.quotas.insert(
            key,
            Quota {
                limit_bytes,
                used_bytes: 0,
            },
        );
        Ok(())
    }

    async fn update_quota(&self, fs_path: &str, limit_bytes: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let quota = state
            .quotas
            .get_mut(trim_trailing_slash(fs_path))
            .ok_or_else(|| Error::not_found("quota", fs_path))?;
        quota.limit_bytes = limit_bytes;
        Ok(())
    }

    async fn delete_quota(&self, fs_path: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .quotas
            .remove(trim_trailing_slash(fs_path))
            .map(|_| ())
            .ok_or_else(|| Error::not_found("quota", fs_path))
    }

    async fn enumerate_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let state = self.state.read().await;
        let dir = trim_trailing_slash(path);
        if state.failing_listings.contains(dir) {
            return Err(Error::backend(format!("listing failed for {dir}")));
        }
        match state.nodes.get(dir) {
            Some(node) if node.kind == EntryKind::Directory => {}
            _ => return Err(Error::not_found("path", path)),
        }
        let prefix = format!("{dir}/");
        let entries = state
            .nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| !p[prefix.len()..].contains('/'))
            .map(|(p, node)| match node.kind {
                EntryKind::Directory => DirectoryEntry::directory(format!("{p}/")),
                kind => DirectoryEntry {
                    path: p.clone(),
                    kind,
                },
            })
            .collect();
        Ok(entries)
    }

    async fn quotas_with_usage(
        &self,
        page_limit: usize,
        cursor: Option<&str>,
    ) -> Result<QuotaPage> {
        let mut state = self.state.write().await;
        if state.quota_fetch_failures > 0 {
            state.quota_fetch_failures -= 1;
            return Err(Error::backend("quota listing unavailable"));
        }
        let offset = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| Error::validation_field("cursor", format!("bad cursor '{c}'")))?,
            None => 0,
        };
        let samples: Vec<QuotaUsageSample> = state
            .quotas
            .iter()
            .skip(offset)
            .take(page_limit.max(1))
            .map(|(path, q)| QuotaUsageSample::new(format!("{path}/"), q.limit_bytes, q.used_bytes))
            .collect();
        let consumed = offset + samples.len();
        let next = (consumed < state.quotas.len()).then(|| consumed.to_string());
        Ok(QuotaPage { samples, next })
    }
}
