//! Configuration for Strata components.
//!
//! A single [`StrataConfig`] is loaded once (TOML file plus `STRATA_*`
//! environment overrides) and handed to each component's constructor.
//!
//! ```toml
//! [storage]
//! root = "/storage2/fs1"
//! admin_group = "storage-admins"
//!
//! [reconcile]
//! group_expiration_secs = 86400
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::StorageRoot;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STRATA_CONFIG";

const SECONDS_IN_A_DAY: u64 = 24 * 60 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Group directory settings.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Reconciliation cadence and timeouts.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Storage backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root under which root allocations are created.
    pub root: StorageRoot,

    /// Administrator group granted access to every allocation.
    #[serde(default = "default_admin_group")]
    pub admin_group: String,

    /// Page size when listing quota usage.
    #[serde(default = "default_quota_page_limit")]
    pub quota_page_limit: usize,

    /// Attempts made to fetch quota usage before giving up.
    #[serde(default = "default_quota_fetch_attempts")]
    pub quota_fetch_attempts: usize,

    /// Delay between quota-usage fetch attempts.
    #[serde(default = "default_quota_fetch_backoff_secs")]
    pub quota_fetch_backoff_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: StorageRoot::default(),
            admin_group: default_admin_group(),
            quota_page_limit: default_quota_page_limit(),
            quota_fetch_attempts: default_quota_fetch_attempts(),
            quota_fetch_backoff_secs: default_quota_fetch_backoff_secs(),
        }
    }
}

/// Group directory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Usernames handled per membership task.
    #[serde(default = "default_membership_chunk_size")]
    pub membership_chunk_size: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            membership_chunk_size: default_membership_chunk_size(),
        }
    }
}

/// Reconciliation cadence and timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// How long a Pending access allocation may wait for its group.
    #[serde(default = "default_group_expiration_secs")]
    pub group_expiration_secs: u64,

    /// Group polling cadence.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Storage allocation promotion cadence.
    #[serde(default = "default_poll_interval_secs")]
    pub promote_interval_secs: u64,

    /// Quota usage ingestion cadence.
    #[serde(default = "default_quota_ingest_interval_secs")]
    pub quota_ingest_interval_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            group_expiration_secs: default_group_expiration_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            promote_interval_secs: default_poll_interval_secs(),
            quota_ingest_interval_secs: default_quota_ingest_interval_secs(),
        }
    }
}

impl ReconcileConfig {
    /// Group polling timeout as a `Duration`.
    pub fn group_expiration(&self) -> Duration {
        Duration::from_secs(self.group_expiration_secs)
    }
}

fn default_admin_group() -> String {
    "storage-admins".to_string()
}

fn default_quota_page_limit() -> usize {
    2000
}

fn default_quota_fetch_attempts() -> usize {
    3
}

fn default_quota_fetch_backoff_secs() -> u64 {
    15
}

fn default_membership_chunk_size() -> usize {
    50
}

fn default_group_expiration_secs() -> u64 {
    SECONDS_IN_A_DAY
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_quota_ingest_interval_secs() -> u64 {
    SECONDS_IN_A_DAY
}

impl StrataConfig {
    /// Project name used for the config directory.
    pub fn project_name() -> &'static str {
        "strata"
    }

    /// `<platform config dir>/strata/config.toml`, if the platform has one.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::project_name()).join("config.toml"))
    }

    /// Resolves the config path: explicit argument, then `STRATA_CONFIG`,
    /// then the platform default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_config_path)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Loads the configuration the way hosts should.
    ///
    /// Reads the resolved file when it exists (defaults otherwise), applies
    /// process environment overrides, and validates the result.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) if explicit.is_some() => {
                return Err(Error::config(format!(
                    "Config file does not exist at {}",
                    path.display()
                )));
            }
            _ => Self::default(),
        };
        config.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(root = %config.storage.root, "Configuration loaded");
        Ok(config)
    }

    /// Applies `STRATA_*` overrides using `lookup` to read variables.
    ///
    /// Blank values are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get("STRATA_STORAGE_ROOT") {
            self.storage.root = StorageRoot::new(root)?;
        }
        if let Some(group) = get("STRATA_ADMIN_GROUP") {
            self.storage.admin_group = group.trim().to_string();
        }
        if let Some(limit) = get("STRATA_QUOTA_PAGE_LIMIT") {
            self.storage.quota_page_limit = limit.trim().parse().map_err(|_| {
                Error::config(format!("STRATA_QUOTA_PAGE_LIMIT must be a number, got '{limit}'"))
            })?;
        }
        Ok(())
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.storage.admin_group.trim().is_empty() {
            return Err(Error::config("storage.admin_group must not be empty"));
        }
        if self.storage.quota_page_limit == 0 {
            return Err(Error::config("storage.quota_page_limit must be positive"));
        }
        if self.storage.quota_fetch_attempts == 0 {
            return Err(Error::config("storage.quota_fetch_attempts must be positive"));
        }
        if self.directory.membership_chunk_size == 0 {
            return Err(Error::config(
                "directory.membership_chunk_size must be positive",
            ));
        }
        Ok(())
    }

    /// Serializes to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }
}
