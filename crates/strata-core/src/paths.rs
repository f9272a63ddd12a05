//! Path rules relative to the configured storage root.
//!
//! Root allocations live exactly one segment below the storage root
//! (`<root>/<name>`) and keep their content in `<root>/<name>/Active`.
//! Sub-allocations live at `<parent>/Active/<name>` and keep content in
//! their own directory.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory inside a root allocation that holds its content and
/// sub-allocations.
pub const ACTIVE_DIR: &str = "Active";

/// Strips trailing slashes, leaving a lone `/` alone.
pub fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Returns `true` if `path` is `prefix` or lies below it.
///
/// Matching is segment-aware: `/a/sub2` is not within `/a/sub`.
pub fn is_within(path: &str, prefix: &str) -> bool {
    let path = trim_trailing_slash(path);
    let prefix = trim_trailing_slash(prefix);
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Joins a directory and a child name with exactly one slash.
pub fn join(dir: &str, name: &str) -> String {
    format!(
        "{}/{}",
        trim_trailing_slash(dir).trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

/// The configured storage root, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageRoot(String);

impl StorageRoot {
    /// Validates and normalizes a storage root.
    ///
    /// Surrounding whitespace and trailing slashes are dropped. The root
    /// must be absolute and must not be `/` itself.
    pub fn new(root: impl AsRef<str>) -> Result<Self> {
        let raw = root.as_ref().trim();
        if !raw.starts_with('/') {
            return Err(Error::config(format!(
                "storage root must be an absolute path, got '{raw}'"
            )));
        }
        let normalized = raw.trim_end_matches('/');
        if normalized.is_empty() {
            return Err(Error::config("storage root must not be '/'"));
        }
        Ok(Self(normalized.to_string()))
    }

    /// The root without a trailing slash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` iff `path` is exactly one segment below the root.
    ///
    /// A single trailing slash on `path` is ignored.
    pub fn is_base_allocation(&self, path: &str) -> bool {
        let path = path.strip_suffix('/').unwrap_or(path);
        match path.rsplit_once('/') {
            Some((parent, name)) => parent == self.0 && !name.is_empty(),
            None => false,
        }
    }

    /// Where an allocation's content lives: `<path>/Active` for root
    /// allocations, the path itself otherwise.
    pub fn content_path(&self, path: &str) -> String {
        let trimmed = trim_trailing_slash(path);
        if self.is_base_allocation(trimmed) {
            join(trimmed, ACTIVE_DIR)
        } else {
            trimmed.to_string()
        }
    }

    /// Returns `true` if `path` lies strictly below the root.
    pub fn contains(&self, path: &str) -> bool {
        is_within(path, &self.0) && trim_trailing_slash(path) != self.0
    }

    /// Every directory strictly between the root and `path`, outermost
    /// first.
    ///
    /// `path` itself and the root are never included. Paths outside the
    /// root have no ancestors here.
    pub fn ancestors_below_root(&self, path: &str) -> Vec<String> {
        let path = trim_trailing_slash(path);
        if !self.contains(path) {
            return Vec::new();
        }
        let start = self.0.len() + 1;
        path.char_indices()
            .filter(|(i, c)| *c == '/' && *i > start)
            .map(|(i, _)| path[..i].to_string())
            .collect()
    }

    /// Composes the filesystem path for a new allocation.
    ///
    /// Root allocations go under the storage root; sub-allocations under
    /// `<parent path>/Active`. A requested path already under that base is
    /// used as-is (minus trailing slashes).
    pub fn compose_allocation_path(&self, requested: &str, parent_path: Option<&str>) -> String {
        let base = match parent_path {
            Some(parent) => join(parent, ACTIVE_DIR),
            None => self.0.clone(),
        };
        let requested = requested.trim();
        if is_within(requested, &base) {
            trim_trailing_slash(requested).to_string()
        } else {
            join(&base, trim_trailing_slash(requested.trim_start_matches('/')))
        }
    }
}

impl Default for StorageRoot {
    fn default() -> Self {
        Self("/storage".to_string())
    }
}

impl TryFrom<String> for StorageRoot {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StorageRoot> for String {
    fn from(root: StorageRoot) -> Self {
        root.0
    }
}

impl std::fmt::Display for StorageRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
