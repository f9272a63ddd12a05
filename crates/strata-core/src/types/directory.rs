//! Directory listing entries.

use serde::{Deserialize, Serialize};

/// What a listed path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    #[serde(rename = "FS_FILE_TYPE_FILE")]
    File,
    /// Directory.
    #[serde(rename = "FS_FILE_TYPE_DIRECTORY")]
    Directory,
    /// Symlinks, devices, and anything else.
    #[serde(other)]
    Other,
}

/// One entry returned by a directory enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Absolute path of the entry. Directories may carry a trailing slash.
    pub path: String,

    /// Entry type.
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl DirectoryEntry {
    /// A file entry.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    /// A directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }
}
