//! Quota usage reported by the storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One backend-reported `(path, limit, used)` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsageSample {
    /// Path the quota is attached to, formatted however the backend likes
    /// (often with a trailing slash).
    pub path: String,

    /// Quota limit in bytes.
    pub limit_bytes: u64,

    /// Bytes in use.
    pub used_bytes: u64,
}

impl QuotaUsageSample {
    /// Creates a sample.
    pub fn new(path: impl Into<String>, limit_bytes: u64, used_bytes: u64) -> Self {
        Self {
            path: path.into(),
            limit_bytes,
            used_bytes,
        }
    }
}

/// Usage recorded against a storage allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Quota limit in bytes at sample time.
    pub limit_bytes: u64,

    /// Bytes in use at sample time.
    pub used_bytes: u64,

    /// When the usage was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl QuotaUsage {
    /// Builds a usage record from a sample, stamped now.
    pub fn from_sample(sample: &QuotaUsageSample) -> Self {
        Self {
            limit_bytes: sample.limit_bytes,
            used_bytes: sample.used_bytes,
            recorded_at: Utc::now(),
        }
    }
}

/// One page of quota samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPage {
    /// Samples on this page.
    pub samples: Vec<QuotaUsageSample>,

    /// Opaque cursor for the next page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}
