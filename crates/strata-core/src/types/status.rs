//! Allocation lifecycle status.

use serde::{Deserialize, Serialize};

/// The lifecycle status shared by storage and access allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Requested; backing groups or storage not yet confirmed.
    Pending,

    /// Provisioned and in use.
    Active,

    /// Provisioning timed out. Terminal until a human restarts it.
    Expired,

    /// Access removed from the backend.
    Revoked,

    /// Marked for removal by an external process.
    ReadyForDeletion,
}

impl AllocationStatus {
    /// Returns `true` for statuses no reconciliation task will move out of.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AllocationStatus::Expired
                | AllocationStatus::Revoked
                | AllocationStatus::ReadyForDeletion
        )
    }

    /// Returns `true` if the allocation is [`AllocationStatus::Active`].
    pub fn is_active(&self) -> bool {
        matches!(self, AllocationStatus::Active)
    }
}

impl std::fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationStatus::Pending => write!(f, "pending"),
            AllocationStatus::Active => write!(f, "active"),
            AllocationStatus::Expired => write!(f, "expired"),
            AllocationStatus::Revoked => write!(f, "revoked"),
            AllocationStatus::ReadyForDeletion => write!(f, "ready_for_deletion"),
        }
    }
}
