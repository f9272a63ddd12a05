//! Reconciliation passes over the allocation store.
//!
//! Every pass reads fresh state from the store, acts on each allocation
//! independently, and is safe to run again. Failures are surfaced to the
//! caller (or logged, in batch passes) and picked up on the next tick.

use backon::{ConstantBuilder, Retryable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use strata_acl::{AclAllocationManager, AclResetEngine, ResetReport};
use strata_core::{
    AccessAllocation, AccessKind, AllocationId, AllocationStatus, AllocationStore, Error, GroupDirectory,
    QuotaPage, QuotaUsage, QuotaUsageSample, Result, StorageAllocation, StorageBackend,
    StorageRoot, StrataConfig,
};

// ============================================================================
// Reports
// ============================================================================

/// Result of one promotion check.
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionOutcome {
    /// The allocation moved from Pending to Active.
    Promoted(StorageAllocation),

    /// The RW or RO access allocation is missing or not Active yet.
    Waiting {
        /// Access kinds (of RW and RO) without exactly one Active
        /// allocation.
        not_active: usize,
    },

    /// The allocation was not Pending, so nothing changed.
    NotPending(AllocationStatus),
}

impl PromotionOutcome {
    /// Returns `true` if this call performed the promotion.
    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted(_))
    }
}

enum Readiness {
    Ready(StorageAllocation),
    Blocked(PromotionOutcome),
}

/// Counts from one pass over Pending access allocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Access allocations examined.
    pub checked: usize,

    /// Now Active.
    pub activated: usize,

    /// Now Expired.
    pub expired: usize,

    /// Still Pending.
    pub pending: usize,

    /// Polls that failed and will be retried next tick.
    pub errors: usize,
}

/// Results of one pass over Pending storage allocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    /// Storage allocations examined.
    pub checked: usize,

    /// Promoted and activated on the backend.
    pub promoted: Vec<AllocationId>,

    /// Ready, but backend setup failed; still Pending.
    pub activation_failures: Vec<AllocationId>,

    /// Still waiting on access allocations.
    pub waiting: usize,

    /// Checks that failed and will be retried next tick.
    pub errors: usize,
}

/// Results of one quota-usage ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Samples offered.
    pub samples: usize,

    /// Samples recorded against an allocation.
    pub recorded: usize,

    /// Paths of samples that matched no Active allocation.
    pub dropped: Vec<String>,
}

impl IngestReport {
    /// Returns `true` if every sample was recorded.
    pub fn is_complete(&self) -> bool {
        self.recorded == self.samples
    }
}

// ============================================================================
// ReconciliationScheduler
// ============================================================================

/// Drives allocations through their lifecycle.
///
/// Holds no mutable state of its own; cloning is cheap and clones can run
/// passes concurrently.
#[derive(Clone)]
pub struct ReconciliationScheduler {
    manager: AclAllocationManager,
    backend: Arc<dyn StorageBackend>,
    store: Arc<dyn AllocationStore>,
    directory: Arc<dyn GroupDirectory>,
    root: StorageRoot,
    group_expiration: Duration,
    quota_page_limit: usize,
    quota_fetch_attempts: usize,
    quota_fetch_backoff: Duration,
}

impl ReconciliationScheduler {
    /// Creates a scheduler over the given collaborators.
    pub fn new(
        config: &StrataConfig,
        manager: AclAllocationManager,
        backend: Arc<dyn StorageBackend>,
        store: Arc<dyn AllocationStore>,
        directory: Arc<dyn GroupDirectory>,
    ) -> Self {
        Self {
            manager,
            backend,
            store,
            directory,
            root: config.storage.root.clone(),
            group_expiration: config.reconcile.group_expiration(),
            quota_page_limit: config.storage.quota_page_limit,
            quota_fetch_attempts: config.storage.quota_fetch_attempts,
            quota_fetch_backoff: Duration::from_secs(config.storage.quota_fetch_backoff_secs),
        }
    }

    /// How long a group may be missing before its access allocation expires.
    pub fn group_expiration(&self) -> Duration {
        self.group_expiration
    }

    // ------------------------------------------------------------------
    // Group polling
    // ------------------------------------------------------------------

    /// Checks whether the group backing `allocation` exists yet.
    ///
    /// Returns the resulting status. Only Pending allocations are acted on.
    pub async fn poll_access_allocation(
        &self,
        allocation: &AccessAllocation,
        expiration: Duration,
    ) -> Result<AllocationStatus> {
        self.poll_access_allocation_at(allocation, expiration, Utc::now())
            .await
    }

    /// [`poll_access_allocation`](Self::poll_access_allocation) with an
    /// explicit clock.
    pub async fn poll_access_allocation_at(
        &self,
        allocation: &AccessAllocation,
        expiration: Duration,
        now: DateTime<Utc>,
    ) -> Result<AllocationStatus> {
        if allocation.status != AllocationStatus::Pending {
            return Ok(allocation.status);
        }

        let found = match self.directory.lookup_group(&allocation.group_name).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    group = %allocation.group_name,
                    error = %e,
                    "Group lookup failed; treating as not found"
                );
                false
            }
        };

        let elapsed = (now - allocation.created).to_std().unwrap_or(Duration::ZERO);
        let status = if found {
            AllocationStatus::Active
        } else if elapsed >= expiration {
            tracing::warn!(
                allocation_id = %allocation.id,
                group = %allocation.group_name,
                elapsed_secs = elapsed.as_secs(),
                "Group not found before expiration"
            );
            AllocationStatus::Expired
        } else {
            tracing::debug!(group = %allocation.group_name, "Group not found yet");
            return Ok(AllocationStatus::Pending);
        };

        let mut updated = allocation.clone();
        updated.status = status;
        self.store.update_access_allocation(&updated).await?;
        tracing::info!(
            allocation_id = %allocation.id,
            group = %allocation.group_name,
            %status,
            "Access allocation status changed"
        );
        Ok(status)
    }

    /// Polls every Pending access allocation against the configured
    /// expiration.
    pub async fn poll_pending_access_allocations(&self) -> Result<PollReport> {
        let pending = self
            .store
            .access_allocations_with_status(AllocationStatus::Pending)
            .await?;
        tracing::info!(count = pending.len(), "Polling access allocation groups");

        let mut report = PollReport {
            checked: pending.len(),
            ..PollReport::default()
        };
        for allocation in &pending {
            match self
                .poll_access_allocation(allocation, self.group_expiration)
                .await
            {
                Ok(AllocationStatus::Active) => report.activated += 1,
                Ok(AllocationStatus::Expired) => report.expired += 1,
                Ok(_) => report.pending += 1,
                Err(e) => {
                    tracing::warn!(allocation_id = %allocation.id, error = %e, "Poll failed");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Promotion
    // ------------------------------------------------------------------

    /// Promotes a Pending storage allocation to Active once it has exactly
    /// one Active RW and one Active RO access allocation.
    ///
    /// Reads the current record from the store, so repeated calls with a
    /// stale copy promote at most once. Backend setup is not run here; see
    /// [`promote_pending_storage_allocations`](Self::promote_pending_storage_allocations).
    pub async fn promote_storage_allocation(
        &self,
        allocation: &StorageAllocation,
    ) -> Result<PromotionOutcome> {
        match self.readiness(allocation).await? {
            Readiness::Ready(current) => {
                let promoted = self.mark_active(current).await?;
                Ok(PromotionOutcome::Promoted(promoted))
            }
            Readiness::Blocked(outcome) => Ok(outcome),
        }
    }

    /// Promotes every Pending storage allocation that is ready, running
    /// first-time backend setup before each status change.
    ///
    /// An allocation whose setup fails stays Pending and is reported in
    /// [`PromotionReport::activation_failures`]; the next pass retries it.
    pub async fn promote_pending_storage_allocations(&self) -> Result<PromotionReport> {
        let pending = self
            .store
            .storage_allocations_with_status(AllocationStatus::Pending)
            .await?;
        tracing::info!(count = pending.len(), "Checking pending storage allocations");

        let mut report = PromotionReport {
            checked: pending.len(),
            ..PromotionReport::default()
        };
        for allocation in &pending {
            let current = match self.readiness(allocation).await {
                Ok(Readiness::Ready(current)) => current,
                Ok(Readiness::Blocked(PromotionOutcome::Waiting { .. })) => {
                    report.waiting += 1;
                    continue;
                }
                Ok(Readiness::Blocked(_)) => continue,
                Err(e) => {
                    tracing::warn!(allocation_id = %allocation.id, error = %e, "Promotion check failed");
                    report.errors += 1;
                    continue;
                }
            };

            if let Err(e) = self.manager.activate_storage_allocation(&current).await {
                tracing::warn!(
                    allocation_id = %current.id,
                    error = %e,
                    "Activation failed; allocation stays pending"
                );
                report.activation_failures.push(current.id);
                continue;
            }
            match self.mark_active(current).await {
                Ok(promoted) => report.promoted.push(promoted.id),
                Err(e) => {
                    tracing::warn!(allocation_id = %allocation.id, error = %e, "Promotion failed after activation");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    async fn readiness(&self, allocation: &StorageAllocation) -> Result<Readiness> {
        let current = self
            .store
            .get_storage_allocation(allocation.id)
            .await?
            .ok_or_else(|| Error::not_found("storage allocation", allocation.id.to_string()))?;
        if current.status != AllocationStatus::Pending {
            return Ok(Readiness::Blocked(PromotionOutcome::NotPending(current.status)));
        }

        let accesses = self.manager.get_access_allocations(&current).await?;
        let not_active = AccessKind::BOTH
            .iter()
            .filter(|kind| {
                let mut of_kind = accesses.iter().filter(|a| a.kind == **kind);
                let ready = matches!(
                    (of_kind.next(), of_kind.next()),
                    (Some(a), None) if a.status.is_active()
                );
                !ready
            })
            .count();
        if not_active > 0 {
            tracing::debug!(allocation_id = %current.id, not_active, "Storage allocation not ready");
            return Ok(Readiness::Blocked(PromotionOutcome::Waiting { not_active }));
        }
        Ok(Readiness::Ready(current))
    }

    async fn mark_active(&self, mut current: StorageAllocation) -> Result<StorageAllocation> {
        current.status = AllocationStatus::Active;
        self.store.update_storage_allocation(&current).await?;
        tracing::info!(allocation_id = %current.id, path = %current.path, "Storage allocation promoted");
        Ok(current)
    }

    // ------------------------------------------------------------------
    // Quota usage
    // ------------------------------------------------------------------

    /// Records each sample against the Active storage allocation at its
    /// path. A sample path ending in one slash also matches the stored
    /// path without it. Unmatched samples are dropped.
    pub async fn ingest_quota_usage(&self, samples: &[QuotaUsageSample]) -> Result<IngestReport> {
        let mut report = IngestReport {
            samples: samples.len(),
            ..IngestReport::default()
        };

        for sample in samples {
            match self.allocation_for_sample(&sample.path).await? {
                Some(allocation) => {
                    self.store
                        .record_quota_usage(allocation.id, QuotaUsage::from_sample(sample))
                        .await?;
                    tracing::debug!(allocation_id = %allocation.id, path = %sample.path, "Quota usage recorded");
                    report.recorded += 1;
                }
                None => {
                    tracing::warn!(path = %sample.path, "No active allocation for quota sample; dropping");
                    report.dropped.push(sample.path.clone());
                }
            }
        }
        Ok(report)
    }

    async fn allocation_for_sample(&self, path: &str) -> Result<Option<StorageAllocation>> {
        let active = Some(AllocationStatus::Active);
        if let Some(found) = self.store.find_storage_allocation_by_path(path, active).await? {
            return Ok(Some(found));
        }
        match path.strip_suffix('/') {
            Some(trimmed) => {
                self.store
                    .find_storage_allocation_by_path(trimmed, active)
                    .await
            }
            None => Ok(None),
        }
    }

    /// Fetches every quota on the backend, keeps those on root
    /// allocations, and ingests them.
    pub async fn ingest_daily_quota_usage(&self) -> Result<IngestReport> {
        let samples: Vec<QuotaUsageSample> = self
            .fetch_quota_usage()
            .await?
            .into_iter()
            .filter(|s| self.root.is_base_allocation(&s.path))
            .collect();

        let report = self.ingest_quota_usage(&samples).await?;
        if report.is_complete() {
            tracing::info!(recorded = report.recorded, "Daily quota usage ingested");
        } else {
            tracing::warn!(
                fetched = report.samples,
                recorded = report.recorded,
                "Not all quota usage was recorded"
            );
        }
        Ok(report)
    }

    /// Every quota sample on the backend, following page cursors.
    pub async fn fetch_quota_usage(&self) -> Result<Vec<QuotaUsageSample>> {
        let mut samples = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.fetch_quota_page(cursor.as_deref()).await?;
            samples.extend(page.samples);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        tracing::debug!(count = samples.len(), "Quota usage fetched");
        Ok(samples)
    }

    async fn fetch_quota_page(&self, cursor: Option<&str>) -> Result<QuotaPage> {
        let backend = &self.backend;
        let limit = self.quota_page_limit;
        let backoff = ConstantBuilder::default()
            .with_delay(self.quota_fetch_backoff)
            .with_max_times(self.quota_fetch_attempts.saturating_sub(1));

        (move || async move { backend.quotas_with_usage(limit, cursor).await })
            .retry(backoff)
            .when(Error::is_retryable)
            .notify(|err, delay| {
                tracing::warn!(error = %err, ?delay, "Quota usage fetch failed; retrying");
            })
            .await
    }

    // ------------------------------------------------------------------
    // Resets
    // ------------------------------------------------------------------

    /// Resets the ACLs under `allocation`, then under each of its
    /// sub-allocations when `include_subs` is set.
    pub async fn reset_allocation_tree(
        &self,
        allocation: &StorageAllocation,
        include_subs: bool,
    ) -> Result<Vec<(AllocationId, ResetReport)>> {
        let engine = AclResetEngine::new(&self.manager, allocation.clone()).await?;
        let mut reports = vec![(allocation.id, engine.run().await?)];

        if include_subs {
            for sub in engine.sub_allocations() {
                let report = AclResetEngine::new(&self.manager, sub.clone())
                    .await?
                    .run()
                    .await?;
                reports.push((sub.id, report));
            }
        }
        Ok(reports)
    }
}

impl fmt::Debug for ReconciliationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationScheduler")
            .field("root", &self.root)
            .field("group_expiration", &self.group_expiration)
            .field("quota_page_limit", &self.quota_page_limit)
            .field("quota_fetch_attempts", &self.quota_fetch_attempts)
            .finish_non_exhaustive()
    }
}
