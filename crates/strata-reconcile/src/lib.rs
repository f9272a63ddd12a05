//! Reconciliation for Strata storage allocations.
//!
//! [`ReconciliationScheduler`] holds the individual passes: polling access
//! allocation groups, promoting storage allocations whose access is ready,
//! ingesting quota usage, and resetting allocation trees. [`runner`] runs
//! the periodic passes on their configured cadences.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod scheduler;

pub use runner::{PeriodicTask, TaskHandle, TaskState, spawn_reconciliation_tasks};
pub use scheduler::{
    IngestReport, PollReport, PromotionOutcome, PromotionReport, ReconciliationScheduler,
};
