//! In-memory collaborators for Strata.
//!
//! Every external contract in `strata-core` has an implementation here:
//!
//! - [`MemoryStorageBackend`]: filesystem tree, ACLs, exports, quotas
//! - [`MemoryGroupDirectory`]: groups and accounts
//! - [`MemoryAllocationStore`]: allocation records and linkage
//! - [`RecordingNotifier`]: captured notifications
//!
//! They back the test suites of the other crates and local development.
//! The backend and directory support failure injection so partial-failure
//! paths can be exercised.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod directory;
pub mod notifier;
pub mod store;

pub use backend::MemoryStorageBackend;
pub use directory::MemoryGroupDirectory;
pub use notifier::RecordingNotifier;
pub use store::MemoryAllocationStore;
