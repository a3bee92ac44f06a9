//! The three scheduled notification jobs.

pub mod cleanup;
pub mod lifecycle;
pub mod read_reconciliation;

#[cfg(test)]
pub(crate) mod testing;

pub use cleanup::{CleanupJob, CleanupPreview, CleanupReport};
pub use lifecycle::LifecycleJob;
pub use read_reconciliation::ReadReconciliationJob;
