//! Background notification jobs for MoveHub.
//!
//! This crate provides:
//! - The read reconciliation, lifecycle advancement, and retention cleanup jobs
//! - Per-job run tracking with an in-process mutual exclusion guard
//! - A scheduler owning the job timers, the lifecycle cron entry, and the
//!   event capture adapter
//! - Health evaluation over job statistics and storage size

pub mod error;
pub mod health;
pub mod job;
pub mod jobs;
pub mod scheduler;
pub mod tracker;

pub use error::JobError;
pub use job::{JobName, NotificationJob, RunCounts};
pub use jobs::{CleanupJob, LifecycleJob, ReadReconciliationJob};
pub use scheduler::NotificationScheduler;
pub use tracker::{JobStats, JobTracker};
