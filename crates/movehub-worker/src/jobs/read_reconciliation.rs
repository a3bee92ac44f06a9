//! Read reconciliation: repair drifted `is_read_by_all` flags.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use movehub_core::config::ReconciliationConfig;
use movehub_core::types::NotificationId;
use movehub_database::{NotificationFilter, NotificationStore, SortDirection};
use movehub_service::RetentionSettings;

use super::cleanup::CleanupJob;
use crate::error::JobError;
use crate::job::{JobName, NotificationJob, RunCounts};
use crate::tracker::JobTracker;

/// Recomputes the cached read flag where it disagrees with the receipts,
/// and opportunistically runs cleanup.
pub struct ReadReconciliationJob {
    store: Arc<dyn NotificationStore>,
    settings: RetentionSettings,
    cleanup: Arc<CleanupJob>,
    config: ReconciliationConfig,
    tracker: JobTracker,
}

impl std::fmt::Debug for ReadReconciliationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadReconciliationJob")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReadReconciliationJob {
    /// Creates a new reconciliation job.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        settings: RetentionSettings,
        cleanup: Arc<CleanupJob>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            store,
            settings,
            cleanup,
            config,
            tracker: JobTracker::new(),
        }
    }

    async fn reconcile(&self, counts: &mut RunCounts) -> Result<(), JobError> {
        let filter = NotificationFilter {
            read_flag_mismatch: true,
            ..Default::default()
        };
        let batch_size = u64::from(self.config.batch_size.max(1));
        // Ids whose update failed still match the filter; skipping them by
        // offset keeps them out of the rest of this run.
        let mut offset = 0;

        loop {
            let batch = self
                .store
                .find(&filter, SortDirection::Asc, Some(batch_size), offset)
                .await?;
            if batch.is_empty() {
                break;
            }
            let len = batch.len() as u64;
            *counts.entry("examined").or_insert(0) += len;

            let (read, unread): (Vec<_>, Vec<_>) =
                batch.iter().partition(|n| n.computed_read_by_all());
            let read: Vec<NotificationId> = read.into_iter().map(|n| n.id).collect();
            let unread: Vec<NotificationId> = unread.into_iter().map(|n| n.id).collect();

            let mut fixed = 0;
            let mut failed = 0;
            for (ids, value) in [(read, true), (unread, false)] {
                if ids.is_empty() {
                    continue;
                }
                match self.store.set_read_by_all(&ids, value).await {
                    Ok(updated) => fixed += updated,
                    Err(e) => {
                        failed += ids.len() as u64;
                        warn!(error = %e, batch = ids.len(), "Failed to update read flags");
                    }
                }
            }
            *counts.entry("fixed").or_insert(0) += fixed;
            *counts.entry("failed").or_insert(0) += failed;
            offset += failed;
            debug!(fixed, failed, "Reconciled read flag batch");

            // A batch that changed nothing would be selected again forever.
            if (fixed == 0 && failed == 0) || len < batch_size {
                break;
            }
        }
        Ok(())
    }

    async fn maybe_cleanup(&self, counts: &mut RunCounts) {
        let policy = self.settings.current().await;
        if !policy.auto_delete_read_notifications {
            return;
        }
        let spacing = Duration::hours(self.config.cleanup_min_spacing_hours);
        if let Some(last) = self.cleanup.last_run_at().await {
            if Utc::now() - last < spacing {
                debug!(last_cleanup = %last, "Cleanup ran recently; not triggering");
                return;
            }
        }

        match self.cleanup.run().await {
            Ok(_) => {
                counts.insert("cleanup_triggered", 1);
            }
            Err(JobError::AlreadyRunning(_)) => {
                debug!("Cleanup already running; not triggering");
            }
            Err(e) => warn!(error = %e, "Opportunistic cleanup failed"),
        }
    }
}

#[async_trait]
impl NotificationJob for ReadReconciliationJob {
    fn name(&self) -> JobName {
        JobName::ReadReconciliation
    }

    fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    async fn execute(&self) -> Result<RunCounts, JobError> {
        let mut counts = RunCounts::from([("examined", 0), ("fixed", 0), ("failed", 0)]);
        self.reconcile(&mut counts).await?;
        self.maybe_cleanup(&mut counts).await;
        if counts["fixed"] > 0 {
            info!(fixed = counts["fixed"], "Repaired drifted read flags");
        }
        Ok(counts)
    }
}
