//! Polling fallback used when the change feed is unavailable.
//!
//! Polling cannot observe individual writes. It only derives deadline
//! events from query predicates: sent quotations past `valid_until` and
//! unpaid receipts past `due_date`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use movehub_core::events::{ChangeEvent, ChangeOperation, EntityKind};
use movehub_core::result::AppResult;
use movehub_database::DirectoryStore;

use super::EventSource;
use crate::stats::CaptureMode;

/// Periodically queries the directory for lapsed documents.
pub struct PollingSource {
    directory: Arc<dyn DirectoryStore>,
    initial_delay: Duration,
    interval: Duration,
    polled: bool,
    /// Lapsed entities whose events were handled. Entries drop out once
    /// the entity stops matching the lapse predicates.
    notified: HashSet<(EntityKind, Uuid)>,
}

impl std::fmt::Debug for PollingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingSource")
            .field("initial_delay", &self.initial_delay)
            .field("interval", &self.interval)
            .field("notified", &self.notified.len())
            .finish_non_exhaustive()
    }
}

impl PollingSource {
    /// First poll after `initial_delay`, then every `interval`.
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        initial_delay: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            directory,
            initial_delay,
            interval,
            polled: false,
            notified: HashSet::new(),
        }
    }

    /// Run one poll at `now`, returning events for lapsed entities whose
    /// events have not been acknowledged yet.
    ///
    /// Nothing is recorded until [`acknowledge`](EventSource::acknowledge),
    /// so a failed poll or a failed handler leaves the entity due on the
    /// next tick.
    pub async fn poll(&mut self, now: DateTime<Utc>) -> AppResult<Vec<ChangeEvent>> {
        let quotations = self.directory.expired_quotations(now).await?;
        let receipts = self.directory.overdue_receipts(now).await?;

        let mut lapsed = HashSet::with_capacity(quotations.len() + receipts.len());
        let mut events = Vec::new();
        for quotation in quotations {
            let key = (EntityKind::Quotation, quotation.id.into_uuid());
            if lapsed.insert(key) && !self.notified.contains(&key) {
                let image = serde_json::to_value(&quotation)?;
                events.push(ChangeEvent::lapsed(key.0, key.1, image));
            }
        }
        for receipt in receipts {
            let key = (EntityKind::Receipt, receipt.id.into_uuid());
            if lapsed.insert(key) && !self.notified.contains(&key) {
                let image = serde_json::to_value(&receipt)?;
                events.push(ChangeEvent::lapsed(key.0, key.1, image));
            }
        }

        self.notified.retain(|key| lapsed.contains(key));
        debug!(
            events = events.len(),
            tracked = self.notified.len(),
            "Polling pass complete"
        );
        Ok(events)
    }
}

#[async_trait]
impl EventSource for PollingSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Polling
    }

    async fn next_batch(&mut self) -> AppResult<Option<Vec<ChangeEvent>>> {
        let wait = if self.polled {
            self.interval
        } else {
            self.initial_delay
        };
        tokio::time::sleep(wait).await;
        self.polled = true;
        self.poll(Utc::now()).await.map(Some)
    }

    fn acknowledge(&mut self, event: &ChangeEvent) {
        if event.operation == ChangeOperation::Lapsed {
            self.notified.insert((event.entity, event.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Duration as ChronoDuration;
    use movehub_core::error::AppError;
    use movehub_core::types::{QuotationId, ReceiptId, UserId};
    use movehub_database::memory::MemoryDirectory;
    use movehub_entity::document::{PaymentStatus, Quotation, QuotationStatus, Receipt};
    use movehub_entity::user::User;

    /// Directory whose receipt query fails while `fail_receipts` is set.
    struct FlakyDirectory {
        inner: MemoryDirectory,
        fail_receipts: AtomicBool,
    }

    #[async_trait]
    impl DirectoryStore for FlakyDirectory {
        async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
            self.inner.find_user(id).await
        }

        async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
            self.inner.find_users(ids).await
        }

        async fn active_admin_ids(&self) -> AppResult<Vec<UserId>> {
            self.inner.active_admin_ids().await
        }

        async fn active_user_ids(&self) -> AppResult<Vec<UserId>> {
            self.inner.active_user_ids().await
        }

        async fn find_quotation(&self, id: QuotationId) -> AppResult<Option<Quotation>> {
            self.inner.find_quotation(id).await
        }

        async fn find_receipt(&self, id: ReceiptId) -> AppResult<Option<Receipt>> {
            self.inner.find_receipt(id).await
        }

        async fn expired_quotations(&self, now: DateTime<Utc>) -> AppResult<Vec<Quotation>> {
            self.inner.expired_quotations(now).await
        }

        async fn overdue_receipts(&self, now: DateTime<Utc>) -> AppResult<Vec<Receipt>> {
            if self.fail_receipts.load(Ordering::SeqCst) {
                return Err(AppError::database("receipts unavailable"));
            }
            self.inner.overdue_receipts(now).await
        }
    }

    fn acknowledge_all(source: &mut PollingSource, events: &[ChangeEvent]) {
        for event in events {
            source.acknowledge(event);
        }
    }

    fn quotation(status: QuotationStatus, valid_days: i64) -> Quotation {
        Quotation {
            id: QuotationId::new(),
            number: "Q-1".into(),
            customer_name: "Ng".into(),
            created_by: None,
            status,
            valid_until: Some(Utc::now() + ChronoDuration::days(valid_days)),
            total_amount: 1200.0,
            origin_address: None,
            destination_address: None,
            moving_date: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn receipt(status: PaymentStatus, due_days: i64) -> Receipt {
        Receipt {
            id: ReceiptId::new(),
            number: "R-1".into(),
            quotation_id: None,
            customer_name: "Ng".into(),
            created_by: None,
            payment_status: status,
            due_date: Some(Utc::now() + ChronoDuration::days(due_days)),
            amount: 300.0,
            payment_method: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_poll_reports_each_entity_once() {
        let dir = Arc::new(MemoryDirectory::new());
        let expired = quotation(QuotationStatus::Sent, -1);
        dir.put_quotation(expired.clone()).await.unwrap();
        dir.put_quotation(quotation(QuotationStatus::Sent, 5)).await.unwrap();
        dir.put_quotation(quotation(QuotationStatus::Accepted, -1)).await.unwrap();
        dir.put_receipt(receipt(PaymentStatus::Pending, -2)).await.unwrap();
        dir.put_receipt(receipt(PaymentStatus::Paid, -2)).await.unwrap();

        let mut source = PollingSource::new(dir, Duration::ZERO, Duration::ZERO);
        let first = source.poll(Utc::now()).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|e| e.operation == ChangeOperation::Lapsed));
        assert!(first.iter().any(|e| e.id == expired.id.into_uuid()));
        acknowledge_all(&mut source, &first);

        assert!(source.poll(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_entities_due() {
        let dir = Arc::new(FlakyDirectory {
            inner: MemoryDirectory::new(),
            fail_receipts: AtomicBool::new(true),
        });
        let expired = quotation(QuotationStatus::Sent, -1);
        dir.inner.put_quotation(expired.clone()).await.unwrap();

        let mut source = PollingSource::new(dir.clone(), Duration::ZERO, Duration::ZERO);
        assert!(source.poll(Utc::now()).await.is_err());

        dir.fail_receipts.store(false, Ordering::SeqCst);
        let second = source.poll(Utc::now()).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, expired.id.into_uuid());
    }

    #[tokio::test]
    async fn test_unacknowledged_events_are_redelivered() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.put_quotation(quotation(QuotationStatus::Sent, -1)).await.unwrap();
        dir.put_receipt(receipt(PaymentStatus::Pending, -2)).await.unwrap();

        let mut source = PollingSource::new(dir, Duration::ZERO, Duration::ZERO);
        let first = source.poll(Utc::now()).await.unwrap();
        assert_eq!(first.len(), 2);
        // Only the quotation was handled.
        let handled = first
            .iter()
            .find(|e| e.entity == EntityKind::Quotation)
            .unwrap();
        source.acknowledge(handled);

        let second = source.poll(Utc::now()).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].entity, EntityKind::Receipt);
    }

    #[tokio::test]
    async fn test_entities_that_stop_lapsing_are_forgotten() {
        let dir = Arc::new(MemoryDirectory::new());
        let mut expired = quotation(QuotationStatus::Sent, -1);
        dir.put_quotation(expired.clone()).await.unwrap();

        let mut source = PollingSource::new(dir.clone(), Duration::ZERO, Duration::ZERO);
        let first = source.poll(Utc::now()).await.unwrap();
        acknowledge_all(&mut source, &first);
        assert_eq!(source.notified.len(), 1);

        // Renewed: no longer expired, so it is dropped from the tracked set.
        expired.valid_until = Some(Utc::now() + ChronoDuration::days(10));
        dir.put_quotation(expired.clone()).await.unwrap();
        assert!(source.poll(Utc::now()).await.unwrap().is_empty());
        assert!(source.notified.is_empty());

        // Lapsing again is reported again.
        expired.valid_until = Some(Utc::now() - ChronoDuration::days(1));
        dir.put_quotation(expired).await.unwrap();
        assert_eq!(source.poll(Utc::now()).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_batch_waits_for_initial_delay() {
        let dir = Arc::new(MemoryDirectory::new());
        let mut source =
            PollingSource::new(dir, Duration::from_secs(30), Duration::from_secs(600));

        let started = tokio::time::Instant::now();
        let batch = source.next_batch().await.unwrap().unwrap();
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(30));

        let started = tokio::time::Instant::now();
        source.next_batch().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(600));
    }
}
