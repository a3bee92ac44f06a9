//! Event capture adapter: owns the consume loop.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use movehub_core::config::CaptureConfig;
use movehub_core::events::EntityKind;
use movehub_core::result::AppResult;
use movehub_database::DirectoryStore;
use movehub_database::memory::MemoryDirectory;

use crate::handler::ChangeHandler;
use crate::source::{ChangeFeedSource, EventSource, MemoryChangeFeed, PollingSource};
use crate::stats::{AdapterStats, CaptureMode, Counters};

/// Pause after a failed source read before trying again.
const SOURCE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Where change events can come from.
#[derive(Debug, Clone)]
pub enum CaptureBackend {
    /// PostgreSQL: change feed when available, polling otherwise.
    Postgres(PgPool),
    /// In-memory directory broadcasting its own writes.
    Memory(MemoryDirectory),
}

#[derive(Debug, Default)]
struct RunState {
    mode: Option<CaptureMode>,
    cancel: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

/// Consumes one event source and fans events out through the handler.
///
/// The source is chosen once in [`start`](Self::start) and kept until
/// [`stop`](Self::stop).
pub struct EventCaptureAdapter {
    handler: ChangeHandler,
    directory: Arc<dyn DirectoryStore>,
    backend: CaptureBackend,
    config: CaptureConfig,
    counters: Arc<Counters>,
    state: Mutex<RunState>,
}

impl std::fmt::Debug for EventCaptureAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCaptureAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventCaptureAdapter {
    /// Creates a new adapter; nothing runs until `start`.
    pub fn new(
        handler: ChangeHandler,
        directory: Arc<dyn DirectoryStore>,
        backend: CaptureBackend,
        config: CaptureConfig,
    ) -> Self {
        Self {
            handler,
            directory,
            backend,
            config,
            counters: Arc::new(Counters::default()),
            state: Mutex::new(RunState::default()),
        }
    }

    /// Select a source and spawn the consume loop. Idempotent.
    pub async fn start(&self) -> AppResult<CaptureMode> {
        let mut state = self.state.lock().await;
        if let (Some(mode), Some(_)) = (state.mode, state.task.as_ref()) {
            return Ok(mode);
        }

        if !self.config.enabled {
            info!("Event capture disabled by configuration");
            state.mode = Some(CaptureMode::Disabled);
            return Ok(CaptureMode::Disabled);
        }

        let source = self.select_source().await;
        let mode = source.mode();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(consume(
            source,
            self.handler.clone(),
            Arc::clone(&self.counters),
            cancel_rx,
        ));

        state.mode = Some(mode);
        state.cancel = Some(cancel_tx);
        state.task = Some(task);
        info!(mode = %mode, "Event capture adapter started");
        Ok(mode)
    }

    /// Stop the consume loop and wait for the in-flight batch to finish.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if let Some(cancel) = state.cancel.take() {
            let _ = cancel.send(true);
        }
        if let Some(task) = state.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Event capture task ended abnormally");
            }
            info!("Event capture adapter stopped");
        }
    }

    /// Re-read an entity and run the creation fan-out for it.
    ///
    /// At-least-once: in polling mode this may duplicate a notification
    /// the poller later produces for the same entity.
    pub async fn trigger(&self, entity: EntityKind, id: Uuid) -> AppResult<usize> {
        match self.handler.replay_created(entity, id).await {
            Ok(created) => {
                self.counters.record_success(created);
                info!(entity = %entity, id = %id, created, "Manual capture trigger");
                Ok(created)
            }
            Err(e) => {
                if !e.is_client_error() {
                    self.counters.record_failure();
                }
                Err(e)
            }
        }
    }

    /// Current counters and mode.
    pub async fn stats(&self) -> AdapterStats {
        let state = self.state.lock().await;
        let running = state.task.as_ref().is_some_and(|t| !t.is_finished());
        self.counters.snapshot(state.mode, running)
    }

    async fn select_source(&self) -> Box<dyn EventSource> {
        match &self.backend {
            CaptureBackend::Memory(directory) => {
                Box::new(MemoryChangeFeed::new(directory.subscribe()))
            }
            CaptureBackend::Postgres(pool) => {
                if self.config.prefer_change_feed {
                    match ChangeFeedSource::connect(pool).await {
                        Ok(feed) => return Box::new(feed),
                        Err(e) => warn!(
                            error = %e,
                            initial_delay_secs = self.config.poll_initial_delay_secs,
                            interval_secs = self.config.poll_interval_secs,
                            "Change feed unavailable; falling back to polling"
                        ),
                    }
                }
                Box::new(self.polling_source())
            }
        }
    }

    fn polling_source(&self) -> PollingSource {
        PollingSource::new(
            Arc::clone(&self.directory),
            Duration::from_secs(self.config.poll_initial_delay_secs),
            Duration::from_secs(self.config.poll_interval_secs),
        )
    }
}

async fn consume(
    mut source: Box<dyn EventSource>,
    handler: ChangeHandler,
    counters: Arc<Counters>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let batch = tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
                continue;
            }
            batch = source.next_batch() => batch,
        };

        match batch {
            Ok(Some(events)) => {
                for event in events {
                    match handler.handle(&event).await {
                        Ok(created) => {
                            counters.record_success(created);
                            source.acknowledge(&event);
                        }
                        Err(e) => {
                            counters.record_failure();
                            error!(
                                entity = %event.entity,
                                id = %event.id,
                                operation = ?event.operation,
                                error = %e,
                                "Failed to handle change event"
                            );
                        }
                    }
                }
            }
            Ok(None) => {
                warn!("Event source closed");
                break;
            }
            Err(e) => {
                counters.record_failure();
                error!(error = %e, "Event source read failed");
                tokio::time::sleep(SOURCE_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use movehub_core::events::ChangeEvent;
    use movehub_core::types::{NotificationType, UserId};
    use movehub_database::memory::MemoryNotificationStore;
    use movehub_entity::user::{User, UserRole, UserStatus};
    use movehub_service::{NotificationDispatcher, NotificationRules};

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(),
            username: format!("u-{}", UserId::new()),
            email: Some("u@example.com".into()),
            display_name: Some("U".into()),
            phone: Some("1".into()),
            role,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn adapter(
        directory: &Arc<MemoryDirectory>,
        store: &Arc<MemoryNotificationStore>,
        config: CaptureConfig,
    ) -> EventCaptureAdapter {
        let handler = ChangeHandler::new(
            directory.clone(),
            NotificationRules::new(directory.clone()),
            NotificationDispatcher::new(store.clone(), 30),
        );
        EventCaptureAdapter::new(
            handler,
            directory.clone(),
            CaptureBackend::Memory(directory.as_ref().clone()),
            config,
        )
    }

    #[tokio::test]
    async fn test_memory_feed_end_to_end() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        directory.put_user(user(UserRole::Admin)).await.unwrap();

        let adapter = adapter(&directory, &store, CaptureConfig::default());
        assert_eq!(adapter.start().await.unwrap(), CaptureMode::InMemory);
        assert_eq!(adapter.start().await.unwrap(), CaptureMode::InMemory);

        directory.put_user(user(UserRole::Staff)).await.unwrap();

        for _ in 0..100 {
            if adapter.stats().await.events_processed >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        adapter.stop().await;

        let stats = adapter.stats().await;
        assert_eq!(stats.events_processed, 1);
        assert!(!stats.running);
        let all = store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].notification_type, NotificationType::UserCreated);
    }

    /// Source replaying fixed batches and recording acknowledgements.
    struct ScriptedSource {
        batches: std::collections::VecDeque<Vec<ChangeEvent>>,
        acknowledged: Arc<std::sync::Mutex<Vec<Uuid>>>,
    }

    #[async_trait::async_trait]
    impl EventSource for ScriptedSource {
        fn mode(&self) -> CaptureMode {
            CaptureMode::InMemory
        }

        async fn next_batch(&mut self) -> AppResult<Option<Vec<ChangeEvent>>> {
            Ok(self.batches.pop_front())
        }

        fn acknowledge(&mut self, event: &ChangeEvent) {
            self.acknowledged.lock().unwrap().push(event.id);
        }
    }

    #[tokio::test]
    async fn test_consume_acknowledges_handled_events() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        directory.put_user(user(UserRole::Admin)).await.unwrap();
        let staff = user(UserRole::Staff);
        let handler = ChangeHandler::new(
            directory.clone(),
            NotificationRules::new(directory.clone()),
            NotificationDispatcher::new(store.clone(), 30),
        );

        let acknowledged = Arc::new(std::sync::Mutex::new(Vec::new()));
        let inserted = ChangeEvent::insert(
            EntityKind::User,
            staff.id.into_uuid(),
            serde_json::to_value(&staff).unwrap(),
        );
        let source = ScriptedSource {
            batches: [vec![inserted.clone()]].into(),
            acknowledged: acknowledged.clone(),
        };
        let counters = Arc::new(Counters::default());
        let (_cancel, rx) = watch::channel(false);

        consume(Box::new(source), handler, counters, rx).await;

        assert_eq!(*acknowledged.lock().unwrap(), vec![inserted.id]);
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_capture_does_not_spawn() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        let config = CaptureConfig {
            enabled: false,
            ..Default::default()
        };
        let adapter = adapter(&directory, &store, config);
        assert_eq!(adapter.start().await.unwrap(), CaptureMode::Disabled);
        assert!(!adapter.stats().await.running);
    }

    #[tokio::test]
    async fn test_trigger_counts_and_reports_missing() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        let admin = user(UserRole::Admin);
        directory.put_user(admin.clone()).await.unwrap();
        let adapter = adapter(&directory, &store, CaptureConfig::default());

        let created = adapter
            .trigger(EntityKind::User, admin.id.into_uuid())
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert!(adapter.trigger(EntityKind::User, Uuid::new_v4()).await.is_err());

        let stats = adapter.stats().await;
        assert_eq!(stats.events_processed, 1);
        assert_eq!(stats.events_failed, 0);
    }
}
