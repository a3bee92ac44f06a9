//! PostgreSQL `LISTEN/NOTIFY` change feed.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, info};

use movehub_core::error::AppError;
use movehub_core::events::{CHANGE_CHANNEL, ChangeEvent};
use movehub_core::result::AppResult;

use super::EventSource;
use crate::stats::CaptureMode;

/// Trigger function installed by the change feed migration.
const TRIGGER_FUNCTION: &str = "movehub_notify_change";

/// Receives change events published by the upstream table triggers.
pub struct ChangeFeedSource {
    listener: PgListener,
}

impl std::fmt::Debug for ChangeFeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeedSource")
            .field("channel", &CHANGE_CHANNEL)
            .finish_non_exhaustive()
    }
}

impl ChangeFeedSource {
    /// Probe for the trigger function and subscribe to the channel.
    ///
    /// Fails with `ServiceUnavailable` when the feed cannot be used; the
    /// caller falls back to polling.
    pub async fn connect(pool: &PgPool) -> AppResult<Self> {
        let installed: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_proc WHERE proname = $1)")
                .bind(TRIGGER_FUNCTION)
                .fetch_one(pool)
                .await?;
        if !installed {
            return Err(AppError::service_unavailable(format!(
                "Change feed trigger function '{TRIGGER_FUNCTION}' is not installed"
            )));
        }

        let mut listener = PgListener::connect_with(pool).await.map_err(|e| {
            AppError::service_unavailable(format!("Change feed listener failed to connect: {e}"))
        })?;
        listener.listen(CHANGE_CHANNEL).await.map_err(|e| {
            AppError::service_unavailable(format!("LISTEN {CHANGE_CHANNEL} failed: {e}"))
        })?;

        info!(channel = CHANGE_CHANNEL, "Subscribed to change feed");
        Ok(Self { listener })
    }
}

#[async_trait]
impl EventSource for ChangeFeedSource {
    fn mode(&self) -> CaptureMode {
        CaptureMode::ChangeFeed
    }

    async fn next_batch(&mut self) -> AppResult<Option<Vec<ChangeEvent>>> {
        // PgListener reconnects on its own; a failed recv surfaces once.
        let notification = self.listener.recv().await?;
        let event: ChangeEvent = serde_json::from_str(notification.payload())?;
        debug!(
            entity = %event.entity,
            operation = ?event.operation,
            id = %event.id,
            "Change feed event"
        );
        Ok(Some(vec![event]))
    }
}
