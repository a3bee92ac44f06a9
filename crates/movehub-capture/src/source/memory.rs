//! In-process change feed backed by a broadcast channel.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use movehub_core::events::ChangeEvent;
use movehub_core::result::AppResult;

use super::EventSource;
use crate::stats::CaptureMode;

/// Consumes events published by the in-memory directory.
#[derive(Debug)]
pub struct MemoryChangeFeed {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl MemoryChangeFeed {
    /// Wrap a broadcast receiver.
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl EventSource for MemoryChangeFeed {
    fn mode(&self) -> CaptureMode {
        CaptureMode::InMemory
    }

    async fn next_batch(&mut self) -> AppResult<Option<Vec<ChangeEvent>>> {
        match self.receiver.recv().await {
            Ok(event) => Ok(Some(vec![event])),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "In-memory change feed lagged; events dropped");
                Ok(Some(Vec::new()))
            }
            Err(broadcast::error::RecvError::Closed) => Ok(None),
        }
    }
}
