//! Event sources feeding the capture adapter.

pub mod change_feed;
pub mod memory;
pub mod polling;

use async_trait::async_trait;

use movehub_core::events::ChangeEvent;
use movehub_core::result::AppResult;

use crate::stats::CaptureMode;

pub use change_feed::ChangeFeedSource;
pub use memory::MemoryChangeFeed;
pub use polling::PollingSource;

/// A stream of upstream change events.
#[async_trait]
pub trait EventSource: Send {
    /// Mode reported in adapter statistics.
    fn mode(&self) -> CaptureMode;

    /// Wait for the next batch of events.
    ///
    /// Returns `Ok(None)` once the source is exhausted. An empty batch is
    /// valid. Errors are reported per read; the caller decides whether to
    /// retry.
    async fn next_batch(&mut self) -> AppResult<Option<Vec<ChangeEvent>>>;

    /// Called once `event` from the last batch was handled successfully.
    /// Events never acknowledged may be delivered again.
    fn acknowledge(&mut self, _event: &ChangeEvent) {}
}
