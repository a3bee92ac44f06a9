//! In-memory store implementations for single-node deployments and tests.

pub mod directory;
pub mod notification;
pub mod settings;

pub use directory::MemoryDirectory;
pub use notification::MemoryNotificationStore;
pub use settings::MemorySettingsStore;
