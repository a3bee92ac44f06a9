//! PostgreSQL implementations of the store traits.

pub mod directory;
pub mod notification;
pub mod settings;

pub use directory::DirectoryRepository;
pub use notification::NotificationRepository;
pub use settings::SettingsRepository;
