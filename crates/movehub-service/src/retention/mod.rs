//! Retention policy ownership.

pub mod settings;

pub use settings::RetentionSettings;
