//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! `config/default.toml`, an environment overlay, and `MOVEHUB__*`
//! environment variables. Every field has a serde default so an empty
//! configuration is valid.

pub mod app;
pub mod database;
pub mod logging;
pub mod notifications;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::database::{DatabaseConfig, DatabaseProvider};
pub use self::logging::LoggingConfig;
pub use self::notifications::{
    CaptureConfig, CleanupScheduleConfig, LifecycleConfig, NotificationsConfig,
    MAX_RETENTION_DAYS, ReconciliationConfig, RetentionPolicy,
};

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name (`development`, `production`, ...).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Notification subsystem settings.
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl AppConfig {
    /// Load configuration for the given environment.
    ///
    /// Merges `config/default`, `config/{env}`, and environment variables
    /// prefixed with `MOVEHUB__` (double underscore separates sections).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .set_default("environment", env)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MOVEHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.notifications.retention.validate()?;
        tracing::debug!(environment = %loaded.environment, "Configuration loaded");
        Ok(loaded)
    }

    /// Whether this is a production deployment.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_environment() -> String {
    "development".to_string()
}
