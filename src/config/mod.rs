//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `ACTIVITY_RELAY` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use activity_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod catalog;
mod database;
mod dispatch;
mod error;
mod redis;
mod security;
mod server;

pub use catalog::CatalogConfig;
pub use database::DatabaseConfig;
pub use dispatch::DispatchConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use security::SecurityConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Activity store (PostgreSQL)
    pub database: DatabaseConfig,

    /// Broadcast transport (Redis pub/sub, optional)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Tracked entity and resource names
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Per-subscriber output limits
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Token validation and signing secrets
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `ACTIVITY_RELAY__*` variables:
    ///
    /// - `ACTIVITY_RELAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ACTIVITY_RELAY__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ACTIVITY_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.catalog.validate()?;
        self.dispatch.validate()?;
        self.security.validate(&self.server.environment)?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
