//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid event catalog: {0}")]
    InvalidCatalog(String),

    #[error("Subscriber queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("Subscriber write timeout must be between 1ms and 60s")]
    InvalidWriteTimeout,

    #[error("Secret too short: {0} must be at least 32 bytes in production")]
    WeakSecret(&'static str),
}
