//! Broadcast transport configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Redis pub/sub settings for cross-instance fan-out.
///
/// Without a URL the relay runs single-instance on an in-process transport.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Pub/sub channel carrying change messages
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl RedisConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().map(|u| !u.is_empty()).unwrap_or(false)
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ValidationError::InvalidRedisUrl);
            }
        }
        if self.channel.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__CHANNEL"));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            channel: default_channel(),
        }
    }
}

fn default_channel() -> String {
    "activity:changes".to_string()
}
