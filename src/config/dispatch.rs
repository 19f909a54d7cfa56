//! Live dispatch configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_WRITE_TIMEOUT_MS: u64 = 60_000;

/// Per-subscriber output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Notifications buffered per subscriber; a write to a full queue evicts it
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long one socket write may take before the connection is closed
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl DispatchConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        if self.write_timeout_ms == 0 || self.write_timeout_ms > MAX_WRITE_TIMEOUT_MS {
            return Err(ValidationError::InvalidWriteTimeout);
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_write_timeout_ms() -> u64 {
    2_000
}
