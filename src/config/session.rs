//! Conversation session configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Tunables for conversation lifecycle and context.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Minutes of inactivity before a conversation is expired.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_minutes: i64,

    /// Context window size over message history.
    #[serde(default = "default_max_history")]
    pub max_history: u32,

    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    /// Validates the session configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.idle_timeout_minutes <= 0 {
            return Err(ValidationError::invalid(
                "session.idle_timeout_minutes",
                "must be positive",
            ));
        }
        if self.max_history == 0 {
            return Err(ValidationError::invalid(
                "session.max_history",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout(),
            max_history: default_max_history(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_idle_timeout() -> i64 {
    30
}

fn default_max_history() -> u32 {
    20
}

fn default_sweep_interval() -> u64 {
    300
}
