//! LINE channel configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// LINE Messaging API channel credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineConfig {
    /// Long-lived channel access token for outbound pushes.
    pub channel_access_token: Option<String>,

    /// Channel secret for webhook signature verification.
    pub channel_secret: Option<String>,
}

impl LineConfig {
    /// Validates the channel configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self
            .channel_access_token
            .as_deref()
            .map_or(true, str::is_empty)
        {
            return Err(ValidationError::MissingRequired("line.channel_access_token"));
        }
        if self.channel_secret.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingRequired("line.channel_secret"));
        }
        Ok(())
    }
}
