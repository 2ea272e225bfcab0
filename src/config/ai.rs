//! AI provider configuration.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// OpenAI provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// OpenAI API key.
    pub openai_api_key: Option<String>,

    /// Default model for new conversations.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on transient failures.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

impl AiConfig {
    /// Returns the timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates the AI configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.openai_api_key.as_deref() {
            None | Some("") => Err(ValidationError::MissingRequired("ai.openai_api_key")),
            Some(_) => {
                if self.timeout_secs == 0 {
                    return Err(ValidationError::invalid(
                        "ai.timeout_secs",
                        "must be at least 1",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: default_model(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = AiConfig::default();
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn missing_key_fails_validation() {
        assert!(AiConfig::default().validate().is_err());

        let config = AiConfig {
            openai_api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn present_key_passes_validation() {
        let config = AiConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
