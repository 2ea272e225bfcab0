//! Application configuration module.
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Values use the `THINKBOT` prefix with
//! `__` (double underscore) separating nested sections.
//!
//! # Example
//!
//! ```no_run
//! use thinkbot::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod database;
mod error;
mod line;
mod server;
mod session;

pub use ai::AiConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use line::LineConfig;
pub use server::{Environment, ServerConfig};
pub use session::SessionConfig;

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment).
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection).
    pub database: DatabaseConfig,

    /// AI provider configuration (OpenAI).
    #[serde(default)]
    pub ai: AiConfig,

    /// LINE channel credentials.
    #[serde(default)]
    pub line: LineConfig,

    /// Conversation lifecycle tunables.
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variable Format
    ///
    /// - `THINKBOT__SERVER__PORT=8000` -> `server.port = 8000`
    /// - `THINKBOT__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// A `.env` file is loaded first if present (development).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("THINKBOT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validates all configuration sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.ai.validate()?;
        self.line.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Returns true when running in production.
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize these tests.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("THINKBOT__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("THINKBOT__AI__OPENAI_API_KEY", "sk-test");
        env::set_var("THINKBOT__LINE__CHANNEL_ACCESS_TOKEN", "token");
        env::set_var("THINKBOT__LINE__CHANNEL_SECRET", "secret");
    }

    fn clear_env() {
        env::remove_var("THINKBOT__DATABASE__URL");
        env::remove_var("THINKBOT__AI__OPENAI_API_KEY");
        env::remove_var("THINKBOT__LINE__CHANNEL_ACCESS_TOKEN");
        env::remove_var("THINKBOT__LINE__CHANNEL_SECRET");
        env::remove_var("THINKBOT__SERVER__PORT");
        env::remove_var("THINKBOT__SERVER__ENVIRONMENT");
    }

    #[test]
    fn loads_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_defaults_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.session.max_history, 20);
    }

    #[test]
    fn environment_override_sets_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("THINKBOT__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }
}
