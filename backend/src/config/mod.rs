//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `SUBSCRIPTION_GATEWAY`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use subscription_gateway::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod features;
mod gateway;
mod server;
mod support;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use gateway::GatewayConfig;
pub use server::{Environment, ServerConfig};
pub use support::SupportConfig;

use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SUBSCRIPTION_GATEWAY";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection
    pub database: DatabaseConfig,

    /// dLocal Go credentials and callback URLs
    pub gateway: GatewayConfig,

    /// WhatsApp hand-off for confirmation pages
    #[serde(default)]
    pub support: SupportConfig,

    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` when present, then reads variables such as:
    ///
    /// - `SUBSCRIPTION_GATEWAY__SERVER__PORT=8080` -> `server.port`
    /// - `SUBSCRIPTION_GATEWAY__GATEWAY__X_LOGIN=...` -> `gateway.x_login`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when required variables are missing or a value
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic validation of every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.gateway.validate(self.server.environment)?;
        self.support.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUBSCRIPTION_GATEWAY__DATABASE__URL",
        "SUBSCRIPTION_GATEWAY__GATEWAY__X_LOGIN",
        "SUBSCRIPTION_GATEWAY__GATEWAY__X_TRANS_KEY",
        "SUBSCRIPTION_GATEWAY__GATEWAY__SANDBOX",
        "SUBSCRIPTION_GATEWAY__SERVER__PORT",
        "SUBSCRIPTION_GATEWAY__SERVER__ENVIRONMENT",
        "SUBSCRIPTION_GATEWAY__FEATURES__PENDING_PAYMENT_FALLBACK",
        "SUBSCRIPTION_GATEWAY__FEATURES__UNKNOWN_WEBHOOK_EVENTS",
        "SUBSCRIPTION_GATEWAY__SUPPORT__WHATSAPP_PHONE",
    ];

    fn set_minimal_env() {
        env::set_var("SUBSCRIPTION_GATEWAY__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("SUBSCRIPTION_GATEWAY__GATEWAY__X_LOGIN", "login");
        env::set_var("SUBSCRIPTION_GATEWAY__GATEWAY__X_TRANS_KEY", "trans-key");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let config = load_with(&[]).expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.gateway.x_login, "login");
        assert_eq!(config.gateway.api_url, "https://api-sbx.dlocalgo.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_section_defaults() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert!(config.gateway.sandbox);
        assert!(config.features.pending_payment_fallback);
        assert_eq!(config.support.payment_message, "Ya realicé el pago");
    }

    #[test]
    fn test_nested_overrides() {
        let config = load_with(&[
            ("SUBSCRIPTION_GATEWAY__SERVER__PORT", "3000"),
            ("SUBSCRIPTION_GATEWAY__FEATURES__PENDING_PAYMENT_FALLBACK", "false"),
            ("SUBSCRIPTION_GATEWAY__FEATURES__UNKNOWN_WEBHOOK_EVENTS", "ignore"),
            ("SUBSCRIPTION_GATEWAY__SUPPORT__WHATSAPP_PHONE", "573001234567"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(!config.features.pending_payment_fallback);
        assert_eq!(
            config.features.unknown_webhook_events,
            crate::domain::billing::UnknownEventPolicy::Ignore
        );
        assert_eq!(config.support.whatsapp_phone.as_deref(), Some("573001234567"));
    }

    #[test]
    fn test_production_rejects_sandbox() {
        let config = load_with(&[("SUBSCRIPTION_GATEWAY__SERVER__ENVIRONMENT", "production")])
            .unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::SandboxInProduction));
    }

    #[test]
    fn test_missing_gateway_credentials_fail_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("SUBSCRIPTION_GATEWAY__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
