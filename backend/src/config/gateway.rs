//! Payment gateway (dLocal Go) configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::error::ValidationError;
use super::server::Environment;

const SANDBOX_HOST: &str = "api-sbx.dlocalgo.com";

/// dLocal Go credentials, endpoints, and callback settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// API host, sandbox by default
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Merchant API key
    pub x_login: String,

    /// Merchant secret key
    pub x_trans_key: SecretString,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Caps one-off payment amounts to sandbox limits
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,

    /// Externally reachable base URL of this service, used for callbacks
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Where the checkout's back button leads
    pub back_url: Option<String>,

    /// Secret for checking notification signatures; checks are skipped when unset
    pub webhook_secret: Option<SecretString>,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Public base URL without a trailing slash.
    pub fn public_base(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    pub fn uses_sandbox_host(&self) -> bool {
        Url::parse(&self.api_url)
            .ok()
            .and_then(|url| url.host_str().map(|h| h == SANDBOX_HOST))
            .unwrap_or(false)
    }

    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.x_login.trim().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_X_LOGIN"));
        }
        if self.x_trans_key.expose_secret().trim().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_X_TRANS_KEY"));
        }
        if !is_http_url(&self.api_url) {
            return Err(ValidationError::InvalidGatewayUrl);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if !is_http_url(&self.public_base_url) {
            return Err(ValidationError::InvalidPublicUrl);
        }

        if environment == Environment::Production {
            if self.sandbox || self.uses_sandbox_host() {
                return Err(ValidationError::SandboxInProduction);
            }
            if !self.public_base_url.starts_with("https://") {
                return Err(ValidationError::PublicUrlMustBeHttps);
            }
        }
        Ok(())
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

fn default_api_url() -> String {
    format!("https://{}", SANDBOX_HOST)
}

fn default_timeout() -> u64 {
    30
}

fn default_sandbox() -> bool {
    true
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}
