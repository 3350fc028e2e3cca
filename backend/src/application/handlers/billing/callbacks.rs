//! Callback URLs handed to the gateway.
//!
//! Subscription plans carry a correlation token in the `ref` query
//! parameter of every callback so notifications can be matched to the row
//! that minted it.

use url::Url;

use crate::domain::foundation::CorrelationId;

/// Query parameter carrying the correlation token.
pub const CORRELATION_PARAM: &str = "ref";

pub const NOTIFICATION_PATH: &str = "/api/webhooks/dlocal";
pub const SUCCESS_PATH: &str = "/api/webhooks/success";
pub const ERROR_PATH: &str = "/api/webhooks/error";
pub const PAYMENT_NOTIFICATION_PATH: &str = "/api/payments/webhook";
pub const PLAN_NOTIFICATION_PATH: &str = "/api/subscriptions/webhook";

/// Builds callback URLs under the service's public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    public_base_url: String,
    back_url: Option<String>,
}

impl CallbackUrls {
    pub fn new(public_base_url: impl Into<String>, back_url: Option<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            public_base_url,
            back_url,
        }
    }

    pub fn back_url(&self) -> Option<String> {
        self.back_url.clone()
    }

    pub fn notification_url(&self, correlation: Option<&CorrelationId>) -> String {
        self.url(NOTIFICATION_PATH, correlation)
    }

    pub fn success_url(&self, correlation: Option<&CorrelationId>) -> String {
        self.url(SUCCESS_PATH, correlation)
    }

    pub fn error_url(&self, correlation: Option<&CorrelationId>) -> String {
        self.url(ERROR_PATH, correlation)
    }

    /// Log-and-acknowledge sink for one-off payments.
    pub fn payment_notification_url(&self) -> String {
        self.url(PAYMENT_NOTIFICATION_PATH, None)
    }

    /// Log-and-acknowledge sink for standalone gateway plans.
    pub fn plan_notification_url(&self) -> String {
        self.url(PLAN_NOTIFICATION_PATH, None)
    }

    fn url(&self, path: &str, correlation: Option<&CorrelationId>) -> String {
        let raw = format!("{}{}", self.public_base_url, path);
        match (Url::parse(&raw), correlation) {
            (Ok(mut url), Some(correlation)) => {
                url.query_pairs_mut()
                    .append_pair(CORRELATION_PARAM, &correlation.to_string());
                url.to_string()
            }
            (Ok(url), None) => url.to_string(),
            (Err(_), Some(correlation)) => {
                format!("{}?{}={}", raw, CORRELATION_PARAM, correlation)
            }
            (Err(_), None) => raw,
        }
    }
}
