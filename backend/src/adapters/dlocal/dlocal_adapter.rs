//! dLocal Go payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the dLocal Go REST API.
//! Every request carries `Authorization: Bearer <x_login>:<x_trans_key>`
//! and is bounded by a fixed timeout. There is no retry.
//!
//! # Configuration
//!
//! ```ignore
//! let config = DLocalConfig::new(x_login, x_trans_key)
//!     .with_base_url("https://api-sbx.dlocalgo.com");
//! let gateway = DLocalGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::ports::{
    require_id, CreatePaymentRequest, GatewayError, GatewayPlan, GatewaySubscription,
    PaymentGateway, PaymentMethod, PaymentResult, PaymentStatusInfo, PlanPage, PlanRequest,
};

use super::api_types::{
    DLocalErrorBody, DLocalPayment, DLocalPaymentRequest, DLocalPlan, DLocalPlanPage,
    DLocalSubscription,
};

/// Sandbox API host.
pub const SANDBOX_API_URL: &str = "https://api-sbx.dlocalgo.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// dLocal Go API configuration.
#[derive(Clone)]
pub struct DLocalConfig {
    x_login: SecretString,
    x_trans_key: SecretString,
    api_base_url: String,
    timeout: Duration,
}

impl DLocalConfig {
    pub fn new(x_login: impl Into<String>, x_trans_key: impl Into<String>) -> Self {
        Self {
            x_login: SecretString::new(x_login.into()),
            x_trans_key: SecretString::new(x_trans_key.into()),
            api_base_url: SANDBOX_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point the client at another host (production, or a local fake in tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn bearer_token(&self) -> String {
        format!(
            "{}:{}",
            self.x_login.expose_secret(),
            self.x_trans_key.expose_secret()
        )
    }
}

impl std::fmt::Debug for DLocalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DLocalConfig")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// dLocal Go gateway client.
pub struct DLocalGateway {
    config: DLocalConfig,
    base_url: Url,
    http_client: reqwest::Client,
}

impl DLocalGateway {
    /// Build the client. Fails on an unparseable base URL or TLS setup error.
    pub fn new(config: DLocalConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| GatewayError::invalid_input(format!("Invalid API URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::invalid_input(format!(
                "Invalid API URL: {}",
                config.api_base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::request(e.to_string()))?;

        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::invalid_input("Invalid API URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(self.config.bearer_token())
    }

    /// Send a request and decode a successful JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(operation, e))?;

        let response = ensure_success(operation, response).await?;

        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "dLocal response could not be decoded");
            GatewayError::request(format!("Failed to parse dLocal response: {}", e))
        })
    }
}

fn classify_transport_error(operation: &'static str, error: reqwest::Error) -> GatewayError {
    if error.is_builder() {
        tracing::error!(operation, error = %error, "dLocal request could not be built");
        GatewayError::request(error.to_string())
    } else {
        tracing::error!(
            operation,
            error = %error,
            timeout = error.is_timeout(),
            "dLocal request got no response"
        );
        GatewayError::network(error.to_string())
    }
}

async fn ensure_success(
    operation: &'static str,
    response: Response,
) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    tracing::error!(
        operation,
        status = status.as_u16(),
        error = %error_text,
        "dLocal API returned an error"
    );

    let body: Option<Value> = serde_json::from_str(&error_text).ok();
    let message = body
        .as_ref()
        .and_then(|b| serde_json::from_value::<DLocalErrorBody>(b.clone()).ok())
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));

    Err(GatewayError::Api {
        status: status.as_u16(),
        message,
        body,
    })
}

#[async_trait]
impl PaymentGateway for DLocalGateway {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<PaymentResult, GatewayError> {
        tracing::info!(
            order_id = %request.order_id,
            amount = request.amount,
            currency = %request.currency,
            "Creating dLocal payment"
        );
        let url = self.endpoint(&["v1", "payments"])?;
        let body = DLocalPaymentRequest::from(request);
        let payment: DLocalPayment = self
            .execute("create_payment", self.request(Method::POST, url).json(&body))
            .await?;
        Ok(payment.into())
    }

    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentStatusInfo, GatewayError> {
        let payment_id = require_id("payment_id", payment_id)?;
        let url = self.endpoint(&["v1", "payments", payment_id])?;
        let payment: DLocalPayment = self
            .execute("get_payment_status", self.request(Method::GET, url))
            .await?;
        Ok(payment.into())
    }

    async fn cancel_payment(&self, payment_id: &str) -> Result<Value, GatewayError> {
        let payment_id = require_id("payment_id", payment_id)?;
        let url = self.endpoint(&["v1", "payments", payment_id, "cancel"])?;
        self.execute("cancel_payment", self.request(Method::POST, url))
            .await
    }

    async fn get_payment_methods(&self, country: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        let country = require_id("country", country)?;
        let mut url = self.endpoint(&["v1", "payment-methods"])?;
        url.query_pairs_mut().append_pair("country", country);
        self.execute("get_payment_methods", self.request(Method::GET, url))
            .await
    }

    async fn create_plan(&self, request: PlanRequest) -> Result<GatewayPlan, GatewayError> {
        tracing::info!(
            name = %request.name,
            amount = request.amount,
            currency = %request.currency,
            "Creating dLocal subscription plan"
        );
        let url = self.endpoint(&["v1", "subscription", "plan"])?;
        let plan: DLocalPlan = self
            .execute("create_plan", self.request(Method::POST, url).json(&request))
            .await?;
        Ok(plan.into())
    }

    async fn get_all_plans(&self, page: u32, page_size: u32) -> Result<PlanPage, GatewayError> {
        let mut url = self.endpoint(&["v1", "subscription", "plan", "all"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        let plans: DLocalPlanPage = self
            .execute("get_all_plans", self.request(Method::GET, url))
            .await?;
        Ok(plans.into())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<GatewayPlan, GatewayError> {
        let plan_id = require_id("plan_id", plan_id)?;
        let url = self.endpoint(&["v1", "subscription", "plan", plan_id])?;
        let plan: DLocalPlan = self
            .execute("get_plan", self.request(Method::GET, url))
            .await?;
        Ok(plan.into())
    }

    async fn update_plan(
        &self,
        plan_id: &str,
        request: PlanRequest,
    ) -> Result<GatewayPlan, GatewayError> {
        let plan_id = require_id("plan_id", plan_id)?;
        let url = self.endpoint(&["v1", "subscription", "plan", plan_id])?;
        let plan: DLocalPlan = self
            .execute("update_plan", self.request(Method::PUT, url).json(&request))
            .await?;
        Ok(plan.into())
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<Value, GatewayError> {
        let plan_id = require_id("plan_id", plan_id)?;
        let url = self.endpoint(&["v1", "subscription", "plan", plan_id])?;
        self.execute("delete_plan", self.request(Method::DELETE, url))
            .await
    }

    async fn cancel_subscription(
        &self,
        plan_id: &str,
        subscription_id: &str,
    ) -> Result<Value, GatewayError> {
        let plan_id = require_id("plan_id", plan_id)?;
        let subscription_id = require_id("subscription_id", subscription_id)?;
        tracing::info!(plan_id, subscription_id, "Deactivating dLocal subscription");
        let url = self.endpoint(&[
            "v1",
            "subscription",
            "plan",
            plan_id,
            "subscription",
            subscription_id,
            "deactivate",
        ])?;
        self.execute("cancel_subscription", self.request(Method::PATCH, url))
            .await
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, GatewayError> {
        let subscription_id = require_id("subscription_id", subscription_id)?;
        let url = self.endpoint(&["v1", "subscription", subscription_id])?;
        let subscription: DLocalSubscription = self
            .execute("get_subscription", self.request(Method::GET, url))
            .await?;
        Ok(subscription.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base: &str) -> DLocalGateway {
        DLocalGateway::new(DLocalConfig::new("login", "key").with_base_url(base)).unwrap()
    }

    #[test]
    fn bearer_token_joins_login_and_key() {
        let config = DLocalConfig::new("login", "key");
        assert_eq!(config.bearer_token(), "login:key");
    }

    #[test]
    fn debug_output_hides_credentials() {
        let rendered = format!("{:?}", DLocalConfig::new("login-123", "key-456"));
        assert!(!rendered.contains("login-123"));
        assert!(!rendered.contains("key-456"));
    }

    #[test]
    fn endpoint_appends_segments_to_base() {
        let url = gateway("https://api-sbx.dlocalgo.com")
            .endpoint(&["v1", "subscription", "plan", "42"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api-sbx.dlocalgo.com/v1/subscription/plan/42");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let url = gateway("http://127.0.0.1:9999/dlocal/")
            .endpoint(&["v1", "payments"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9999/dlocal/v1/payments");
    }

    #[test]
    fn endpoint_encodes_unsafe_identifiers() {
        let url = gateway("https://api-sbx.dlocalgo.com")
            .endpoint(&["v1", "payments", "a/b c"])
            .unwrap();
        assert_eq!(url.path(), "/v1/payments/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = DLocalGateway::new(DLocalConfig::new("l", "k").with_base_url("not a url"));
        assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn cancel_subscription_fails_fast_on_blank_ids() {
        let gateway = gateway("http://127.0.0.1:9");

        let err = gateway.cancel_subscription("", "sub-1").await.unwrap_err();
        assert_eq!(err, GatewayError::invalid_input("plan_id is required"));

        let err = gateway.cancel_subscription("42", "  ").await.unwrap_err();
        assert_eq!(err, GatewayError::invalid_input("subscription_id is required"));
    }

    #[tokio::test]
    async fn get_subscription_fails_fast_on_blank_id() {
        let err = gateway("http://127.0.0.1:9")
            .get_subscription("")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let gateway = DLocalGateway::new(
            DLocalConfig::new("l", "k")
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let err = gateway.get_plan("42").await.unwrap_err();
        assert_eq!(err.kind(), "Network error");
    }
}
