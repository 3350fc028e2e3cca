//! Payment gateway port.
//!
//! Contract for the hosted payment processor: one-off payments, recurring
//! plans, and subscription cancellation. Amounts cross this port in major
//! units; adapters convert to whatever the wire format expects.
//!
//! No operation panics or lets a transport error escape: every failure is
//! classified into a [`GatewayError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::billing::{BillingError, FrequencyType};

/// Port for the payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a one-off payment and return its checkout link.
    async fn create_payment(&self, request: CreatePaymentRequest)
        -> Result<PaymentResult, GatewayError>;

    /// Look up a payment by the gateway's id.
    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentStatusInfo, GatewayError>;

    /// Cancel a payment that has not settled yet.
    async fn cancel_payment(&self, payment_id: &str) -> Result<Value, GatewayError>;

    /// Payment methods offered in a country.
    async fn get_payment_methods(&self, country: &str) -> Result<Vec<PaymentMethod>, GatewayError>;

    /// Create a recurring plan. The response carries the subscribe link.
    async fn create_plan(&self, request: PlanRequest) -> Result<GatewayPlan, GatewayError>;

    /// One page of the merchant's plans.
    async fn get_all_plans(&self, page: u32, page_size: u32) -> Result<PlanPage, GatewayError>;

    async fn get_plan(&self, plan_id: &str) -> Result<GatewayPlan, GatewayError>;

    async fn update_plan(&self, plan_id: &str, request: PlanRequest)
        -> Result<GatewayPlan, GatewayError>;

    async fn delete_plan(&self, plan_id: &str) -> Result<Value, GatewayError>;

    /// Deactivate one subscription of a plan.
    ///
    /// Fails with [`GatewayError::InvalidInput`] when either id is blank.
    async fn cancel_subscription(
        &self,
        plan_id: &str,
        subscription_id: &str,
    ) -> Result<Value, GatewayError>;

    /// Fetch a subscription, including the plan it belongs to.
    async fn get_subscription(&self, subscription_id: &str)
        -> Result<GatewaySubscription, GatewayError>;
}

/// Request for a one-off payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePaymentRequest {
    pub amount: f64,
    pub currency: String,
    pub country: String,
    pub order_id: String,
    pub description: String,
    pub notification_url: Option<String>,
    pub success_url: Option<String>,
    pub back_url: Option<String>,
}

/// A created payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub country: Option<String>,
    pub status: String,
    pub order_id: Option<String>,
    pub redirect_url: Option<String>,
}

/// Current state of a payment on the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusInfo {
    pub id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub order_id: Option<String>,
    pub created_date: Option<String>,
    pub approved_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub method_type: Option<String>,
}

/// Definition of a recurring plan sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRequest {
    pub name: String,
    pub description: String,
    pub country: Option<String>,
    pub currency: String,
    pub amount: f64,
    pub frequency_type: FrequencyType,
    pub frequency_value: i32,
    pub active: bool,
    pub free_trial_days: i32,
    pub notification_url: Option<String>,
    pub back_url: Option<String>,
    pub success_url: Option<String>,
    pub error_url: Option<String>,
}

/// A plan as stored by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayPlan {
    pub id: String,
    pub merchant_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub country: Option<String>,
    pub currency: String,
    pub amount: f64,
    pub frequency_type: Option<String>,
    pub frequency_value: Option<i32>,
    pub active: bool,
    pub free_trial_days: Option<i32>,
    pub plan_token: Option<String>,
    pub subscribe_url: Option<String>,
    pub notification_url: Option<String>,
    pub back_url: Option<String>,
    pub success_url: Option<String>,
    pub error_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// One page of plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanPage {
    pub data: Vec<GatewayPlan>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub page: i64,
    pub number_of_elements: i64,
    pub size: i64,
}

/// A subscription as reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: Option<String>,
    pub plan_id: Option<String>,
    pub plan_token: Option<String>,
}

/// Classified gateway failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success status.
    #[error("API Error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// No response was received (connect failure, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built or the response could not be read.
    #[error("Request Error: {0}")]
    Request(String),

    /// Rejected locally before any request was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GatewayError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Api {
            status,
            message: message.into(),
            body: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        GatewayError::Network(message.into())
    }

    pub fn request(message: impl Into<String>) -> Self {
        GatewayError::Request(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput(message.into())
    }

    /// Short classification label used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Api { .. } => "API Error",
            GatewayError::Network(_) => "Network error",
            GatewayError::Request(_) => "Request Error",
            GatewayError::InvalidInput(_) => "Invalid input",
        }
    }

    /// Upstream (or local) explanation without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::Api { message, .. } => message,
            GatewayError::Network(message)
            | GatewayError::Request(message)
            | GatewayError::InvalidInput(message) => message,
        }
    }

    /// Wraps the failure as a billing error for the operation named by `context`.
    pub fn into_billing(self, context: impl Into<String>) -> BillingError {
        BillingError::gateway(context, self.kind(), self.message())
    }
}

/// Rejects blank identifiers before any request is sent.
pub fn require_id<'a>(field: &str, value: &'a str) -> Result<&'a str, GatewayError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(GatewayError::invalid_input(format!("{} is required", field)))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
        fn _assert_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_send_sync::<std::sync::Arc<dyn PaymentGateway>>();
    }

    #[test]
    fn error_kinds_follow_classification() {
        assert_eq!(GatewayError::api(422, "bad").kind(), "API Error");
        assert_eq!(GatewayError::network("timeout").kind(), "Network error");
        assert_eq!(GatewayError::request("builder").kind(), "Request Error");
        assert_eq!(GatewayError::invalid_input("x").kind(), "Invalid input");
    }

    #[test]
    fn into_billing_keeps_upstream_message() {
        let err = GatewayError::api(400, "Plan is inactive").into_billing("Failed to cancel");
        match err {
            BillingError::Gateway {
                context,
                error,
                message,
                ..
            } => {
                assert_eq!(context, "Failed to cancel");
                assert_eq!(error, "API Error");
                assert_eq!(message, "Plan is inactive");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn require_id_rejects_blank_values() {
        assert_eq!(require_id("plan_id", " 42 "), Ok("42"));
        assert!(matches!(
            require_id("subscription_id", "  "),
            Err(GatewayError::InvalidInput(_))
        ));
    }

    #[test]
    fn plan_request_serializes_frequency_in_gateway_spelling() {
        let request = PlanRequest {
            name: "Pro - Ana".to_string(),
            description: "Pro".to_string(),
            country: None,
            currency: "USD".to_string(),
            amount: 19.9,
            frequency_type: FrequencyType::Monthly,
            frequency_value: 1,
            active: true,
            free_trial_days: 0,
            notification_url: None,
            back_url: None,
            success_url: None,
            error_url: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["frequency_type"], "MONTHLY");
    }
}
