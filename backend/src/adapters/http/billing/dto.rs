//! Request and response DTOs for the billing endpoints.
//!
//! Field names follow what existing clients of the gateway service send
//! and read, which mixes snake_case requests with camelCase responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::handlers::billing::{
    CancelSubscriptionCommand, CreateSubscriptionCommand, GatewayPlanCommand,
    SimplePaymentCommand,
};
use crate::domain::billing::{Payment, User};
use crate::ports::GatewayPlan;

// ════════════════════════════════════════════════════════════════════════════════
// Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Standard `{success, data?, error?, message?, details?}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope<T = Value> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiEnvelope<Value> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
}

impl From<CreateSubscriptionRequest> for CreateSubscriptionCommand {
    fn from(req: CreateSubscriptionRequest) -> Self {
        Self {
            user_id: req.user_id,
            plan_id: req.plan_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    pub user_id: Option<String>,
    pub plan_token: Option<String>,
    pub subscription_id: Option<String>,
    pub dlocal_plan_id: Option<String>,
}

impl From<CancelSubscriptionRequest> for CancelSubscriptionCommand {
    fn from(req: CancelSubscriptionRequest) -> Self {
        Self {
            user_id: req.user_id,
            plan_token: req.plan_token,
            subscription_id: req.subscription_id,
            dlocal_plan_id: req.dlocal_plan_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimplePaymentRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
}

impl From<SimplePaymentRequest> for SimplePaymentCommand {
    fn from(req: SimplePaymentRequest) -> Self {
        Self {
            amount: req.amount,
            currency: req.currency,
            country: req.country,
            description: req.description,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub frequency_type: Option<String>,
    pub frequency_value: Option<i32>,
}

impl From<GatewayPlanRequest> for GatewayPlanCommand {
    fn from(req: GatewayPlanRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            amount: req.amount,
            currency: req.currency,
            frequency_type: req.frequency_type,
            frequency_value: req.frequency_value,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlansQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodsQuery {
    pub country: Option<String>,
}

/// Query string on the notification URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "ref")]
    pub correlation_ref: Option<String>,
}

/// Query string the gateway appends when redirecting the payer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectQuery {
    #[serde(rename = "ref")]
    pub correlation_ref: Option<String>,
    pub payment_id: Option<String>,
    pub subscription_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppQuery {
    pub message: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

/// Summary of a gateway plan as shown to API clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanInfo {
    pub plan_id: String,
    pub plan_token: Option<String>,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    pub country: String,
    pub frequency: String,
    pub active: bool,
}

impl From<&GatewayPlan> for PlanInfo {
    fn from(plan: &GatewayPlan) -> Self {
        Self {
            plan_id: plan.id.clone(),
            plan_token: plan.plan_token.clone(),
            name: plan.name.clone(),
            amount: plan.amount,
            currency: plan.currency.clone(),
            country: plan
                .country
                .clone()
                .unwrap_or_else(|| "Multi-país".to_string()),
            frequency: format!(
                "{} {}",
                plan.frequency_value.unwrap_or(1),
                plan.frequency_type.as_deref().unwrap_or_default()
            ),
            active: plan.active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionResponse {
    pub success: bool,
    pub subscribe_link: Option<String>,
    pub payment: Payment,
    pub plan_info: PlanInfo,
    pub user_info: UserInfo,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelSubscriptionResponse {
    pub success: bool,
    pub message: String,
    pub dlocal: Value,
    pub payment: Payment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanResponse {
    pub success: bool,
    pub subscribe_link: Option<String>,
    pub plan_info: PlanInfo,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplePaymentResponse {
    pub success: bool,
    pub payment_link: Option<String>,
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    pub currency: String,
    pub country: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub subscription_id: Option<String>,
    pub new_status: Option<String>,
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedirectErrorResponse {
    pub success: bool,
    pub message: String,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub version: String,
}
