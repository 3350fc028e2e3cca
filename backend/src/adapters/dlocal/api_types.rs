//! dLocal Go wire types.
//!
//! The API returns numeric ids for plans and subscriptions but string ids
//! elsewhere; ids are normalized to strings on the way in.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::billing::money;
use crate::ports::{
    CreatePaymentRequest, GatewayPlan, GatewaySubscription, PaymentResult, PaymentStatusInfo,
    PlanPage,
};

/// Accepts a string or a number and yields its text form.
fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn optional_id_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Body of `POST /v1/payments`. Amount is in minor units.
#[derive(Debug, Serialize)]
pub struct DLocalPaymentRequest {
    pub amount: i64,
    pub currency: String,
    pub country: String,
    pub order_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_url: Option<String>,
}

impl From<CreatePaymentRequest> for DLocalPaymentRequest {
    fn from(request: CreatePaymentRequest) -> Self {
        Self {
            amount: money::to_minor_units(request.amount),
            currency: request.currency,
            country: request.country,
            order_id: request.order_id,
            description: request.description,
            notification_url: request.notification_url,
            success_url: request.success_url,
            back_url: request.back_url,
        }
    }
}

/// A payment as returned by the API. Amount is in minor units.
#[derive(Debug, Deserialize)]
pub struct DLocalPayment {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    pub country: Option<String>,
    #[serde(default)]
    pub status: String,
    pub status_detail: Option<String>,
    pub order_id: Option<String>,
    pub redirect_url: Option<String>,
    pub created_date: Option<String>,
    pub approved_date: Option<String>,
}

fn major_units(minor: f64) -> f64 {
    minor / 100.0
}

impl From<DLocalPayment> for PaymentResult {
    fn from(payment: DLocalPayment) -> Self {
        Self {
            id: payment.id,
            amount: major_units(payment.amount),
            currency: payment.currency,
            country: payment.country,
            status: payment.status,
            order_id: payment.order_id,
            redirect_url: payment.redirect_url,
        }
    }
}

impl From<DLocalPayment> for PaymentStatusInfo {
    fn from(payment: DLocalPayment) -> Self {
        Self {
            id: payment.id,
            status: payment.status,
            status_detail: payment.status_detail,
            amount: major_units(payment.amount),
            currency: payment.currency,
            order_id: payment.order_id,
            created_date: payment.created_date,
            approved_date: payment.approved_date,
        }
    }
}

/// A plan as returned by the API. Amount is in major units.
#[derive(Debug, Deserialize)]
pub struct DLocalPlan {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_id_text")]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub amount: f64,
    pub frequency_type: Option<String>,
    pub frequency_value: Option<i32>,
    #[serde(default)]
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

impl From<DLocalPlan> for GatewayPlan {
    fn from(plan: DLocalPlan) -> Self {
        Self {
            id: plan.id,
            merchant_id: plan.merchant_id,
            name: plan.name,
            description: plan.description,
            country: plan.country,
            currency: plan.currency,
            amount: plan.amount,
            frequency_type: plan.frequency_type,
            frequency_value: plan.frequency_value,
            active: plan.active,
            free_trial_days: plan.free_trial_days,
            plan_token: plan.plan_token,
            subscribe_url: plan.subscribe_url,
            notification_url: plan.notification_url,
            back_url: plan.back_url,
            success_url: plan.success_url,
            error_url: plan.error_url,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
        }
    }
}

/// Paginated plan listing.
#[derive(Debug, Deserialize)]
pub struct DLocalPlanPage {
    #[serde(default)]
    pub data: Vec<DLocalPlan>,
    #[serde(default)]
    pub total_elements: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub number_of_elements: i64,
    #[serde(default)]
    pub size: i64,
}

impl From<DLocalPlanPage> for PlanPage {
    fn from(page: DLocalPlanPage) -> Self {
        Self {
            data: page.data.into_iter().map(GatewayPlan::from).collect(),
            total_elements: page.total_elements,
            total_pages: page.total_pages,
            page: page.page,
            number_of_elements: page.number_of_elements,
            size: page.size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DLocalPlanRef {
    #[serde(default, deserialize_with = "optional_id_text")]
    pub id: Option<String>,
    pub plan_token: Option<String>,
}

/// A subscription; the owning plan is nested under `plan`.
#[derive(Debug, Deserialize)]
pub struct DLocalSubscription {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub status: Option<String>,
    pub plan: Option<DLocalPlanRef>,
}

impl From<DLocalSubscription> for GatewaySubscription {
    fn from(subscription: DLocalSubscription) -> Self {
        let (plan_id, plan_token) = match subscription.plan {
            Some(plan) => (plan.id, plan.plan_token),
            None => (None, None),
        };
        Self {
            id: subscription.id,
            status: subscription.status,
            plan_id,
            plan_token,
        }
    }
}

/// Error body returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub struct DLocalErrorBody {
    pub message: Option<String>,
    pub code: Option<Value>,
}
