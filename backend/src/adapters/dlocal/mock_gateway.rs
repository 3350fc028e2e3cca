//! Mock payment gateway for testing.
//!
//! In-process stand-in for `DLocalGateway` used by handler unit tests and
//! the HTTP integration tests. Supports:
//! - Plans and subscriptions held in memory
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::ports::{
    require_id, CreatePaymentRequest, GatewayError, GatewayPlan, GatewaySubscription,
    PaymentGateway, PaymentMethod, PaymentResult, PaymentStatusInfo, PlanPage, PlanRequest,
};

/// Host used for generated checkout links.
pub const MOCK_CHECKOUT_HOST: &str = "https://checkout.dlocalgo.test";

/// Mock payment gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.add_subscription(GatewaySubscription { id: "881".into(), .. });
/// gateway.set_method_error("cancel_subscription", GatewayError::api(400, "Plan is inactive"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    plans: Vec<GatewayPlan>,
    subscriptions: HashMap<String, GatewaySubscription>,
    payments: HashMap<String, PaymentStatusInfo>,
    payment_methods: Vec<PaymentMethod>,
    sequence: u64,
    method_errors: HashMap<String, GatewayError>,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a plan to the gateway's listing.
    pub fn add_plan(&self, plan: GatewayPlan) {
        self.state().plans.push(plan);
    }

    pub fn add_subscription(&self, subscription: GatewaySubscription) {
        let id = subscription.id.clone();
        self.state().subscriptions.insert(id, subscription);
    }

    pub fn set_payment_methods(&self, methods: Vec<PaymentMethod>) {
        self.state().payment_methods = methods;
    }

    /// Make every call of `method` fail with `error` until cleared.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    /// Arguments of every call to `method`, oldest first.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<String>> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.args.clone())
            .collect()
    }

    /// Plans currently held by the mock.
    pub fn plans(&self) -> Vec<GatewayPlan> {
        self.state().plans.clone()
    }

    fn record(&self, method: &str, args: Vec<String>) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        match state.method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_sequence(&self) -> u64 {
        let mut state = self.state();
        state.sequence += 1;
        1000 + state.sequence
    }
}

fn plan_from_request(id: String, request: PlanRequest) -> GatewayPlan {
    let token = format!("tok-{}", id);
    GatewayPlan {
        subscribe_url: Some(format!("{}/subscribe/{}", MOCK_CHECKOUT_HOST, token)),
        plan_token: Some(token),
        id,
        name: request.name,
        description: Some(request.description),
        country: request.country,
        currency: request.currency,
        amount: request.amount,
        frequency_type: Some(request.frequency_type.as_str().to_string()),
        frequency_value: Some(request.frequency_value),
        active: request.active,
        free_trial_days: Some(request.free_trial_days),
        notification_url: request.notification_url,
        back_url: request.back_url,
        success_url: request.success_url,
        error_url: request.error_url,
        ..GatewayPlan::default()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<PaymentResult, GatewayError> {
        self.record(
            "create_payment",
            vec![request.order_id.clone(), format!("{:.2}", request.amount)],
        )?;
        let id = format!("PAY-{}", self.next_sequence());
        self.state().payments.insert(
            id.clone(),
            PaymentStatusInfo {
                id: id.clone(),
                status: "PENDING".to_string(),
                status_detail: None,
                amount: request.amount,
                currency: request.currency.clone(),
                order_id: Some(request.order_id.clone()),
                created_date: None,
                approved_date: None,
            },
        );
        Ok(PaymentResult {
            redirect_url: Some(format!("{}/payment/{}", MOCK_CHECKOUT_HOST, id)),
            id,
            amount: request.amount,
            currency: request.currency,
            country: Some(request.country),
            status: "PENDING".to_string(),
            order_id: Some(request.order_id),
        })
    }

    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentStatusInfo, GatewayError> {
        self.record("get_payment_status", vec![payment_id.to_string()])?;
        let payment_id = require_id("payment_id", payment_id)?;
        self.state()
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::api(404, "Payment not found"))
    }

    async fn cancel_payment(&self, payment_id: &str) -> Result<Value, GatewayError> {
        self.record("cancel_payment", vec![payment_id.to_string()])?;
        let payment_id = require_id("payment_id", payment_id)?;
        let mut state = self.state();
        let payment = state
            .payments
            .get_mut(payment_id)
            .ok_or_else(|| GatewayError::api(404, "Payment not found"))?;
        payment.status = "CANCELLED".to_string();
        Ok(json!({"id": payment_id, "status": "CANCELLED"}))
    }

    async fn get_payment_methods(&self, country: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        self.record("get_payment_methods", vec![country.to_string()])?;
        Ok(self.state().payment_methods.clone())
    }

    async fn create_plan(&self, request: PlanRequest) -> Result<GatewayPlan, GatewayError> {
        self.record(
            "create_plan",
            vec![
                request.name.clone(),
                request.notification_url.clone().unwrap_or_default(),
            ],
        )?;
        let plan = plan_from_request(self.next_sequence().to_string(), request);
        self.state().plans.push(plan.clone());
        Ok(plan)
    }

    async fn get_all_plans(&self, page: u32, page_size: u32) -> Result<PlanPage, GatewayError> {
        self.record(
            "get_all_plans",
            vec![page.to_string(), page_size.to_string()],
        )?;
        let plans = self.state().plans.clone();
        let size = page_size.max(1) as usize;
        let start = (page.max(1) as usize - 1) * size;
        let data: Vec<GatewayPlan> = plans.iter().skip(start).take(size).cloned().collect();
        Ok(PlanPage {
            total_elements: plans.len() as i64,
            total_pages: plans.len().div_ceil(size) as i64,
            page: i64::from(page),
            number_of_elements: data.len() as i64,
            size: i64::from(page_size),
            data,
        })
    }

    async fn get_plan(&self, plan_id: &str) -> Result<GatewayPlan, GatewayError> {
        self.record("get_plan", vec![plan_id.to_string()])?;
        let plan_id = require_id("plan_id", plan_id)?;
        self.state()
            .plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or_else(|| GatewayError::api(404, "Plan not found"))
    }

    async fn update_plan(
        &self,
        plan_id: &str,
        request: PlanRequest,
    ) -> Result<GatewayPlan, GatewayError> {
        self.record("update_plan", vec![plan_id.to_string(), request.name.clone()])?;
        let plan_id = require_id("plan_id", plan_id)?;
        let mut state = self.state();
        let existing = state
            .plans
            .iter_mut()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| GatewayError::api(404, "Plan not found"))?;
        let mut updated = plan_from_request(plan_id.to_string(), request);
        updated.plan_token = existing.plan_token.clone();
        updated.subscribe_url = existing.subscribe_url.clone();
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<Value, GatewayError> {
        self.record("delete_plan", vec![plan_id.to_string()])?;
        let plan_id = require_id("plan_id", plan_id)?;
        let mut state = self.state();
        let before = state.plans.len();
        state.plans.retain(|p| p.id != plan_id);
        if state.plans.len() == before {
            return Err(GatewayError::api(404, "Plan not found"));
        }
        Ok(json!({"id": plan_id, "deleted": true}))
    }

    async fn cancel_subscription(
        &self,
        plan_id: &str,
        subscription_id: &str,
    ) -> Result<Value, GatewayError> {
        self.record(
            "cancel_subscription",
            vec![plan_id.to_string(), subscription_id.to_string()],
        )?;
        let plan_id = require_id("plan_id", plan_id)?;
        let subscription_id = require_id("subscription_id", subscription_id)?;
        if let Some(subscription) = self.state().subscriptions.get_mut(subscription_id) {
            subscription.status = Some("CANCELLED".to_string());
        }
        Ok(json!({
            "id": subscription_id,
            "plan_id": plan_id,
            "status": "CANCELLED"
        }))
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, GatewayError> {
        self.record("get_subscription", vec![subscription_id.to_string()])?;
        let subscription_id = require_id("subscription_id", subscription_id)?;
        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| GatewayError::api(404, "Subscription not found"))
    }
}
