//! Gateway plan handlers - Standalone plans managed directly on the gateway.
//!
//! These plans are not tied to a user or a local catalogue row. They leave
//! the country out so the hosted checkout shows its country selector.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::billing::{money, BillingError, FrequencyType};
use crate::ports::{GatewayPlan, PaymentGateway, PlanPage, PlanRequest};

use super::callbacks::CallbackUrls;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

const DEFAULT_PLAN_DESCRIPTION: &str = "Plan de Suscripción";

/// Plan definition as submitted by an operator.
#[derive(Debug, Clone, Default)]
pub struct GatewayPlanCommand {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub frequency_type: Option<String>,
    pub frequency_value: Option<i32>,
}

impl GatewayPlanCommand {
    fn into_request(self, callbacks: &CallbackUrls) -> Result<PlanRequest, BillingError> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(BillingError::validation("name", "Plan name is required")),
        };
        let amount = match self.amount {
            Some(amount) if money::is_valid_amount(amount) => amount,
            _ => return Err(BillingError::validation("amount", "Valid amount is required")),
        };
        let frequency_type = match self.frequency_type.as_deref() {
            None => FrequencyType::default(),
            Some(raw) => raw.parse::<FrequencyType>().map_err(|_| {
                BillingError::validation(
                    "frequency_type",
                    "Invalid frequency. Supported: DAILY, WEEKLY, MONTHLY, YEARLY",
                )
            })?,
        };
        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("USD")
            .to_uppercase();
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLAN_DESCRIPTION.to_string());

        Ok(PlanRequest {
            name,
            description,
            country: None,
            currency,
            amount,
            frequency_type,
            frequency_value: self.frequency_value.filter(|v| *v > 0).unwrap_or(1),
            active: true,
            free_trial_days: 0,
            notification_url: Some(callbacks.plan_notification_url()),
            back_url: callbacks.back_url(),
            success_url: None,
            error_url: None,
        })
    }
}

/// Handler for standalone gateway plans.
pub struct GatewayPlansHandler {
    gateway: Arc<dyn PaymentGateway>,
    callbacks: CallbackUrls,
}

impl GatewayPlansHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, callbacks: CallbackUrls) -> Self {
        Self { gateway, callbacks }
    }

    pub async fn create(&self, cmd: GatewayPlanCommand) -> Result<GatewayPlan, BillingError> {
        let request = cmd.into_request(&self.callbacks)?;
        let plan = self.gateway.create_plan(request).await.map_err(|e| {
            tracing::error!(error = %e, "Gateway plan creation failed");
            e.into_billing("Failed to create subscription plan")
        })?;
        tracing::info!(plan_id = %plan.id, name = %plan.name, "Gateway plan created");
        Ok(plan)
    }

    /// One page of plans; missing or zero paging values take the defaults.
    pub async fn list(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<PlanPage, BillingError> {
        let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let page_size = page_size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        self.gateway
            .get_all_plans(page, page_size)
            .await
            .map_err(|e| e.into_billing("Failed to get plans"))
    }

    pub async fn get(&self, plan_id: &str) -> Result<GatewayPlan, BillingError> {
        if plan_id.trim().is_empty() {
            return Err(BillingError::validation("plan_id", "Plan ID is required"));
        }
        self.gateway.get_plan(plan_id).await.map_err(|e| {
            tracing::warn!(plan_id, error = %e, "Gateway plan lookup failed");
            BillingError::not_found(e.message())
        })
    }

    pub async fn update(
        &self,
        plan_id: &str,
        cmd: GatewayPlanCommand,
    ) -> Result<GatewayPlan, BillingError> {
        if plan_id.trim().is_empty() {
            return Err(BillingError::validation("plan_id", "Plan ID is required"));
        }
        let request = cmd.into_request(&self.callbacks)?;
        self.gateway
            .update_plan(plan_id, request)
            .await
            .map_err(|e| e.into_billing("Failed to update plan"))
    }

    pub async fn delete(&self, plan_id: &str) -> Result<Value, BillingError> {
        if plan_id.trim().is_empty() {
            return Err(BillingError::validation("plan_id", "Plan ID is required"));
        }
        let response = self
            .gateway
            .delete_plan(plan_id)
            .await
            .map_err(|e| e.into_billing("Failed to delete plan"))?;
        tracing::info!(plan_id, "Gateway plan deleted");
        Ok(response)
    }
}
