//! CreateSubscriptionHandler - Command handler for starting a user's subscription.

use std::sync::Arc;

use crate::domain::billing::{BillingError, NewPayment, Payment, Plan, User};
use crate::domain::foundation::{CorrelationId, DomainError, ErrorCode, PlanId, UserId};
use crate::ports::{BillingRepository, GatewayPlan, PaymentGateway, PlanRequest};

use super::callbacks::CallbackUrls;

/// Command to subscribe a user to a catalogue plan.
#[derive(Debug, Clone, Default)]
pub struct CreateSubscriptionCommand {
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
}

/// Result of a created subscription attempt.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionResult {
    /// Hosted checkout page where the user completes the subscription.
    pub subscribe_link: Option<String>,
    pub payment: Payment,
    pub gateway_plan: GatewayPlan,
    pub user: User,
    pub plan: Plan,
}

/// Handler for creating subscriptions.
///
/// A fresh gateway plan is created per attempt, named after the user, and
/// a Pending payment row records the gateway ids plus a correlation token
/// that every callback URL echoes back.
pub struct CreateSubscriptionHandler {
    repository: Arc<dyn BillingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    callbacks: CallbackUrls,
}

impl CreateSubscriptionHandler {
    pub fn new(
        repository: Arc<dyn BillingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        callbacks: CallbackUrls,
    ) -> Self {
        Self {
            repository,
            gateway,
            callbacks,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, BillingError> {
        // 1. Both ids are required
        let (user_id, plan_id) = match (non_blank(cmd.user_id), non_blank(cmd.plan_id)) {
            (Some(user_id), Some(plan_id)) => (UserId::new(user_id)?, PlanId::new(plan_id)?),
            (None, _) => {
                return Err(BillingError::validation(
                    "user_id",
                    "user_id and plan_id are required",
                ))
            }
            (_, None) => {
                return Err(BillingError::validation(
                    "plan_id",
                    "user_id and plan_id are required",
                ))
            }
        };

        // 2. Load user and plan
        let user = self
            .repository
            .get_user(&user_id)
            .await
            .map_err(|e| not_found_as(e, "User not found"))?;
        let plan = self
            .repository
            .get_plan(&plan_id)
            .await
            .map_err(|e| not_found_as(e, "Plan not found"))?;

        // 3. One live subscription per user
        if let Some(current) = self.repository.active_subscription(&user_id).await? {
            return Err(BillingError::AlreadySubscribed {
                current: Some(Box::new(current)),
            });
        }

        // 4. Gateway plan with correlated callbacks
        let correlation_id = CorrelationId::new();
        let request = self.plan_request(&plan, &user, &correlation_id);
        let gateway_plan = self.gateway.create_plan(request).await.map_err(|e| {
            tracing::error!(user_id = %user_id, plan_id = %plan_id, error = %e, "Gateway plan creation failed");
            e.into_billing("Failed to create DLocal subscription plan")
        })?;

        // 5. Pending payment row
        let new_payment = NewPayment {
            user_id: user_id.clone(),
            plan_id: plan_id.clone(),
            amount: plan.price,
            currency: plan.currency.clone(),
            description: Some(payment_description(&plan)),
            dlo_payment_id: None,
            dlocal_plan_id: Some(gateway_plan.id.clone()),
            plan_token: gateway_plan.plan_token.clone(),
            correlation_id: Some(correlation_id),
        };
        let payment = match self.repository.create_payment(new_payment).await {
            Ok(payment) => payment,
            Err(err) => {
                tracing::error!(
                    user_id = %user_id,
                    gateway_plan_id = %gateway_plan.id,
                    error = %err,
                    "Payment record not created; gateway plan left without a row"
                );
                return Err(match err.code {
                    ErrorCode::ActiveSubscriptionExists => {
                        BillingError::AlreadySubscribed { current: None }
                    }
                    _ => BillingError::persistence("Failed to create payment record"),
                });
            }
        };

        tracing::info!(
            user_id = %user_id,
            plan_id = %plan_id,
            gateway_plan_id = %gateway_plan.id,
            correlation_id = %correlation_id,
            "Subscription created with status Pending"
        );

        Ok(CreateSubscriptionResult {
            subscribe_link: gateway_plan.subscribe_url.clone(),
            payment,
            gateway_plan,
            user,
            plan,
        })
    }

    fn plan_request(&self, plan: &Plan, user: &User, correlation_id: &CorrelationId) -> PlanRequest {
        PlanRequest {
            name: plan.gateway_name_for(&user.name),
            description: plan.gateway_description_for(&user.name),
            country: None,
            currency: plan.currency.clone(),
            amount: plan.price,
            frequency_type: plan.frequency_type,
            frequency_value: plan.frequency_value,
            active: true,
            free_trial_days: 0,
            notification_url: Some(self.callbacks.notification_url(Some(correlation_id))),
            back_url: self.callbacks.back_url(),
            success_url: Some(self.callbacks.success_url(Some(correlation_id))),
            error_url: Some(self.callbacks.error_url(Some(correlation_id))),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn not_found_as(err: DomainError, message: &str) -> BillingError {
    if err.is_not_found() {
        BillingError::not_found(message)
    } else {
        err.into()
    }
}

fn payment_description(plan: &Plan) -> String {
    match plan.description.as_deref().map(str::trim) {
        Some(desc) if !desc.is_empty() => desc.to_string(),
        _ => format!("Subscription to {}", plan.plan_name),
    }
}
