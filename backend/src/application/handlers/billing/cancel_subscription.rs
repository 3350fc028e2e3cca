//! CancelSubscriptionHandler - Command handler for cancelling a user's subscription.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::domain::billing::{BillingError, ChangeSource, Payment, PaymentStatus, PaymentTarget};
use crate::domain::foundation::UserId;
use crate::ports::{BillingRepository, PaymentGateway};

use super::apply_lifecycle::{EffectOutcome, LifecycleApplier};

/// Page fetched when resolving a plan id from its token.
const PLAN_LOOKUP_PAGE_SIZE: u32 = 50;

/// Command to cancel the active subscription of a user.
///
/// The optional fields override what the payment row records, for rows
/// written before the gateway ids were stored.
#[derive(Debug, Clone, Default)]
pub struct CancelSubscriptionCommand {
    pub user_id: Option<String>,
    pub plan_token: Option<String>,
    pub subscription_id: Option<String>,
    pub dlocal_plan_id: Option<String>,
}

/// Result of a successful cancellation.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub payment: Payment,
    pub plan_id: String,
    pub subscription_id: String,
    /// Raw gateway response.
    pub gateway_response: Value,
    pub effects: Vec<EffectOutcome>,
}

/// Gateway identifiers being resolved for one cancellation.
#[derive(Debug, Default)]
struct ResolvedIds {
    plan_id: Option<String>,
    plan_token: Option<String>,
    subscription_id: Option<String>,
}

impl ResolvedIds {
    fn diagnostics(&self) -> Value {
        json!({
            "planToken": self.plan_token,
            "subscriptionId": self.subscription_id,
        })
    }
}

/// Handler for cancelling subscriptions.
///
/// Resolves the gateway plan id and subscription id from, in order: caller
/// overrides, the payment row, the user's recent rows, the gateway plan
/// listing (by token), and the gateway subscription record.
pub struct CancelSubscriptionHandler {
    repository: Arc<dyn BillingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: LifecycleApplier,
}

impl CancelSubscriptionHandler {
    pub fn new(repository: Arc<dyn BillingRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            lifecycle: LifecycleApplier::new(repository.clone()),
            repository,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let user_id = match cmd.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => UserId::new(id)?,
            _ => return Err(BillingError::validation("user_id", "user_id is required")),
        };

        // 1. The live subscription row
        let payment = self
            .repository
            .get_active_payment_by_user(&user_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Active subscription not found"))?;

        // 2. Gateway identifiers
        let ids = self.resolve_ids(&user_id, &payment, &cmd).await?;
        let subscription_id = ids.subscription_id.clone().ok_or_else(|| {
            BillingError::MissingIdentifier {
                message: "Missing subscription id/token. Pass subscription_id in body to override."
                    .to_string(),
                details: ids.diagnostics(),
            }
        })?;
        let plan_id = ids.plan_id.clone().ok_or_else(|| BillingError::MissingIdentifier {
            message: "Missing DLocal plan id".to_string(),
            details: ids.diagnostics(),
        })?;

        // 3. Deactivate on the gateway
        let gateway_response = self
            .gateway
            .cancel_subscription(&plan_id, &subscription_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    user_id = %user_id,
                    plan_id = %plan_id,
                    subscription_id = %subscription_id,
                    error = %e,
                    "Gateway cancellation failed"
                );
                e.into_billing("Failed to cancel subscription in DLocal")
                    .with_details(json!({
                        "attemptedPlanId": plan_id,
                        "planToken": ids.plan_token,
                        "subscriptionId": subscription_id,
                    }))
            })?;

        // 4. Mark the row and run side effects
        let change = self
            .repository
            .set_payment_status_by_idx_or_user(&PaymentTarget::Idx(payment.idx), PaymentStatus::Cancelled)
            .await?;
        let effects = self.lifecycle.apply(&change, ChangeSource::UserCancel).await;

        tracing::info!(
            user_id = %user_id,
            payment_idx = payment.idx,
            plan_id = %plan_id,
            subscription_id = %subscription_id,
            "Subscription cancelled"
        );

        Ok(CancelSubscriptionResult {
            payment: change.payment,
            plan_id,
            subscription_id,
            gateway_response,
            effects,
        })
    }

    async fn resolve_ids(
        &self,
        user_id: &UserId,
        payment: &Payment,
        cmd: &CancelSubscriptionCommand,
    ) -> Result<ResolvedIds, BillingError> {
        let mut ids = ResolvedIds {
            plan_id: non_blank(&cmd.dlocal_plan_id)
                .or_else(|| payment.gateway_plan_id().map(String::from)),
            plan_token: non_blank(&cmd.plan_token)
                .or_else(|| payment.gateway_plan_token().map(String::from)),
            subscription_id: non_blank(&cmd.subscription_id)
                .or_else(|| payment.external_id().map(String::from)),
        };

        if ids.plan_id.is_none() || ids.subscription_id.is_none() {
            let recent = self
                .repository
                .find_plan_and_subscription_for_user(user_id)
                .await?;
            ids.plan_id = ids.plan_id.or(recent.plan_id);
            ids.subscription_id = ids.subscription_id.or(recent.subscription_id);
        }

        if ids.plan_id.is_none() {
            if let Some(token) = ids.plan_token.as_deref() {
                ids.plan_id = self.plan_id_for_token(token).await;
            }
        }

        if ids.plan_id.is_none() {
            if let Some(subscription_id) = ids.subscription_id.as_deref() {
                ids.plan_id = self.plan_id_for_subscription(subscription_id).await;
            }
        }

        Ok(ids)
    }

    async fn plan_id_for_token(&self, token: &str) -> Option<String> {
        match self.gateway.get_all_plans(1, PLAN_LOOKUP_PAGE_SIZE).await {
            Ok(page) => page
                .data
                .into_iter()
                .find(|plan| plan.plan_token.as_deref() == Some(token))
                .map(|plan| plan.id),
            Err(e) => {
                tracing::warn!(plan_token = %token, error = %e, "Plan lookup by token failed");
                None
            }
        }
    }

    async fn plan_id_for_subscription(&self, subscription_id: &str) -> Option<String> {
        match self.gateway.get_subscription(subscription_id).await {
            Ok(subscription) => subscription.plan_id,
            Err(e) => {
                tracing::warn!(subscription_id, error = %e, "Subscription lookup failed");
                None
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dlocal::MockPaymentGateway;
    use crate::adapters::memory::InMemoryBillingRepository;
    use crate::application::handlers::billing::test_fixtures::{seeded_repository, PLAN, USER};
    use crate::domain::billing::{test_support, SideEffect};
    use crate::domain::foundation::PlanId;
    use crate::ports::{GatewayError, GatewayPlan, GatewaySubscription};

    fn handler(
        repo: &InMemoryBillingRepository,
        gateway: &MockPaymentGateway,
    ) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(Arc::new(repo.clone()), Arc::new(gateway.clone()))
    }

    fn command() -> CancelSubscriptionCommand {
        CancelSubscriptionCommand {
            user_id: Some(USER.to_string()),
            ..Default::default()
        }
    }

    /// Completed row with the given gateway ids; user holds the plan.
    async fn subscribed(
        repo: &InMemoryBillingRepository,
        plan_id: Option<&str>,
        subscription_id: Option<&str>,
        token: Option<&str>,
    ) -> i64 {
        let mut row = test_support::payment(0, USER, PaymentStatus::Completed);
        row.dlocal_plan_id = plan_id.map(String::from);
        if let Some(sub) = subscription_id {
            row.dlo_payment_id = sub.to_string();
        }
        row.plan_token = token.map(String::from);
        repo.update_user_plan(&UserId::new(USER).unwrap(), Some(&PlanId::new(PLAN).unwrap()))
            .await
            .unwrap();
        repo.insert_raw_payment(row).await
    }

    #[tokio::test]
    async fn cancels_with_ids_from_the_row() {
        let repo = seeded_repository().await;
        let idx = subscribed(&repo, Some("4321"), Some("881"), None).await;
        let gateway = MockPaymentGateway::new();

        let result = handler(&repo, &gateway).handle(command()).await.unwrap();

        assert_eq!(gateway.calls_to("cancel_subscription"), vec![vec!["4321".to_string(), "881".to_string()]]);
        assert_eq!(result.payment.idx, idx);
        assert_eq!(result.payment.status, PaymentStatus::Cancelled);
        assert_eq!(result.effects, vec![EffectOutcome::Applied(SideEffect::ClearUserPlan)]);
        assert_eq!(repo.user(&UserId::new(USER).unwrap()).await.unwrap().plan_id, None);
    }

    #[tokio::test]
    async fn overrides_take_precedence_over_row() {
        let repo = seeded_repository().await;
        subscribed(&repo, Some("4321"), Some("881"), None).await;
        let gateway = MockPaymentGateway::new();

        let cmd = CancelSubscriptionCommand {
            subscription_id: Some("999".to_string()),
            dlocal_plan_id: Some("7777".to_string()),
            ..command()
        };
        handler(&repo, &gateway).handle(cmd).await.unwrap();

        assert_eq!(gateway.calls_to("cancel_subscription"), vec![vec!["7777".to_string(), "999".to_string()]]);
    }

    #[tokio::test]
    async fn placeholder_external_id_is_not_a_subscription_id() {
        let repo = seeded_repository().await;
        subscribed(&repo, Some("4321"), None, None).await;
        let gateway = MockPaymentGateway::new();

        let err = handler(&repo, &gateway).handle(command()).await.unwrap_err();

        match err {
            BillingError::MissingIdentifier { message, .. } => {
                assert!(message.starts_with("Missing subscription id/token"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!gateway.was_called("cancel_subscription"));
    }

    #[tokio::test]
    async fn recent_rows_fill_missing_ids() {
        let repo = seeded_repository().await;
        // Older Active row with the plan id, newer Completed row with only the subscription.
        let mut legacy = test_support::payment(0, USER, PaymentStatus::Active);
        legacy.dlocal_plan_id = Some("4321".to_string());
        repo.insert_raw_payment(legacy).await;
        subscribed(&repo, None, Some("881"), None).await;
        let gateway = MockPaymentGateway::new();

        handler(&repo, &gateway).handle(command()).await.unwrap();

        assert_eq!(gateway.calls_to("cancel_subscription"), vec![vec!["4321".to_string(), "881".to_string()]]);
    }

    #[tokio::test]
    async fn plan_id_is_recovered_from_token_listing() {
        let repo = seeded_repository().await;
        subscribed(&repo, None, Some("881"), Some("tok-abc")).await;
        let gateway = MockPaymentGateway::new();
        gateway.add_plan(GatewayPlan {
            id: "5555".to_string(),
            plan_token: Some("tok-abc".to_string()),
            ..GatewayPlan::default()
        });

        handler(&repo, &gateway).handle(command()).await.unwrap();

        assert_eq!(gateway.calls_to("get_all_plans"), vec![vec!["1".to_string(), "50".to_string()]]);
        assert_eq!(gateway.calls_to("cancel_subscription")[0][0], "5555");
        assert!(!gateway.was_called("get_subscription"));
    }

    #[tokio::test]
    async fn plan_id_is_recovered_from_subscription_record() {
        let repo = seeded_repository().await;
        subscribed(&repo, None, Some("881"), None).await;
        let gateway = MockPaymentGateway::new();
        gateway.add_subscription(GatewaySubscription {
            id: "881".to_string(),
            status: Some("ACTIVE".to_string()),
            plan_id: Some("6666".to_string()),
            plan_token: None,
        });

        handler(&repo, &gateway).handle(command()).await.unwrap();

        assert_eq!(gateway.calls_to("cancel_subscription")[0][0], "6666");
    }

    #[tokio::test]
    async fn unresolved_plan_id_is_reported_with_diagnostics() {
        let repo = seeded_repository().await;
        subscribed(&repo, None, Some("881"), Some("tok-missing")).await;
        let gateway = MockPaymentGateway::new();

        let err = handler(&repo, &gateway).handle(command()).await.unwrap_err();

        match err {
            BillingError::MissingIdentifier { message, details } => {
                assert_eq!(message, "Missing DLocal plan id");
                assert_eq!(details["planToken"], "tok-missing");
                assert_eq!(details["subscriptionId"], "881");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn gateway_rejection_embeds_upstream_error_and_attempted_ids() {
        let repo = seeded_repository().await;
        let idx = subscribed(&repo, Some("4321"), Some("881"), None).await;
        let gateway = MockPaymentGateway::new();
        gateway.set_method_error("cancel_subscription", GatewayError::api(400, "Plan is inactive"));

        let err = handler(&repo, &gateway).handle(command()).await.unwrap_err();

        match err {
            BillingError::Gateway { error, message, details, .. } => {
                assert_eq!(error, "API Error");
                assert_eq!(message, "Plan is inactive");
                assert_eq!(details.unwrap()["attemptedPlanId"], "4321");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(repo.payment(idx).await.unwrap().status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn no_active_row_is_not_found() {
        let repo = seeded_repository().await;
        repo.insert_raw_payment(test_support::payment(0, USER, PaymentStatus::Pending))
            .await;
        let gateway = MockPaymentGateway::new();

        let err = handler(&repo, &gateway).handle(command()).await.unwrap_err();

        assert_eq!(err, BillingError::not_found("Active subscription not found"));
    }

    #[tokio::test]
    async fn user_id_is_required() {
        let repo = seeded_repository().await;
        let gateway = MockPaymentGateway::new();

        let err = handler(&repo, &gateway)
            .handle(CancelSubscriptionCommand::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::ValidationFailed { .. }));
    }
}
