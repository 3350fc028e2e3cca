//! Billing handlers - subscription lifecycle, webhook reconciliation, and
//! the one-off payment and plan operations proxied to the gateway.

mod apply_lifecycle;
pub mod callbacks;
mod cancel_subscription;
mod create_subscription;
mod gateway_plans;
mod payments;
mod reconcile_webhook;
mod redirect_callback;

pub use apply_lifecycle::{EffectOutcome, LifecycleApplier};
pub use callbacks::{CallbackUrls, CORRELATION_PARAM};
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use create_subscription::{
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
};
pub use gateway_plans::{GatewayPlanCommand, GatewayPlansHandler, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
pub use payments::{PaymentsHandler, SimplePaymentCommand, SimplePaymentResult};
pub use reconcile_webhook::{
    MatchStrategy, ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler,
    ReconcileWebhookResult, WebhookSettings,
};
pub use redirect_callback::{
    RedirectCallbackCommand, RedirectCallbackHandler, RedirectCallbackResult, RedirectKind,
};

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::CallbackUrls;
    use crate::adapters::memory::InMemoryBillingRepository;
    use crate::domain::billing::{FrequencyType, Plan, User};
    use crate::domain::foundation::{PlanId, UserId};

    pub const USER: &str = "user-1";
    pub const PLAN: &str = "plan-pro";

    /// Repository holding user `Ana` (no plan yet) and the monthly `Pro` plan.
    pub async fn seeded_repository() -> InMemoryBillingRepository {
        let repo = InMemoryBillingRepository::new();
        repo.add_user(User {
            id: UserId::new(USER).unwrap(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            plan_id: None,
            updated_at: None,
        })
        .await;
        repo.add_plan(Plan {
            id: PlanId::new(PLAN).unwrap(),
            plan_name: "Pro".to_string(),
            description: None,
            price: 19.9,
            currency: "USD".to_string(),
            frequency_type: FrequencyType::Monthly,
            frequency_value: 1,
        })
        .await;
        repo
    }

    pub fn callbacks() -> CallbackUrls {
        CallbackUrls::new(
            "https://billing.example.com",
            Some("https://shop.example.com".to_string()),
        )
    }
}
