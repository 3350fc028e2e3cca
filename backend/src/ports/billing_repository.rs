//! Billing repository port.
//!
//! Persistence contract for users, plans, and payment rows. Status updates
//! honour the payment state machine: a row that exists but cannot move to
//! the requested status is reported as `InvalidStateTransition` and left
//! untouched. Updates that find no row report a not-found code, which
//! callers treat as "try the next way of locating the row".

use async_trait::async_trait;

use crate::domain::billing::{
    GatewayRefs, NewPayment, Payment, PaymentStatus, PaymentTarget, Plan, StatusChange, User,
};
use crate::domain::foundation::{CorrelationId, DomainError, PlanId, UserId};

/// Number of recent rows scanned when recovering gateway identifiers.
pub const RECENT_PAYMENTS_SCAN: i64 = 10;

#[async_trait]
pub trait BillingRepository: Send + Sync {
    /// Load a user. `UserNotFound` if absent.
    async fn get_user(&self, user_id: &UserId) -> Result<User, DomainError>;

    /// Load a plan. `PlanNotFound` if absent.
    async fn get_plan(&self, plan_id: &PlanId) -> Result<Plan, DomainError>;

    /// Most recent row of the user in an active-subscription status.
    async fn active_subscription(&self, user_id: &UserId) -> Result<Option<Payment>, DomainError>;

    async fn has_active_subscription(&self, user_id: &UserId) -> Result<bool, DomainError> {
        Ok(self.active_subscription(user_id).await?.is_some())
    }

    /// Insert a Pending row.
    ///
    /// Refuses with `ActiveSubscriptionExists` when the user already holds
    /// a live subscription, whether caught by the pre-check or by storage.
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, DomainError>;

    /// Update the row whose external id matches.
    async fn update_payment_status(
        &self,
        dlo_payment_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError>;

    /// Update the row recorded under a gateway subscription id.
    async fn update_payment_by_subscription(
        &self,
        subscription_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError>;

    /// Update the row carrying a plan token, stamping the subscription id when given.
    async fn update_payment_by_plan_token(
        &self,
        plan_token: &str,
        subscription_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError>;

    /// Update the row minted with a correlation token, stamping the subscription id when given.
    async fn update_payment_by_correlation(
        &self,
        correlation_id: &CorrelationId,
        subscription_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError>;

    /// Stamp the most recent Pending row system-wide with a subscription id.
    ///
    /// Any user's row may be picked; callers gate this behind a flag.
    async fn update_pending_payment_with_subscription(
        &self,
        subscription_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError>;

    /// The user's live subscription row, preferring `Completed` over legacy `Active`.
    async fn get_active_payment_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, DomainError>;

    /// Gateway ids found among the user's most recent live rows.
    async fn find_plan_and_subscription_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<GatewayRefs, DomainError>;

    /// Update a row located by technical key, or the user's most recent row.
    async fn set_payment_status_by_idx_or_user(
        &self,
        target: &PaymentTarget,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError>;

    /// Set or clear the user's plan reference.
    async fn update_user_plan(
        &self,
        user_id: &UserId,
        plan_id: Option<&PlanId>,
    ) -> Result<User, DomainError>;

    /// Cheap round trip to the datastore.
    async fn ping(&self) -> Result<(), DomainError>;
}
