//! In-memory billing repository.
//!
//! Mirrors the Postgres adapter's semantics (state machine checks, the
//! one-live-subscription-per-user constraint, newest-first lookups) so the
//! application layer can be exercised without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{
    GatewayRefs, NewPayment, Payment, PaymentStatus, PaymentTarget, Plan, StatusChange, User,
};
use crate::domain::foundation::{
    CorrelationId, DomainError, ErrorCode, PlanId, StateMachine, Timestamp, UserId,
};
use crate::ports::{BillingRepository, RECENT_PAYMENTS_SCAN};

#[derive(Debug, Default)]
struct Store {
    users: HashMap<UserId, User>,
    plans: HashMap<PlanId, Plan>,
    payments: Vec<Payment>,
    next_idx: i64,
    failures: HashMap<&'static str, DomainError>,
}

impl Store {
    /// Rows matching `pred`, newest first.
    fn newest_first(&self, pred: impl Fn(&Payment) -> bool) -> Vec<&Payment> {
        let mut rows: Vec<&Payment> = self.payments.iter().filter(|p| pred(p)).collect();
        rows.sort_by(|a, b| (b.created_at, b.idx).cmp(&(a.created_at, a.idx)));
        rows
    }

    fn newest_idx(&self, pred: impl Fn(&Payment) -> bool) -> Option<i64> {
        self.newest_first(pred).first().map(|p| p.idx)
    }

    fn has_other_live_row(&self, user_id: &UserId, except_idx: i64) -> bool {
        self.payments
            .iter()
            .any(|p| p.idx != except_idx && &p.user_id == user_id && p.is_active_subscription())
    }

    /// Applies a guarded status change to the row with `idx`.
    fn transition(
        &mut self,
        idx: Option<i64>,
        stamp_external_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let idx = idx.ok_or_else(|| {
            DomainError::new(ErrorCode::PaymentNotFound, "No payment matches the given identifier")
        })?;
        let position = self
            .payments
            .iter()
            .position(|p| p.idx == idx)
            .ok_or_else(|| DomainError::new(ErrorCode::PaymentNotFound, "Payment not found"))?;

        let current = &self.payments[position];
        let previous = current.status;
        if !previous.accepts(&status) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move payment {} from {} to {}", idx, previous, status),
            ));
        }
        if status.is_active_subscription() && self.has_other_live_row(&current.user_id, idx) {
            return Err(DomainError::new(
                ErrorCode::ActiveSubscriptionExists,
                "User already has an active subscription",
            ));
        }

        let row = &mut self.payments[position];
        row.status = status;
        if let Some(external_id) = stamp_external_id {
            row.dlo_payment_id = external_id.to_string();
        }
        Ok(StatusChange {
            payment: row.clone(),
            previous,
        })
    }

    fn check(&self, operation: &'static str) -> Result<(), DomainError> {
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Billing repository held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryBillingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.store.write().await.users.insert(user.id.clone(), user);
    }

    pub async fn add_plan(&self, plan: Plan) {
        self.store.write().await.plans.insert(plan.id.clone(), plan);
    }

    /// Inserts a row verbatim, bypassing every guard. Returns the assigned `idx`.
    pub async fn insert_raw_payment(&self, mut payment: Payment) -> i64 {
        let mut store = self.store.write().await;
        store.next_idx += 1;
        payment.idx = store.next_idx;
        let idx = payment.idx;
        store.payments.push(payment);
        idx
    }

    /// Snapshot of all rows in insertion order.
    pub async fn payments(&self) -> Vec<Payment> {
        self.store.read().await.payments.clone()
    }

    pub async fn payment(&self, idx: i64) -> Option<Payment> {
        self.store
            .read()
            .await
            .payments
            .iter()
            .find(|p| p.idx == idx)
            .cloned()
    }

    pub async fn user(&self, user_id: &UserId) -> Option<User> {
        self.store.read().await.users.get(user_id).cloned()
    }

    /// Makes every call of the named trait method fail with `error`.
    pub async fn fail_on(&self, operation: &'static str, error: DomainError) {
        self.store.write().await.failures.insert(operation, error);
    }
}

#[async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn get_user(&self, user_id: &UserId) -> Result<User, DomainError> {
        let store = self.store.read().await;
        store.check("get_user")?;
        store
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| DomainError::new(ErrorCode::UserNotFound, "User not found"))
    }

    async fn get_plan(&self, plan_id: &PlanId) -> Result<Plan, DomainError> {
        let store = self.store.read().await;
        store.check("get_plan")?;
        store
            .plans
            .get(plan_id)
            .cloned()
            .ok_or_else(|| DomainError::new(ErrorCode::PlanNotFound, "Plan not found"))
    }

    async fn active_subscription(&self, user_id: &UserId) -> Result<Option<Payment>, DomainError> {
        let store = self.store.read().await;
        store.check("active_subscription")?;
        Ok(store
            .newest_first(|p| &p.user_id == user_id && p.is_active_subscription())
            .first()
            .map(|p| (*p).clone()))
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, DomainError> {
        let mut store = self.store.write().await;
        store.check("create_payment")?;
        if store.has_other_live_row(&payment.user_id, -1) {
            return Err(DomainError::new(
                ErrorCode::ActiveSubscriptionExists,
                "User already has an active subscription",
            ));
        }

        let now = Timestamp::now();
        store.next_idx += 1;
        let row = Payment {
            idx: store.next_idx,
            description: Some(payment.description_or_default()),
            dlo_payment_id: payment.external_id_or_placeholder(&now),
            user_id: payment.user_id,
            plan_id: payment.plan_id,
            amount: payment.amount,
            currency: payment.currency,
            status: PaymentStatus::Pending,
            dlocal_plan_id: payment.dlocal_plan_id,
            plan_token: payment.plan_token,
            correlation_id: payment.correlation_id,
            created_at: now,
        };
        store.payments.push(row.clone());
        Ok(row)
    }

    async fn update_payment_status(
        &self,
        dlo_payment_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let mut store = self.store.write().await;
        store.check("update_payment_status")?;
        let idx = store.newest_idx(|p| p.dlo_payment_id == dlo_payment_id);
        store.transition(idx, None, status)
    }

    async fn update_payment_by_subscription(
        &self,
        subscription_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let mut store = self.store.write().await;
        store.check("update_payment_by_subscription")?;
        let idx = store.newest_idx(|p| p.dlo_payment_id == subscription_id);
        store.transition(idx, None, status)
    }

    async fn update_payment_by_plan_token(
        &self,
        plan_token: &str,
        subscription_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let mut store = self.store.write().await;
        store.check("update_payment_by_plan_token")?;
        let idx = store.newest_idx(|p| {
            p.plan_token.as_deref() == Some(plan_token) || p.dlo_payment_id == plan_token
        });
        store.transition(idx, subscription_id, status)
    }

    async fn update_payment_by_correlation(
        &self,
        correlation_id: &CorrelationId,
        subscription_id: Option<&str>,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let mut store = self.store.write().await;
        store.check("update_payment_by_correlation")?;
        let idx = store.newest_idx(|p| p.correlation_id.as_ref() == Some(correlation_id));
        store.transition(idx, subscription_id, status)
    }

    async fn update_pending_payment_with_subscription(
        &self,
        subscription_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let mut store = self.store.write().await;
        store.check("update_pending_payment_with_subscription")?;
        let idx = store.newest_idx(|p| p.status == PaymentStatus::Pending);
        store.transition(idx, Some(subscription_id), status)
    }

    async fn get_active_payment_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Payment>, DomainError> {
        let store = self.store.read().await;
        store.check("get_active_payment_by_user")?;
        for status in PaymentStatus::ACTIVE_SET {
            if let Some(row) = store
                .newest_first(|p| &p.user_id == user_id && p.status == status)
                .first()
            {
                return Ok(Some((*row).clone()));
            }
        }
        Ok(None)
    }

    async fn find_plan_and_subscription_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<GatewayRefs, DomainError> {
        let store = self.store.read().await;
        store.check("find_plan_and_subscription_for_user")?;
        let rows = store.newest_first(|p| &p.user_id == user_id && p.is_active_subscription());
        Ok(GatewayRefs::collect(
            rows.into_iter().take(RECENT_PAYMENTS_SCAN as usize),
        ))
    }

    async fn set_payment_status_by_idx_or_user(
        &self,
        target: &PaymentTarget,
        status: PaymentStatus,
    ) -> Result<StatusChange, DomainError> {
        let mut store = self.store.write().await;
        store.check("set_payment_status_by_idx_or_user")?;
        let idx = match target {
            PaymentTarget::Idx(idx) => store.newest_idx(|p| p.idx == *idx),
            PaymentTarget::User(user_id) => store
                .newest_idx(|p| &p.user_id == user_id && p.is_active_subscription())
                .or_else(|| store.newest_idx(|p| &p.user_id == user_id)),
        };
        store.transition(idx, None, status)
    }

    async fn update_user_plan(
        &self,
        user_id: &UserId,
        plan_id: Option<&PlanId>,
    ) -> Result<User, DomainError> {
        let mut store = self.store.write().await;
        store.check("update_user_plan")?;
        let user = store
            .users
            .get_mut(user_id)
            .ok_or_else(|| DomainError::new(ErrorCode::UserNotFound, "User not found"))?;
        user.plan_id = plan_id.cloned();
        user.updated_at = Some(Timestamp::now());
        Ok(user.clone())
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.store.read().await.check("ping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{test_support::payment, FrequencyType};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn user_id(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn new_payment(user: &str) -> NewPayment {
        NewPayment {
            user_id: user_id(user),
            plan_id: PlanId::new("plan-pro").unwrap(),
            amount: 19.9,
            currency: "USD".to_string(),
            description: None,
            dlo_payment_id: None,
            dlocal_plan_id: Some("4321".to_string()),
            plan_token: Some(format!("tok-{}", user)),
            correlation_id: None,
        }
    }

    async fn repo_with_user(id: &str) -> InMemoryBillingRepository {
        let repo = InMemoryBillingRepository::new();
        repo.add_user(User {
            id: user_id(id),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            plan_id: None,
            updated_at: None,
        })
        .await;
        repo.add_plan(Plan {
            id: PlanId::new("plan-pro").unwrap(),
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

    // ════════════════════════════════════════════════════════════════════════════
    // Creation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_payment_inserts_pending_row_with_placeholder() {
        let repo = repo_with_user("user-1").await;
        let row = repo.create_payment(new_payment("user-1")).await.unwrap();

        assert_eq!(row.status, PaymentStatus::Pending);
        assert!(row.dlo_payment_id.starts_with("temp_"));
        assert_eq!(
            row.description.as_deref(),
            Some("Subscription payment for plan plan-pro for user user-1")
        );
    }

    #[tokio::test]
    async fn create_payment_refuses_second_live_subscription() {
        let repo = repo_with_user("user-1").await;
        repo.insert_raw_payment(payment(0, "user-1", PaymentStatus::Active))
            .await;

        let err = repo.create_payment(new_payment("user-1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ActiveSubscriptionExists);
        assert!(repo.has_active_subscription(&user_id("user-1")).await.unwrap());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Status updates
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn plan_token_update_stamps_subscription_id() {
        let repo = repo_with_user("user-1").await;
        repo.create_payment(new_payment("user-1")).await.unwrap();

        let change = repo
            .update_payment_by_plan_token("tok-user-1", Some("SUB-9"), PaymentStatus::Completed)
            .await
            .unwrap();

        assert_eq!(change.previous, PaymentStatus::Pending);
        assert_eq!(change.payment.status, PaymentStatus::Completed);
        assert_eq!(change.payment.dlo_payment_id, "SUB-9");
    }

    #[tokio::test]
    async fn update_without_match_is_not_found() {
        let repo = repo_with_user("user-1").await;
        let err = repo
            .update_payment_by_subscription("SUB-unknown", PaymentStatus::Completed)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn forbidden_transition_leaves_row_untouched() {
        let repo = repo_with_user("user-1").await;
        let idx = repo
            .insert_raw_payment(Payment {
                dlo_payment_id: "SUB-1".to_string(),
                ..payment(0, "user-1", PaymentStatus::Cancelled)
            })
            .await;

        let err = repo
            .update_payment_status("SUB-1", PaymentStatus::Completed)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(repo.payment(idx).await.unwrap().status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn completing_a_second_row_violates_live_constraint() {
        let repo = repo_with_user("user-1").await;
        repo.insert_raw_payment(payment(0, "user-1", PaymentStatus::Completed))
            .await;
        repo.insert_raw_payment(Payment {
            dlo_payment_id: "SUB-2".to_string(),
            ..payment(0, "user-1", PaymentStatus::Pending)
        })
        .await;

        let err = repo
            .update_payment_status("SUB-2", PaymentStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ActiveSubscriptionExists);
    }

    #[tokio::test]
    async fn pending_fallback_picks_most_recent_pending_row_of_anyone() {
        let repo = repo_with_user("user-1").await;
        let older = repo.create_payment(new_payment("user-1")).await.unwrap();
        let newer = repo.create_payment(new_payment("user-2")).await.unwrap();

        let change = repo
            .update_pending_payment_with_subscription("SUB-7", PaymentStatus::Completed)
            .await
            .unwrap();

        assert_eq!(change.payment.idx, newer.idx);
        assert_eq!(
            repo.payment(older.idx).await.unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn active_payment_prefers_completed_over_legacy_active() {
        let repo = repo_with_user("user-1").await;
        let completed = repo
            .insert_raw_payment(payment(0, "user-1", PaymentStatus::Completed))
            .await;
        repo.insert_raw_payment(payment(0, "user-1", PaymentStatus::Active))
            .await;

        let found = repo
            .get_active_payment_by_user(&user_id("user-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.idx, completed);
    }

    #[tokio::test]
    async fn set_status_by_user_targets_live_row() {
        let repo = repo_with_user("user-1").await;
        let live = repo
            .insert_raw_payment(payment(0, "user-1", PaymentStatus::Completed))
            .await;
        repo.insert_raw_payment(payment(0, "user-1", PaymentStatus::Failed))
            .await;

        let change = repo
            .set_payment_status_by_idx_or_user(
                &PaymentTarget::User(user_id("user-1")),
                PaymentStatus::Cancelled,
            )
            .await
            .unwrap();
        assert_eq!(change.payment.idx, live);
    }

    #[tokio::test]
    async fn user_plan_can_be_set_and_cleared() {
        let repo = repo_with_user("user-1").await;
        let plan = PlanId::new("plan-pro").unwrap();

        let user = repo.update_user_plan(&user_id("user-1"), Some(&plan)).await.unwrap();
        assert!(user.is_on_plan(&plan));
        assert!(user.updated_at.is_some());

        let user = repo.update_user_plan(&user_id("user-1"), None).await.unwrap();
        assert_eq!(user.plan_id, None);
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let repo = repo_with_user("user-1").await;
        repo.fail_on("ping", DomainError::database("down")).await;
        assert_eq!(repo.ping().await.unwrap_err().code, ErrorCode::DatabaseError);
    }
}
