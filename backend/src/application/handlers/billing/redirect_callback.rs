//! RedirectCallbackHandler - Handles the browser returning from checkout.
//!
//! The gateway sends the payer back to the success or error URL with
//! whatever identifiers it has. Callbacks never fail towards the browser:
//! an unmatched or refused update is logged and the page still renders.

use std::sync::Arc;

use crate::domain::billing::{ChangeSource, PaymentStatus, StatusChange};
use crate::domain::foundation::{CorrelationId, DomainError};
use crate::ports::BillingRepository;

use super::apply_lifecycle::{EffectOutcome, LifecycleApplier};

/// Which redirect the payer landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Success,
    Error,
}

impl RedirectKind {
    fn target_status(&self) -> PaymentStatus {
        match self {
            RedirectKind::Success => PaymentStatus::Completed,
            RedirectKind::Error => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectCallbackCommand {
    pub kind: RedirectKind,
    pub correlation_ref: Option<String>,
    pub payment_id: Option<String>,
    pub subscription_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedirectCallbackResult {
    /// Row after the update, when one was matched and changed.
    pub change: Option<StatusChange>,
    pub effects: Vec<EffectOutcome>,
}

impl RedirectCallbackResult {
    pub fn status(&self) -> Option<PaymentStatus> {
        self.change.as_ref().map(|c| c.payment.status)
    }
}

pub struct RedirectCallbackHandler {
    repository: Arc<dyn BillingRepository>,
    lifecycle: LifecycleApplier,
}

impl RedirectCallbackHandler {
    pub fn new(repository: Arc<dyn BillingRepository>) -> Self {
        Self {
            lifecycle: LifecycleApplier::new(repository.clone()),
            repository,
        }
    }

    /// Tries the correlation token, then the payment id, then the
    /// subscription token, stopping at the first row found.
    pub async fn handle(&self, cmd: RedirectCallbackCommand) -> RedirectCallbackResult {
        let status = cmd.kind.target_status();
        let correlation = cmd
            .correlation_ref
            .as_deref()
            .and_then(|r| r.parse::<CorrelationId>().ok());
        let payment_id = non_blank(cmd.payment_id.as_deref());
        let token = non_blank(cmd.subscription_token.as_deref());

        let mut outcome = None;
        if let Some(correlation) = correlation {
            outcome = self.settle(
                "correlation",
                self.repository
                    .update_payment_by_correlation(&correlation, None, status)
                    .await,
            );
        }
        if outcome.is_none() {
            if let Some(payment_id) = payment_id {
                outcome = self.settle(
                    "payment_id",
                    self.repository.update_payment_status(payment_id, status).await,
                );
            }
        }
        if outcome.is_none() {
            if let Some(token) = token {
                outcome = self.settle(
                    "subscription_token",
                    self.repository
                        .update_payment_by_plan_token(token, None, status)
                        .await,
                );
            }
        }

        match outcome {
            Some(Some(change)) => {
                tracing::info!(
                    kind = ?cmd.kind,
                    payment_idx = change.payment.idx,
                    status = %change.payment.status,
                    "Redirect callback updated payment"
                );
                let effects = self.lifecycle.apply(&change, ChangeSource::Redirect).await;
                RedirectCallbackResult {
                    change: Some(change),
                    effects,
                }
            }
            Some(None) => RedirectCallbackResult::default(),
            None => {
                tracing::warn!(
                    kind = ?cmd.kind,
                    payment_id = ?payment_id,
                    subscription_token = ?token,
                    "Redirect callback matched no payment"
                );
                RedirectCallbackResult::default()
            }
        }
    }

    /// `None` means try the next identifier; `Some(None)` means a row was
    /// found (or storage failed) and the search stops without a change.
    fn settle(
        &self,
        source: &'static str,
        result: Result<StatusChange, DomainError>,
    ) -> Option<Option<StatusChange>> {
        match result {
            Ok(change) => Some(Some(change)),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                tracing::warn!(source, error = %err, "Redirect callback update not applied");
                Some(None)
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingRepository;
    use crate::application::handlers::billing::test_fixtures::{seeded_repository, PLAN, USER};
    use crate::domain::billing::{test_support, SideEffect};
    use crate::domain::foundation::{PlanId, UserId};

    fn handler(repo: &InMemoryBillingRepository) -> RedirectCallbackHandler {
        RedirectCallbackHandler::new(Arc::new(repo.clone()))
    }

    fn command(kind: RedirectKind) -> RedirectCallbackCommand {
        RedirectCallbackCommand {
            kind,
            correlation_ref: None,
            payment_id: None,
            subscription_token: None,
        }
    }

    async fn row_with_external_id(repo: &InMemoryBillingRepository, id: &str) -> i64 {
        let mut row = test_support::payment(0, USER, PaymentStatus::Pending);
        row.dlo_payment_id = id.to_string();
        repo.insert_raw_payment(row).await
    }

    #[tokio::test]
    async fn success_by_payment_id_completes_and_assigns_plan() {
        let repo = seeded_repository().await;
        let idx = row_with_external_id(&repo, "PAY-1").await;

        let result = handler(&repo)
            .handle(RedirectCallbackCommand {
                payment_id: Some("PAY-1".to_string()),
                ..command(RedirectKind::Success)
            })
            .await;

        assert_eq!(result.status(), Some(PaymentStatus::Completed));
        assert_eq!(result.effects, vec![EffectOutcome::Applied(SideEffect::AssignUserPlan)]);
        assert_eq!(repo.payment(idx).await.unwrap().status, PaymentStatus::Completed);
        assert_eq!(
            repo.user(&UserId::new(USER).unwrap()).await.unwrap().plan_id,
            Some(PlanId::new(PLAN).unwrap())
        );
    }

    #[tokio::test]
    async fn correlation_ref_wins_over_payment_id() {
        let repo = seeded_repository().await;
        let correlation = CorrelationId::new();
        let mut row = test_support::payment(0, USER, PaymentStatus::Pending);
        row.correlation_id = Some(correlation);
        let correlated = repo.insert_raw_payment(row).await;
        let other = row_with_external_id(&repo, "PAY-1").await;

        handler(&repo)
            .handle(RedirectCallbackCommand {
                correlation_ref: Some(correlation.to_string()),
                payment_id: Some("PAY-1".to_string()),
                ..command(RedirectKind::Success)
            })
            .await;

        assert_eq!(repo.payment(correlated).await.unwrap().status, PaymentStatus::Completed);
        assert_eq!(repo.payment(other).await.unwrap().status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn subscription_token_is_last_resort() {
        let repo = seeded_repository().await;
        let mut row = test_support::payment(0, USER, PaymentStatus::Pending);
        row.plan_token = Some("tok-a".to_string());
        let idx = repo.insert_raw_payment(row).await;

        let result = handler(&repo)
            .handle(RedirectCallbackCommand {
                payment_id: Some("PAY-unknown".to_string()),
                subscription_token: Some("tok-a".to_string()),
                ..command(RedirectKind::Success)
            })
            .await;

        assert_eq!(result.change.unwrap().payment.idx, idx);
    }

    #[tokio::test]
    async fn error_redirect_marks_payment_failed() {
        let repo = seeded_repository().await;
        let idx = row_with_external_id(&repo, "PAY-1").await;

        let result = handler(&repo)
            .handle(RedirectCallbackCommand {
                payment_id: Some("PAY-1".to_string()),
                ..command(RedirectKind::Error)
            })
            .await;

        assert!(result.effects.is_empty());
        assert_eq!(repo.payment(idx).await.unwrap().status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn unmatched_redirect_changes_nothing() {
        let repo = seeded_repository().await;

        let result = handler(&repo)
            .handle(RedirectCallbackCommand {
                payment_id: Some("PAY-404".to_string()),
                ..command(RedirectKind::Success)
            })
            .await;

        assert_eq!(result, RedirectCallbackResult::default());
    }

    #[tokio::test]
    async fn refused_transition_stops_the_search() {
        let repo = seeded_repository().await;
        let mut cancelled = test_support::payment(0, USER, PaymentStatus::Cancelled);
        cancelled.dlo_payment_id = "PAY-1".to_string();
        repo.insert_raw_payment(cancelled).await;
        let mut pending = test_support::payment(0, USER, PaymentStatus::Pending);
        pending.plan_token = Some("tok-a".to_string());
        let pending_idx = repo.insert_raw_payment(pending).await;

        let result = handler(&repo)
            .handle(RedirectCallbackCommand {
                payment_id: Some("PAY-1".to_string()),
                subscription_token: Some("tok-a".to_string()),
                ..command(RedirectKind::Success)
            })
            .await;

        assert_eq!(result.change, None);
        assert_eq!(repo.payment(pending_idx).await.unwrap().status, PaymentStatus::Pending);
    }
}
