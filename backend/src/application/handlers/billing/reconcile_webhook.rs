//! ReconcileWebhookHandler - Matches gateway notifications to payment rows.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::domain::billing::{
    classify_event, BillingError, ChangeSource, EventClassification, PaymentStatus,
    StatusChange, UnknownEventPolicy, WebhookNotification,
};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::BillingRepository;

use super::apply_lifecycle::{EffectOutcome, LifecycleApplier};

/// Knobs controlling how loosely notifications are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookSettings {
    /// Stamp the most recent Pending row of any user as a last resort.
    pub pending_fallback: bool,
    pub unknown_events: UnknownEventPolicy,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            pending_fallback: true,
            unknown_events: UnknownEventPolicy::AssumeCompleted,
        }
    }
}

/// Command carrying a raw notification.
#[derive(Debug, Clone)]
pub struct ReconcileWebhookCommand {
    pub body: Value,
    /// Correlation token echoed on the notification URL (`ref`).
    pub correlation_ref: Option<String>,
}

/// How the payment row was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Correlation,
    SubscriptionId,
    PlanToken,
    PendingFallback,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Correlation => "correlation",
            MatchStrategy::SubscriptionId => "subscription_id",
            MatchStrategy::PlanToken => "plan_token",
            MatchStrategy::PendingFallback => "pending_fallback",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What reconciliation did with a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Event type outside the table; nothing written.
    Ignored { event_type: String },
    /// A row was located and moved to the reported status.
    Updated {
        strategy: MatchStrategy,
        change: StatusChange,
        effects: Vec<EffectOutcome>,
    },
    /// A row was located but the state machine refused the change.
    NotApplied {
        strategy: MatchStrategy,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileWebhookResult {
    pub notification: WebhookNotification,
    /// Status reported by the event, unless it was ignored.
    pub new_status: Option<PaymentStatus>,
    pub outcome: ReconcileOutcome,
}

impl ReconcileWebhookResult {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Updated { .. })
    }
}

/// Result of one matching attempt.
enum Attempt {
    Matched(StatusChange),
    Refused(String),
    NoRow,
}

/// Handler for gateway notifications.
///
/// Strategies run in order and the first one that locates a row wins:
/// correlation token, subscription id, plan token (stamping the
/// subscription id), then the pending-row fallback when enabled.
pub struct ReconcileWebhookHandler {
    repository: Arc<dyn BillingRepository>,
    lifecycle: LifecycleApplier,
    settings: WebhookSettings,
}

impl ReconcileWebhookHandler {
    pub fn new(repository: Arc<dyn BillingRepository>, settings: WebhookSettings) -> Self {
        Self {
            lifecycle: LifecycleApplier::new(repository.clone()),
            repository,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcileWebhookCommand,
    ) -> Result<ReconcileWebhookResult, BillingError> {
        // 1. Extract identifiers
        let notification = WebhookNotification::from_body(&cmd.body)
            .with_correlation_ref(cmd.correlation_ref.as_deref());
        if !notification.has_identifier() {
            tracing::warn!(body = %cmd.body, "Webhook without any identifier");
            return Err(BillingError::MalformedWebhook(
                "Invalid webhook payload - no subscription ID or plan token found".to_string(),
            ));
        }

        // 2. Classify the event
        let status = match classify_event(
            notification.event_type.as_deref(),
            self.settings.unknown_events,
        ) {
            EventClassification::Status(status) => status,
            EventClassification::Ignored(event_type) => {
                tracing::warn!(
                    event_type = %event_type,
                    subscription_id = ?notification.subscription_id,
                    "Unknown webhook event ignored"
                );
                return Ok(ReconcileWebhookResult {
                    notification,
                    new_status: None,
                    outcome: ReconcileOutcome::Ignored { event_type },
                });
            }
        };

        // 3. Locate and update the row
        for strategy in self.strategies(&notification) {
            let attempt = self.attempt(strategy, &notification, status).await?;
            match attempt {
                Attempt::NoRow => continue,
                Attempt::Refused(reason) => {
                    tracing::warn!(
                        strategy = %strategy,
                        status = %status,
                        reason = %reason,
                        "Webhook matched a row but the status change was refused"
                    );
                    return Ok(ReconcileWebhookResult {
                        notification,
                        new_status: Some(status),
                        outcome: ReconcileOutcome::NotApplied { strategy, reason },
                    });
                }
                Attempt::Matched(change) => {
                    if strategy == MatchStrategy::PendingFallback {
                        tracing::warn!(
                            payment_idx = change.payment.idx,
                            user_id = %change.payment.user_id,
                            "Webhook matched by pending-row fallback; correlation is a guess"
                        );
                    }
                    tracing::info!(
                        strategy = %strategy,
                        payment_idx = change.payment.idx,
                        previous = %change.previous,
                        status = %change.payment.status,
                        "Webhook reconciled"
                    );

                    // 4. Side effects
                    let effects = self.lifecycle.apply(&change, ChangeSource::Webhook).await;
                    return Ok(ReconcileWebhookResult {
                        notification,
                        new_status: Some(status),
                        outcome: ReconcileOutcome::Updated {
                            strategy,
                            change,
                            effects,
                        },
                    });
                }
            }
        }

        tracing::error!(
            subscription_id = ?notification.subscription_id,
            plan_token = ?notification.plan_token,
            correlation_id = ?notification.correlation_id,
            "No payment matches the webhook"
        );
        Err(BillingError::Unmatched {
            details: json!("No matching payment found"),
        })
    }

    fn strategies(&self, notification: &WebhookNotification) -> Vec<MatchStrategy> {
        let mut strategies = Vec::with_capacity(4);
        if notification.correlation_id.is_some() {
            strategies.push(MatchStrategy::Correlation);
        }
        if notification.subscription_id.is_some() {
            strategies.push(MatchStrategy::SubscriptionId);
        }
        if notification.plan_token.is_some() {
            strategies.push(MatchStrategy::PlanToken);
        }
        if self.settings.pending_fallback && notification.subscription_id.is_some() {
            strategies.push(MatchStrategy::PendingFallback);
        }
        strategies
    }

    async fn attempt(
        &self,
        strategy: MatchStrategy,
        notification: &WebhookNotification,
        status: PaymentStatus,
    ) -> Result<Attempt, BillingError> {
        let subscription_id = notification.subscription_id.as_deref();
        let result = match strategy {
            MatchStrategy::Correlation => match &notification.correlation_id {
                Some(correlation) => {
                    self.repository
                        .update_payment_by_correlation(correlation, subscription_id, status)
                        .await
                }
                None => return Ok(Attempt::NoRow),
            },
            MatchStrategy::SubscriptionId => match subscription_id {
                Some(id) => self.repository.update_payment_by_subscription(id, status).await,
                None => return Ok(Attempt::NoRow),
            },
            MatchStrategy::PlanToken => match notification.plan_token.as_deref() {
                Some(token) => {
                    self.repository
                        .update_payment_by_plan_token(token, subscription_id, status)
                        .await
                }
                None => return Ok(Attempt::NoRow),
            },
            MatchStrategy::PendingFallback => match subscription_id {
                Some(id) => {
                    self.repository
                        .update_pending_payment_with_subscription(id, status)
                        .await
                }
                None => return Ok(Attempt::NoRow),
            },
        };
        classify_attempt(strategy, result)
    }
}

fn classify_attempt(
    strategy: MatchStrategy,
    result: Result<StatusChange, DomainError>,
) -> Result<Attempt, BillingError> {
    match result {
        Ok(change) => Ok(Attempt::Matched(change)),
        Err(err) if err.is_not_found() => Ok(Attempt::NoRow),
        Err(err)
            if matches!(
                err.code,
                ErrorCode::InvalidStateTransition | ErrorCode::ActiveSubscriptionExists
            ) =>
        {
            Ok(Attempt::Refused(err.message))
        }
        Err(err) => {
            tracing::error!(strategy = %strategy, error = %err, "Webhook update failed");
            Err(BillingError::persistence("Failed to update payment status"))
        }
    }
}
