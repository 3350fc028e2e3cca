//! LifecycleApplier - Runs the side effects owed for a payment status change.
//!
//! Shared by webhook reconciliation, redirect callbacks, and explicit
//! cancellation. Side effects are best effort: a failure is logged and
//! reported, never propagated, because the status change has already been
//! committed.

use std::sync::Arc;

use crate::domain::billing::{side_effects_for_change, ChangeSource, SideEffect, StatusChange};
use crate::ports::BillingRepository;

/// What happened to one side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOutcome {
    Applied(SideEffect),
    Skipped { effect: SideEffect, reason: String },
    Failed { effect: SideEffect, error: String },
}

impl EffectOutcome {
    pub fn effect(&self) -> SideEffect {
        match self {
            EffectOutcome::Applied(effect)
            | EffectOutcome::Skipped { effect, .. }
            | EffectOutcome::Failed { effect, .. } => *effect,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, EffectOutcome::Applied(_))
    }
}

pub struct LifecycleApplier {
    repository: Arc<dyn BillingRepository>,
}

impl LifecycleApplier {
    pub fn new(repository: Arc<dyn BillingRepository>) -> Self {
        Self { repository }
    }

    /// Applies every side effect owed by `change` reported through `source`,
    /// in table order.
    pub async fn apply(&self, change: &StatusChange, source: ChangeSource) -> Vec<EffectOutcome> {
        let effects = side_effects_for_change(change.previous, change.payment.status, source);
        let mut outcomes = Vec::with_capacity(effects.len());
        for effect in effects {
            let outcome = self.apply_one(effect, change).await;
            match &outcome {
                EffectOutcome::Applied(_) => tracing::info!(
                    user_id = %change.payment.user_id,
                    plan_id = %change.payment.plan_id,
                    ?effect,
                    "Lifecycle side effect applied"
                ),
                EffectOutcome::Skipped { reason, .. } => tracing::warn!(
                    user_id = %change.payment.user_id,
                    ?effect,
                    reason = %reason,
                    "Lifecycle side effect skipped"
                ),
                EffectOutcome::Failed { error, .. } => tracing::error!(
                    user_id = %change.payment.user_id,
                    ?effect,
                    error = %error,
                    "Lifecycle side effect failed"
                ),
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn apply_one(&self, effect: SideEffect, change: &StatusChange) -> EffectOutcome {
        let payment = &change.payment;
        match effect {
            SideEffect::AssignUserPlan => {
                match self
                    .repository
                    .update_user_plan(&payment.user_id, Some(&payment.plan_id))
                    .await
                {
                    Ok(_) => EffectOutcome::Applied(effect),
                    Err(err) if err.is_not_found() => EffectOutcome::Skipped {
                        effect,
                        reason: err.message,
                    },
                    Err(err) => EffectOutcome::Failed {
                        effect,
                        error: err.to_string(),
                    },
                }
            }
            SideEffect::ClearUserPlan => {
                let user = match self.repository.get_user(&payment.user_id).await {
                    Ok(user) => user,
                    Err(err) if err.is_not_found() => {
                        return EffectOutcome::Skipped {
                            effect,
                            reason: err.message,
                        }
                    }
                    Err(err) => {
                        return EffectOutcome::Failed {
                            effect,
                            error: err.to_string(),
                        }
                    }
                };
                // A newer subscription may have granted a different plan.
                if user.plan_id.is_some() && !user.is_on_plan(&payment.plan_id) {
                    return EffectOutcome::Skipped {
                        effect,
                        reason: format!("user is on another plan than {}", payment.plan_id),
                    };
                }
                match self.repository.update_user_plan(&payment.user_id, None).await {
                    Ok(_) => EffectOutcome::Applied(effect),
                    Err(err) => EffectOutcome::Failed {
                        effect,
                        error: err.to_string(),
                    },
                }
            }
        }
    }
}
