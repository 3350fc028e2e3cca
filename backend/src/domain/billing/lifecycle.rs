//! Side effects that follow a payment status change.
//!
//! Every path that changes a payment status (gateway webhook, redirect
//! callback, explicit cancellation) consults this one table, so the user
//! record stays consistent no matter which path reported the change.
//! Completion always grants the plan. Only a cancellation requested by the
//! user takes it away; a gateway-reported cancellation leaves the user
//! record alone.

use super::PaymentStatus;

/// A follow-up write on the owning user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Point the user at the payment's plan.
    AssignUserPlan,
    /// Remove the user's plan reference.
    ClearUserPlan,
}

impl SideEffect {
    /// Whether the effect runs again when the status was already current.
    ///
    /// Assigning is safe to repeat. Clearing is not: a stale cancellation
    /// could wipe a plan granted by a newer subscription.
    pub fn repeats_on_reapplication(&self) -> bool {
        matches!(self, SideEffect::AssignUserPlan)
    }
}

/// Which path reported a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Gateway notification.
    Webhook,
    /// Browser returning from checkout.
    Redirect,
    /// The user asked to cancel through the API.
    UserCancel,
}

/// Side effects owed for a payment that now holds `status`.
pub fn side_effects(status: PaymentStatus, source: ChangeSource) -> &'static [SideEffect] {
    match (status, source) {
        (PaymentStatus::Completed, _) => &[SideEffect::AssignUserPlan],
        (PaymentStatus::Cancelled, ChangeSource::UserCancel) => &[SideEffect::ClearUserPlan],
        (PaymentStatus::Cancelled, ChangeSource::Webhook | ChangeSource::Redirect) => &[],
        (PaymentStatus::Pending | PaymentStatus::Active | PaymentStatus::Failed, _) => &[],
    }
}

/// Side effects to run for a change from `previous` to `current`.
pub fn side_effects_for_change(
    previous: PaymentStatus,
    current: PaymentStatus,
    source: ChangeSource,
) -> Vec<SideEffect> {
    let repeated = previous == current;
    side_effects(current, source)
        .iter()
        .copied()
        .filter(|effect| !repeated || effect.repeats_on_reapplication())
        .collect()
}
