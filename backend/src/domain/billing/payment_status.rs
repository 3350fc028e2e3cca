//! Payment status state machine.
//!
//! Statuses are persisted verbatim (`Pending`, `Completed`, ...) in the
//! `payments.status` column. `Active` only appears on historical rows written
//! before `Completed` became the canonical "subscribed" status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, ValidationError};

/// Status of a payment row, which doubles as the subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Row created, awaiting the first gateway confirmation.
    Pending,

    /// Charge confirmed. The subscription is live.
    Completed,

    /// Legacy spelling of `Completed`.
    Active,

    /// Charge rejected by the gateway.
    Failed,

    /// Subscription cancelled, by the user or by the gateway.
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Active,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
    ];

    /// Statuses that count as a live subscription.
    pub const ACTIVE_SET: [PaymentStatus; 2] = [PaymentStatus::Completed, PaymentStatus::Active];

    /// True for statuses that count as a live subscription.
    pub fn is_active_subscription(&self) -> bool {
        Self::ACTIVE_SET.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Active => "Active",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }

    /// Every status a row may currently hold for an update to `self` to be
    /// accepted, the target itself included.
    pub fn accepted_sources(&self) -> Vec<PaymentStatus> {
        Self::ALL
            .into_iter()
            .filter(|source| source.accepts(self))
            .collect()
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Completed, Cancelled)
                | (Active, Completed)
                | (Active, Cancelled)
                // A declined first attempt can still be settled later
                | (Failed, Completed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Completed, Failed, Cancelled],
            Completed => vec![Cancelled],
            Active => vec![Completed, Cancelled],
            Failed => vec![Completed],
            Cancelled => vec![],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Completed" => Ok(PaymentStatus::Completed),
            "Active" => Ok(PaymentStatus::Active),
            "Failed" => Ok(PaymentStatus::Failed),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(ValidationError::not_allowed(
                "status",
                &["Pending", "Completed", "Active", "Failed", "Cancelled"],
                other,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    #[test]
    fn pending_moves_to_any_outcome() {
        assert_eq!(Pending.transition_to(Completed), Ok(Completed));
        assert_eq!(Pending.transition_to(Failed), Ok(Failed));
        assert_eq!(Pending.transition_to(Cancelled), Ok(Cancelled));
    }

    #[test]
    fn nothing_returns_to_pending() {
        for status in [Completed, Active, Failed, Cancelled] {
            assert!(
                status.transition_to(Pending).is_err(),
                "{:?} must not go back to Pending",
                status
            );
        }
    }

    #[test]
    fn completed_can_only_be_cancelled() {
        assert_eq!(Completed.valid_transitions(), vec![Cancelled]);
        assert!(Completed.transition_to(Failed).is_err());
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(Cancelled.is_terminal());
        assert!(Cancelled.transition_to(Completed).is_err());
    }

    #[test]
    fn reapplying_the_same_status_is_accepted() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.transition_to(status), Ok(status));
        }
    }

    #[test]
    fn failed_charge_can_recover() {
        assert_eq!(Failed.transition_to(Completed), Ok(Completed));
    }

    #[test]
    fn legacy_active_is_an_active_subscription() {
        assert!(Active.is_active_subscription());
        assert!(Completed.is_active_subscription());
        assert!(!Pending.is_active_subscription());
        assert!(!Cancelled.is_active_subscription());
    }

    #[test]
    fn accepted_sources_for_completed() {
        assert_eq!(Completed.accepted_sources(), vec![Pending, Completed, Active, Failed]);
    }

    #[test]
    fn accepted_sources_for_pending_is_only_itself() {
        assert_eq!(Pending.accepted_sources(), vec![Pending]);
    }

    #[test]
    fn parses_persisted_strings() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert!("completed".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn serde_uses_persisted_spelling() {
        assert_eq!(serde_json::to_string(&Cancelled).unwrap(), "\"Cancelled\"");
    }
}
