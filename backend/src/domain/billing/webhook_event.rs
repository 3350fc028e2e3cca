//! Classification of gateway notification types.

use serde::Deserialize;

use super::PaymentStatus;

/// Event type assumed for notifications that carry no `type` field.
///
/// The gateway's subscription notifications are sent without a type and
/// only after a successful charge.
pub const TYPELESS_EVENT: &str = "subscription.payment_success";

/// What to do with an event type outside the known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownEventPolicy {
    /// Treat the event as a successful charge.
    #[default]
    AssumeCompleted,
    /// Log and acknowledge without touching any row.
    Ignore,
}

/// Outcome of classifying a notification type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClassification {
    /// The event maps to a payment status.
    Status(PaymentStatus),
    /// The event type is not in the table and the policy says to skip it.
    Ignored(String),
}

/// Maps a known event type to the payment status it reports.
pub fn status_for_event(event_type: &str) -> Option<PaymentStatus> {
    let status = match event_type {
        "PAYMENT_NOTIFICATION"
        | "payment.approved"
        | "payment.completed"
        | "payment.success"
        | "subscription.payment_success"
        | "subscription.activated" => PaymentStatus::Completed,
        "payment.rejected" | "payment.failed" | "subscription.payment_failed" => {
            PaymentStatus::Failed
        }
        "payment.cancelled" | "subscription.cancelled" => PaymentStatus::Cancelled,
        "payment.pending" | "payment.processing" | "subscription.created" => PaymentStatus::Pending,
        _ => return None,
    };
    Some(status)
}

/// Classifies an optional event type under the given policy.
pub fn classify_event(event_type: Option<&str>, policy: UnknownEventPolicy) -> EventClassification {
    let event_type = event_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(TYPELESS_EVENT);

    match (status_for_event(event_type), policy) {
        (Some(status), _) => EventClassification::Status(status),
        (None, UnknownEventPolicy::AssumeCompleted) => {
            EventClassification::Status(PaymentStatus::Completed)
        }
        (None, UnknownEventPolicy::Ignore) => EventClassification::Ignored(event_type.to_string()),
    }
}
