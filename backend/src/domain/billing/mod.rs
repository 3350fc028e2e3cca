//! Billing domain: users, plans, payment rows, and the rules that govern
//! how gateway notifications move a subscription through its lifecycle.

mod errors;
mod lifecycle;
pub mod money;
mod payment;
mod payment_status;
mod plan;
mod user;
mod webhook_event;
mod webhook_payload;

pub use errors::BillingError;
pub use lifecycle::{side_effects, side_effects_for_change, ChangeSource, SideEffect};
pub use payment::{
    is_placeholder_external_id, placeholder_external_id, GatewayRefs, NewPayment, Payment,
    PaymentTarget, StatusChange, PLACEHOLDER_PREFIX,
};
pub use payment_status::PaymentStatus;
pub use plan::{FrequencyType, Plan};
pub use user::User;
pub use webhook_event::{
    classify_event, status_for_event, EventClassification, UnknownEventPolicy, TYPELESS_EVENT,
};
pub use webhook_payload::WebhookNotification;

#[cfg(test)]
pub(crate) use payment::test_support;
