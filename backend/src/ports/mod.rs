//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `PaymentGateway` - Hosted payment processor (payments, plans, subscriptions)
//! - `BillingRepository` - Users, plans, and payment rows

mod billing_repository;
mod payment_gateway;

pub use billing_repository::{BillingRepository, RECENT_PAYMENTS_SCAN};
pub use payment_gateway::{
    require_id, CreatePaymentRequest, GatewayError, GatewayPlan, GatewaySubscription,
    PaymentGateway, PaymentMethod, PaymentResult, PaymentStatusInfo, PlanPage, PlanRequest,
};
