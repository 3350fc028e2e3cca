//! dLocal Go payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for dLocal Go, including:
//! - One-off payments and payment methods
//! - Recurring plans and subscription deactivation
//! - Notification signature checks
//!
//! # Configuration
//!
//! Credentials come from the `gateway` config section:
//! - `SUBSCRIPTION_GATEWAY__GATEWAY__X_LOGIN`
//! - `SUBSCRIPTION_GATEWAY__GATEWAY__X_TRANS_KEY`

mod api_types;
mod dlocal_adapter;
mod mock_gateway;
pub mod signature;

pub use dlocal_adapter::{DLocalConfig, DLocalGateway, SANDBOX_API_URL};
pub use mock_gateway::{MethodCall, MockPaymentGateway, MOCK_CHECKOUT_HOST};
pub use signature::SignatureCheck;
