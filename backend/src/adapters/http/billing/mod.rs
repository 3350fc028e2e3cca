//! HTTP adapter for billing endpoints.
//!
//! Exposes subscriptions, one-off payments and gateway callbacks:
//! - `POST /api/subscriptions/create` - Subscribe a user to a catalogue plan
//! - `POST /api/subscriptions/cancel` - Cancel the user's active subscription
//! - `/api/subscriptions/plans` - Gateway plan management
//! - `/api/payments` - One-off payments, status, methods
//! - `POST /api/webhooks/dlocal` - Notification reconciliation
//! - `/api/webhooks/success`, `/api/webhooks/error` - Checkout redirects
//! - `GET /api/whatsapp/start` - Support hand-off

pub mod dto;
pub mod handlers;
mod pages;
pub mod routes;

pub use handlers::{BillingApiError, BillingAppState, WebhookSignatureCheck};
pub use routes::billing_router;
