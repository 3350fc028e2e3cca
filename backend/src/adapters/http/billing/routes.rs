//! Axum router configuration for billing endpoints.
//!
//! Paths are absolute because gateway callback URLs and existing clients
//! point at them directly.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    acknowledge_notification, cancel_payment, cancel_subscription, create_plan,
    create_simple_payment, create_subscription, delete_plan, dlocal_webhook, get_plan, health,
    list_plans, not_found, payment_methods, payment_status, redirect_error, redirect_success,
    update_plan, whatsapp_start, BillingAppState,
};

/// One-off payment routes, mounted at `/api/payments`.
///
/// # Routes
/// - `POST /simple`, `POST /` - Create a one-off payment
/// - `GET /methods?country=` - Payment methods for a country
/// - `POST /webhook` - Notification sink
/// - `GET /:payment_id` - Payment status
/// - `POST /:payment_id/cancel` - Cancel a payment
pub fn payment_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", post(create_simple_payment))
        .route("/simple", post(create_simple_payment))
        .route("/methods", get(payment_methods))
        .route("/webhook", post(acknowledge_notification))
        .route("/:payment_id", get(payment_status))
        .route("/:payment_id/cancel", post(cancel_payment))
}

/// Subscription routes, mounted at `/api/subscriptions`.
///
/// # Routes
/// - `POST /create` - Subscribe a user to a catalogue plan
/// - `POST /cancel` - Cancel the user's active subscription
/// - `GET|POST /plans` - List or create gateway plans
/// - `GET|PUT|DELETE /plans/:id` - Single gateway plan
/// - `POST /webhook` - Notification sink for standalone plans
pub fn subscription_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/create", post(create_subscription))
        .route("/cancel", post(cancel_subscription))
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/:id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/webhook", post(acknowledge_notification))
}

/// Gateway callbacks, mounted at `/api/webhooks`.
///
/// These carry no user authentication. Notification signatures are checked
/// when a secret is configured.
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/dlocal", post(dlocal_webhook))
        .route("/success", get(redirect_success).post(redirect_success))
        .route("/error", get(redirect_error).post(redirect_error))
}

/// Create the complete billing router.
///
/// ```ignore
/// let app = billing_router().with_state(BillingAppState::new(repo, gateway, callbacks));
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/whatsapp/start", get(whatsapp_start))
        .nest("/api/payments", payment_routes())
        .nest("/api/subscriptions", subscription_routes())
        .nest("/api/webhooks", webhook_routes())
        .fallback(not_found)
}
