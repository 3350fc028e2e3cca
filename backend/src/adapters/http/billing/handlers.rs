//! HTTP handlers for the billing endpoints.
//!
//! These handlers connect Axum routes to the billing command handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use secrecy::SecretString;
use serde_json::{json, Value};

use crate::adapters::dlocal::{signature, SignatureCheck};
use crate::application::handlers::billing::{
    CallbackUrls, CancelSubscriptionHandler, CreateSubscriptionHandler, GatewayPlansHandler,
    PaymentsHandler, ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler,
    RedirectCallbackCommand, RedirectCallbackHandler, RedirectKind, WebhookSettings,
};
use crate::config::{AppConfig, SupportConfig};
use crate::domain::billing::BillingError;
use crate::ports::{BillingRepository, PaymentGateway};

use super::dto::{
    ApiEnvelope, CancelSubscriptionRequest, CancelSubscriptionResponse, CreatePlanResponse,
    CreateSubscriptionRequest, CreateSubscriptionResponse, GatewayPlanRequest, HealthResponse,
    MethodsQuery, PlanInfo, PlansQuery, RedirectErrorResponse, RedirectQuery,
    SimplePaymentRequest, SimplePaymentResponse, UserInfo, WebhookQuery, WebhookResponse,
    WhatsAppQuery,
};
use super::pages::{self, SuccessPage};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Credentials for checking notification signatures.
#[derive(Clone)]
pub struct WebhookSignatureCheck {
    pub secret: SecretString,
    pub x_login: String,
}

/// Shared application state.
///
/// Adapters are built once at startup and shared behind `Arc`; handlers are
/// created per request from them.
#[derive(Clone)]
pub struct BillingAppState {
    pub repository: Arc<dyn BillingRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub callbacks: CallbackUrls,
    pub webhook_settings: WebhookSettings,
    pub support: Arc<SupportConfig>,
    pub sandbox: bool,
    pub signature_check: Option<Arc<WebhookSignatureCheck>>,
}

impl BillingAppState {
    pub fn new(
        repository: Arc<dyn BillingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        callbacks: CallbackUrls,
    ) -> Self {
        Self {
            repository,
            gateway,
            callbacks,
            webhook_settings: WebhookSettings::default(),
            support: Arc::new(SupportConfig::default()),
            sandbox: true,
            signature_check: None,
        }
    }

    /// State wired from the loaded configuration.
    pub fn from_config(
        repository: Arc<dyn BillingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let callbacks = CallbackUrls::new(
            config.gateway.public_base(),
            config.gateway.back_url.clone(),
        );
        let mut state = Self::new(repository, gateway, callbacks)
            .with_webhook_settings(WebhookSettings {
                pending_fallback: config.features.pending_payment_fallback,
                unknown_events: config.features.unknown_webhook_events,
            })
            .with_support(config.support.clone())
            .with_sandbox(config.gateway.sandbox);
        if let Some(secret) = &config.gateway.webhook_secret {
            state = state.with_signature_check(secret.clone(), config.gateway.x_login.clone());
        }
        state
    }

    pub fn with_webhook_settings(mut self, settings: WebhookSettings) -> Self {
        self.webhook_settings = settings;
        self
    }

    pub fn with_support(mut self, support: SupportConfig) -> Self {
        self.support = Arc::new(support);
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_signature_check(mut self, secret: SecretString, x_login: String) -> Self {
        self.signature_check = Some(Arc::new(WebhookSignatureCheck { secret, x_login }));
        self
    }

    pub fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.repository.clone(),
            self.gateway.clone(),
            self.callbacks.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.repository.clone(), self.gateway.clone())
    }

    pub fn reconcile_webhook_handler(&self) -> ReconcileWebhookHandler {
        ReconcileWebhookHandler::new(self.repository.clone(), self.webhook_settings)
    }

    pub fn redirect_callback_handler(&self) -> RedirectCallbackHandler {
        RedirectCallbackHandler::new(self.repository.clone())
    }

    pub fn gateway_plans_handler(&self) -> GatewayPlansHandler {
        GatewayPlansHandler::new(self.gateway.clone(), self.callbacks.clone())
    }

    pub fn payments_handler(&self) -> PaymentsHandler {
        PaymentsHandler::new(self.gateway.clone(), self.callbacks.clone(), self.sandbox)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Health and fallback
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        success: true,
        message: "DLocal Payment & Subscription Gateway API is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    let body = ApiEnvelope::failure("Not found")
        .with_message(format!("Route {} {} not found", method, uri.path()));
    (StatusCode::NOT_FOUND, Json(body))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions/create - Subscribe a user to a catalogue plan
pub async fn create_subscription(
    State(state): State<BillingAppState>,
    payload: Result<Json<CreateSubscriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = payload?;
    let result = state
        .create_subscription_handler()
        .handle(request.into())
        .await?;

    let response = CreateSubscriptionResponse {
        success: true,
        subscribe_link: result.subscribe_link,
        plan_info: PlanInfo::from(&result.gateway_plan),
        user_info: UserInfo::from(&result.user),
        message: format!(
            "Subscription created for {}. Payment record created with status: {}",
            result.user.name, result.payment.status
        ),
        payment: result.payment,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/subscriptions/cancel - Cancel the user's active subscription
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    payload: Result<Json<CancelSubscriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = payload?;
    let result = state
        .cancel_subscription_handler()
        .handle(request.into())
        .await?;
    let user = state.repository.get_user(&result.payment.user_id).await.ok();

    Ok(Json(CancelSubscriptionResponse {
        success: true,
        message: "Subscription cancelled".to_string(),
        dlocal: result.gateway_response,
        payment: result.payment,
        user,
    }))
}

/// GET /api/subscriptions/plans - One page of gateway plans
pub async fn list_plans(
    State(state): State<BillingAppState>,
    query: Result<Query<PlansQuery>, QueryRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Query(query) = query?;
    let page = state
        .gateway_plans_handler()
        .list(query.page, query.page_size)
        .await?;
    Ok(Json(ApiEnvelope::ok(page)))
}

/// POST /api/subscriptions/plans - Create a standalone gateway plan
pub async fn create_plan(
    State(state): State<BillingAppState>,
    payload: Result<Json<GatewayPlanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = payload?;
    let plan = state.gateway_plans_handler().create(request.into()).await?;

    let response = CreatePlanResponse {
        success: true,
        subscribe_link: plan.subscribe_url.clone(),
        plan_info: PlanInfo::from(&plan),
        message: "Plan creado con selector de país automático. DLocal convertirá la moneda según el país elegido.".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/subscriptions/plans/:id
pub async fn get_plan(
    State(state): State<BillingAppState>,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let plan = state.gateway_plans_handler().get(&plan_id).await?;
    Ok(Json(ApiEnvelope::ok(plan)))
}

/// PUT /api/subscriptions/plans/:id
pub async fn update_plan(
    State(state): State<BillingAppState>,
    Path(plan_id): Path<String>,
    payload: Result<Json<GatewayPlanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = payload?;
    let plan = state
        .gateway_plans_handler()
        .update(&plan_id, request.into())
        .await?;
    Ok(Json(ApiEnvelope::ok(plan)))
}

/// DELETE /api/subscriptions/plans/:id
pub async fn delete_plan(
    State(state): State<BillingAppState>,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let response = state.gateway_plans_handler().delete(&plan_id).await?;
    Ok(Json(ApiEnvelope::ok(response).with_message("Plan deleted")))
}

// ════════════════════════════════════════════════════════════════════════════════
// One-off payments
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/simple - Create a one-off payment
pub async fn create_simple_payment(
    State(state): State<BillingAppState>,
    payload: Result<Json<SimplePaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = payload?;
    let result = state.payments_handler().create_simple(request.into()).await?;
    let payment = result.payment;

    let response = SimplePaymentResponse {
        success: true,
        payment_link: payment.redirect_url,
        payment_id: payment.id,
        order_id: payment.order_id.unwrap_or(result.order_id),
        amount: payment.amount,
        currency: payment.currency,
        country: payment.country,
        status: payment.status,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/payments/methods?country=
pub async fn payment_methods(
    State(state): State<BillingAppState>,
    query: Result<Query<MethodsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Query(query) = query?;
    let (country, methods) = state
        .payments_handler()
        .methods(query.country.as_deref())
        .await?;
    Ok(Json(ApiEnvelope::ok(json!({
        "country": country,
        "methods": methods,
    }))))
}

/// GET /api/payments/:payment_id
pub async fn payment_status(
    State(state): State<BillingAppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let info = state.payments_handler().status(&payment_id).await?;
    Ok(Json(ApiEnvelope::ok(info)))
}

/// POST /api/payments/:payment_id/cancel
pub async fn cancel_payment(
    State(state): State<BillingAppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let response = state.payments_handler().cancel(&payment_id).await?;
    Ok(Json(ApiEnvelope::ok(response).with_message("Payment cancelled")))
}

/// POST /api/payments/webhook and /api/subscriptions/webhook
///
/// Notifications for one-off payments and standalone plans are logged and
/// acknowledged; no local row tracks them.
pub async fn acknowledge_notification(uri: Uri, body: Bytes) -> impl IntoResponse {
    tracing::info!(
        path = uri.path(),
        body = %String::from_utf8_lossy(&body),
        "Notification acknowledged"
    );
    Json(json!({ "success": true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks and redirects
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/dlocal - Reconcile a subscription notification
pub async fn dlocal_webhook(
    State(state): State<BillingAppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    if let Some(check) = &state.signature_check {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        match signature::verify(&check.secret, &check.x_login, &body, authorization) {
            SignatureCheck::Valid => tracing::debug!("Webhook signature valid"),
            outcome => tracing::warn!(?outcome, "Webhook signature not verified"),
        }
    }

    let body: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Webhook body is not JSON");
        BillingError::MalformedWebhook("Invalid webhook payload - body is not valid JSON".to_string())
    })?;

    let result = state
        .reconcile_webhook_handler()
        .handle(ReconcileWebhookCommand {
            body,
            correlation_ref: query.correlation_ref,
        })
        .await?;

    let message = match &result.outcome {
        ReconcileOutcome::Updated { .. } => "Webhook processed successfully",
        ReconcileOutcome::NotApplied { .. } => "Webhook received; status change not applied",
        ReconcileOutcome::Ignored { .. } => "Webhook event ignored",
    };
    Ok(Json(WebhookResponse {
        success: true,
        message: message.to_string(),
        applied: result.is_applied(),
        subscription_id: result.notification.subscription_id.clone(),
        new_status: result.new_status.map(|s| s.as_str().to_string()),
    }))
}

/// GET|POST /api/webhooks/success - Payer returned from a completed checkout
pub async fn redirect_success(
    State(state): State<BillingAppState>,
    Query(query): Query<RedirectQuery>,
) -> impl IntoResponse {
    let result = state
        .redirect_callback_handler()
        .handle(RedirectCallbackCommand {
            kind: RedirectKind::Success,
            correlation_ref: query.correlation_ref.clone(),
            payment_id: query.payment_id.clone(),
            subscription_token: query.subscription_token.clone(),
        })
        .await;

    let whatsapp_link = state.support.whatsapp_link(&state.support.payment_message);
    let page = SuccessPage {
        status: result.status(),
        payment_id: query.payment_id.as_deref(),
        subscription_token: query.subscription_token.as_deref(),
        whatsapp_link: whatsapp_link.as_deref(),
    };
    Html(page.render())
}

/// GET|POST /api/webhooks/error - Payer returned from a failed checkout
pub async fn redirect_error(
    State(state): State<BillingAppState>,
    Query(query): Query<RedirectQuery>,
) -> impl IntoResponse {
    state
        .redirect_callback_handler()
        .handle(RedirectCallbackCommand {
            kind: RedirectKind::Error,
            correlation_ref: query.correlation_ref,
            payment_id: query.payment_id.clone(),
            subscription_token: None,
        })
        .await;

    Json(RedirectErrorResponse {
        success: false,
        message: "Payment failed".to_string(),
        payment_id: query.payment_id,
    })
}

/// GET /api/whatsapp/start - Forward to the support chat
pub async fn whatsapp_start(
    State(state): State<BillingAppState>,
    Query(query): Query<WhatsAppQuery>,
) -> Response {
    let message = query
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.support.start_message.clone());
    match state.support.whatsapp_link(&message) {
        Some(link) => Html(pages::whatsapp_redirect(&link)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiEnvelope::failure("WhatsApp support is not configured")),
        )
            .into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for BillingApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self(BillingError::validation("body", "Request body contains invalid JSON"))
    }
}

impl From<QueryRejection> for BillingApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected query string");
        Self(BillingError::validation("query", "Invalid query parameters"))
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let (status, body) = match self.0 {
            BillingError::ValidationFailed { message, .. } => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": message, "code": code}),
            ),
            BillingError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({"success": false, "error": message, "code": code}),
            ),
            BillingError::AlreadySubscribed { current } => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "error": "User already has an active subscription",
                    "code": code,
                    "currentSubscription": current,
                }),
            ),
            BillingError::Conflict(message) => (
                StatusCode::CONFLICT,
                json!({"success": false, "error": message, "code": code}),
            ),
            BillingError::Gateway {
                context,
                error,
                message,
                details,
            } => {
                let mut body = json!({
                    "success": false,
                    "error": context,
                    "gatewayError": error,
                    "message": message,
                    "code": code,
                });
                if let Some(details) = details {
                    body["details"] = details;
                }
                (StatusCode::BAD_REQUEST, body)
            }
            BillingError::MissingIdentifier { message, details } => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": message, "code": code, "details": details}),
            ),
            BillingError::MalformedWebhook(message) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": message, "code": code}),
            ),
            BillingError::Unmatched { details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "success": false,
                    "error": "Failed to update payment status",
                    "code": code,
                    "details": details,
                }),
            ),
            BillingError::Persistence(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"success": false, "error": message, "code": code}),
            ),
        };
        (status, Json(body)).into_response()
    }
}
