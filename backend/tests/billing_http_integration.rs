//! Integration tests for the billing HTTP surface.
//!
//! These tests drive whole subscription lifecycles through the router:
//! 1. Subscription creation writes a Pending row and returns a checkout link
//! 2. Notifications and redirects move the row through its states
//! 3. Cancellation reaches the gateway and clears the user's plan, while a
//!    gateway-reported cancellation leaves the plan in place

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use subscription_gateway::adapters::dlocal::signature;
use subscription_gateway::adapters::http::{billing_router, BillingAppState};
use subscription_gateway::adapters::{InMemoryBillingRepository, MockPaymentGateway};
use subscription_gateway::application::billing::{CallbackUrls, WebhookSettings};
use subscription_gateway::domain::billing::{
    FrequencyType, PaymentStatus, Plan, UnknownEventPolicy, User,
};
use subscription_gateway::domain::foundation::{PlanId, UserId};

// =============================================================================
// Test Infrastructure
// =============================================================================

const USER: &str = "user-ana";
const PLAN: &str = "plan-pro";

struct Harness {
    router: Router,
    repo: InMemoryBillingRepository,
    gateway: MockPaymentGateway,
}

async fn harness() -> Harness {
    harness_with(|state| state).await
}

async fn harness_with(configure: impl FnOnce(BillingAppState) -> BillingAppState) -> Harness {
    let repo = InMemoryBillingRepository::new();
    repo.add_user(User {
        id: UserId::new(USER).unwrap(),
        name: "Ana".to_string(),
        email: "ana@example.com".to_string(),
        plan_id: None,
        updated_at: None,
    })
    .await;
    repo.add_plan(Plan {
        id: PlanId::new(PLAN).unwrap(),
        plan_name: "Pro".to_string(),
        description: Some("Monthly Pro".to_string()),
        price: 19.9,
        currency: "USD".to_string(),
        frequency_type: FrequencyType::Monthly,
        frequency_value: 1,
    })
    .await;

    let gateway = MockPaymentGateway::new();
    let callbacks = CallbackUrls::new("https://billing.example.com", None);
    let state = configure(BillingAppState::new(
        Arc::new(repo.clone()),
        Arc::new(gateway.clone()),
        callbacks,
    ));

    Harness {
        router: billing_router().with_state(state),
        repo,
        gateway,
    }
}

impl Harness {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn subscribe(&self) -> Value {
        let (status, body) = self
            .call(post_json(
                "/api/subscriptions/create",
                json!({"user_id": USER, "plan_id": PLAN}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    async fn user_plan(&self) -> Option<String> {
        self.repo
            .user(&UserId::new(USER).unwrap())
            .await
            .and_then(|u| u.plan_id)
            .map(|p| p.to_string())
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn subscribe_notify_and_cancel() {
    let h = harness().await;

    // 1. Create
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();
    let correlation = created["payment"]["correlation_id"].as_str().unwrap().to_string();
    assert!(created["payment"]["dlo_payment_id"]
        .as_str()
        .unwrap()
        .starts_with("temp_"));
    let notification_url = &h.gateway.calls_to("create_plan")[0][1];
    assert!(notification_url.ends_with(&format!("ref={}", correlation)));

    // 2. Typeless notification carrying the correlation token
    let (status, body) = h
        .call(post_json(
            &format!("/api/webhooks/dlocal?ref={}", correlation),
            json!({"subscriptionId": 881}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["applied"], true);
    let payment = h.repo.payment(idx).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.dlo_payment_id, "881");
    assert_eq!(h.user_plan().await.as_deref(), Some(PLAN));

    // 3. Cancel
    let (status, body) = h
        .call(post_json("/api/subscriptions/cancel", json!({"user_id": USER})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["payment"]["status"], "Cancelled");
    assert_eq!(body["dlocal"]["status"], "CANCELLED");
    let deactivated = &h.gateway.calls_to("cancel_subscription")[0];
    assert_eq!(deactivated[1], "881");
    assert_eq!(h.user_plan().await, None);
}

#[tokio::test]
async fn duplicate_notification_is_acknowledged_without_change() {
    let h = harness().await;
    let created = h.subscribe().await;
    let correlation = created["payment"]["correlation_id"].as_str().unwrap().to_string();
    let uri = format!("/api/webhooks/dlocal?ref={}", correlation);
    let notification = json!({"type": "payment.approved", "subscriptionId": "881"});

    h.call(post_json(&uri, notification.clone())).await;
    let (status, body) = h.call(post_json(&uri, notification)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn unknown_event_is_ignored_when_configured() {
    let h = harness_with(|state| {
        state.with_webhook_settings(WebhookSettings {
            unknown_events: UnknownEventPolicy::Ignore,
            ..WebhookSettings::default()
        })
    })
    .await;
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();

    let (status, body) = h
        .call(post_json(
            "/api/webhooks/dlocal",
            json!({"type": "subscription.renewal_reminder", "subscriptionId": "881"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Webhook event ignored");
    assert_eq!(h.repo.payment(idx).await.unwrap().status, PaymentStatus::Pending);
}

#[tokio::test]
async fn unknown_event_completes_payment_by_default() {
    let h = harness().await;
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();
    let token = created["payment"]["plan_token"].as_str().unwrap().to_string();

    let (status, body) = h
        .call(post_json(
            "/api/webhooks/dlocal",
            json!({"type": "subscription.renewed", "plan_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["applied"], true);
    assert_eq!(h.repo.payment(idx).await.unwrap().status, PaymentStatus::Completed);
    assert_eq!(h.user_plan().await.as_deref(), Some(PLAN));
}

#[tokio::test]
async fn gateway_cancellation_keeps_user_plan() {
    let h = harness().await;
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();
    let correlation = created["payment"]["correlation_id"].as_str().unwrap().to_string();
    h.call(post_json(
        &format!("/api/webhooks/dlocal?ref={}", correlation),
        json!({"subscriptionId": "sub_123"}),
    ))
    .await;
    assert_eq!(h.user_plan().await.as_deref(), Some(PLAN));

    let (status, body) = h
        .call(post_json(
            "/api/webhooks/dlocal",
            json!({"type": "subscription.cancelled", "subscriptionId": "sub_123"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(h.repo.payment(idx).await.unwrap().status, PaymentStatus::Cancelled);
    assert_eq!(h.user_plan().await.as_deref(), Some(PLAN));
    assert!(!h.gateway.was_called("cancel_subscription"));
}

#[tokio::test]
async fn success_redirect_completes_payment_by_correlation() {
    let h = harness().await;
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();
    let correlation = created["payment"]["correlation_id"].as_str().unwrap().to_string();

    let response = h
        .router
        .clone()
        .oneshot(get(&format!("/api/webhooks/success?ref={}", correlation)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    assert_eq!(h.repo.payment(idx).await.unwrap().status, PaymentStatus::Completed);
    assert_eq!(h.user_plan().await.as_deref(), Some(PLAN));
}

#[tokio::test]
async fn error_redirect_fails_payment() {
    let h = harness().await;
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();
    let correlation = created["payment"]["correlation_id"].as_str().unwrap().to_string();

    let (status, body) = h
        .call(get(&format!("/api/webhooks/error?ref={}", correlation)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment failed");
    assert_eq!(h.repo.payment(idx).await.unwrap().status, PaymentStatus::Failed);
    assert_eq!(h.user_plan().await, None);
}

#[tokio::test]
async fn cancel_without_active_subscription_is_not_found() {
    let h = harness().await;

    let (status, body) = h
        .call(post_json("/api/subscriptions/cancel", json!({"user_id": USER})))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Active subscription not found");
}

#[tokio::test]
async fn unknown_user_cannot_subscribe() {
    let h = harness().await;

    let (status, _) = h
        .call(post_json(
            "/api/subscriptions/create",
            json!({"user_id": "nobody", "plan_id": PLAN}),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!h.gateway.was_called("create_plan"));
}

// =============================================================================
// Signatures
// =============================================================================

#[tokio::test]
async fn signed_and_unsigned_notifications_are_both_reconciled() {
    let secret = SecretString::new("whsec".to_string());
    let h = harness_with(|state| state.with_signature_check(secret.clone(), "login-1".to_string()))
        .await;
    let created = h.subscribe().await;
    let idx = created["payment"]["idx"].as_i64().unwrap();
    let token = created["payment"]["plan_token"].as_str().unwrap().to_string();

    let body = json!({"type": "payment.pending", "plan_token": token}).to_string();
    let header_value = format!(
        "V2-HMAC-SHA256, Signature: {}",
        signature::sign(&secret, "login-1", body.as_bytes())
    );
    let signed = Request::builder()
        .method("POST")
        .uri("/api/webhooks/dlocal")
        .header(header::AUTHORIZATION, header_value)
        .body(Body::from(body))
        .unwrap();
    let (status, _) = h.call(signed).await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = h
        .call(post_json(
            "/api/webhooks/dlocal",
            json!({"type": "payment.approved", "plan_token": token}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["applied"], true);
    assert_eq!(h.repo.payment(idx).await.unwrap().status, PaymentStatus::Completed);
}
