//! Integration tests for the billing HTTP endpoints.
//!
//! These tests drive the full router with `tower::ServiceExt::oneshot`:
//! 1. Webhook deliveries map engine outcomes to status codes
//! 2. Read endpoints require a bearer token and enforce ownership
//! 3. Query parameters shape the billing history response

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use bms_billing::adapters::http::{billing_router, BillingAppState};
use bms_billing::adapters::{
    FixedClock, InMemoryBillingStore, InMemoryUserDirectory, MockHttpClient, MockSessionValidator,
    ProviderRegistry,
};
use bms_billing::application::ReconciliationEngine;
use bms_billing::config::ProviderConfig;
use bms_billing::domain::billing::{EventType, NormalizedEvent, SubscriptionStatus};
use bms_billing::domain::foundation::Timestamp;
use bms_billing::ports::UserDirectory;

// =============================================================================
// Test Infrastructure
// =============================================================================

const KOFI_TOKEN: &str = "kofi-http-token";
const NOW: i64 = 1_735_000_000;

struct TestApp {
    router: Router,
    engine: Arc<ReconciliationEngine>,
    store: Arc<InMemoryBillingStore>,
}

async fn test_app() -> TestApp {
    let clock = Arc::new(FixedClock::at_unix(NOW));
    let registry = ProviderRegistry::from_configs(
        &[ProviderConfig::new("kofi", KOFI_TOKEN)],
        Arc::new(MockHttpClient::new()),
        clock.clone(),
    )
    .unwrap();

    let store = Arc::new(InMemoryBillingStore::new());
    let directory: Arc<dyn UserDirectory> = Arc::new(
        InMemoryUserDirectory::new()
            .with_user("u-alice", "alice@example.com", false)
            .await
            .unwrap()
            .with_user("u-mallory", "mallory@example.com", false)
            .await
            .unwrap()
            .with_user("u-admin", "admin@example.com", true)
            .await
            .unwrap(),
    );

    let engine = Arc::new(
        ReconciliationEngine::new(Arc::new(registry), store.clone(), clock)
            .with_directory(directory.clone()),
    );
    let state = BillingAppState {
        engine: engine.clone(),
        store: store.clone(),
        directory: Some(directory),
    };
    let validator = Arc::new(
        MockSessionValidator::new()
            .with_test_user("alice-token", "u-alice")
            .with_test_user("mallory-token", "u-mallory")
            .with_test_user("admin-token", "u-admin"),
    );

    TestApp {
        router: billing_router(state, validator, Duration::from_secs(30), &[]),
        engine,
        store,
    }
}

fn kofi_body(token: &str, message_id: &str) -> String {
    let payload = json!({
        "verification_token": token,
        "message_id": message_id,
        "timestamp": "2025-01-10T12:00:00Z",
        "type": "Subscription",
        "from_name": "Alice",
        "amount": "5.00",
        "email": "alice@example.com",
        "currency": "USD",
        "is_subscription_payment": true,
        "is_first_subscription_payment": true,
        "kofi_transaction_id": format!("tx-{}", message_id),
        "tier_name": "Gold"
    });
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("data", &payload.to_string())
        .finish()
}

fn webhook(provider: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/v1/bms/billings/{}/webhooks", provider))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Seeds alice's subscription plus `payments` renewal events.
async fn seed_alice(app: &TestApp, payments: usize) {
    let at = Timestamp::from_unix_secs(NOW).unwrap();
    let mut created = NormalizedEvent::new(EventType::SubscriptionCreated, "evt_0", at);
    created.subscription_id = Some("sub_A".into());
    created.customer_email = Some("alice@example.com".into());
    created.status = Some(SubscriptionStatus::Active);
    created.plan_name = Some("Pro".into());
    created.amount = 2999;
    created.currency = "USD".into();
    created.next_billing_date = Timestamp::from_unix_secs(1_735_689_600);
    app.engine.process("kofi", created.clone()).await.unwrap();

    for i in 1..=payments {
        let mut payment = created.clone();
        payment.event_type = EventType::PaymentSucceeded;
        payment.event_id = format!("evt_{}", i);
        app.engine.process("kofi", payment).await.unwrap();
    }
}

// =============================================================================
// Webhooks
// =============================================================================

#[tokio::test]
async fn webhook_with_valid_token_returns_200() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(webhook("kofi", kofi_body(KOFI_TOKEN, "msg-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.subscription_count().await, 1);
    assert_eq!(app.store.billing_event_count().await, 1);
}

#[tokio::test]
async fn webhook_redelivery_returns_200() {
    let app = test_app().await;
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(webhook("kofi", kofi_body(KOFI_TOKEN, "msg-dup")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.store.billing_event_count().await, 1);
}

#[tokio::test]
async fn webhook_with_wrong_token_returns_400() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(webhook("kofi", kofi_body("forged", "msg-2")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_SIGNATURE");
    assert_eq!(app.store.subscription_count().await, 0);
}

#[tokio::test]
async fn webhook_for_unknown_provider_returns_404() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(webhook("paypal", String::new()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "PROVIDER_NOT_FOUND");
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn reads_without_token_return_401() {
    let app = test_app().await;
    for uri in [
        "/api/v1/bms/billings/users/u-alice/events",
        "/api/v1/bms/users/u-alice/details/subscription",
        "/api/v1/bms/users/u-alice/details/billing",
    ] {
        let response = app.router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn unknown_token_returns_401() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/bms/users/u-alice/details/subscription", Some("nope")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_users_data_returns_403() {
    let app = test_app().await;
    seed_alice(&app, 0).await;
    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/users/u-alice/details/subscription",
            Some("mallory-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn admin_may_read_any_user() {
    let app = test_app().await;
    seed_alice(&app, 0).await;
    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/users/u-alice/details/subscription",
            Some("admin-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["has_subscription"], true);
    assert_eq!(body["plan_name"], "Pro");
    assert_eq!(body["is_active"], true);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn billing_detail_includes_summary() {
    let app = test_app().await;
    seed_alice(&app, 0).await;
    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/bms/users/u-alice/details/billing", Some("alice-token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["summary"],
        "Your Pro plan will automatically renew on 2025-01-01 for 29.99 USD"
    );
}

#[tokio::test]
async fn subscription_status_without_subscription_is_empty() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/users/u-alice/details/subscription",
            Some("alice-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["has_subscription"], false);
}

#[tokio::test]
async fn events_meta_flag_controls_envelope() {
    let app = test_app().await;
    seed_alice(&app, 4).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/billings/users/u-alice/events?per_page=2&page=2&meta=true",
            Some("alice-token"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["total"], 5);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["page"], 2);

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/billings/users/u-alice/events",
            Some("alice-token"),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(5));
    assert!(body.get("total").is_none());
}

#[tokio::test]
async fn events_page_past_the_end_returns_400() {
    let app = test_app().await;
    seed_alice(&app, 1).await;
    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/billings/users/u-alice/events?per_page=10&page=5",
            Some("alice-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "PAGE_OUT_OF_RANGE");
}

#[tokio::test]
async fn events_with_unknown_order_returns_400() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/billings/users/u-alice/events?order=sideways",
            Some("alice-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_QUERY");
}

#[tokio::test]
async fn empty_history_first_page_is_ok() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/v1/bms/billings/users/u-alice/events?meta=true",
            Some("alice-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["total"], 0);
}
