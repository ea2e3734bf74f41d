//! Integration tests for the HTTP backend client.
//!
//! Each test spins up an Axum stub of the onboarding REST API on a random
//! port and points a real `HttpBackend` at it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Json as JsonBody;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use reformly_onboarding::api::{Backend, HttpBackend, NoIdentity, StaticIdentity, TokenStore};
use reformly_onboarding::error::ApiError;
use reformly_onboarding::store::{KeyValueStore, MemoryStore, storage_keys};
use reformly_onboarding::submission::FinishOnboardingPayload;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn verify_otp(JsonBody(body): JsonBody<Value>) -> impl IntoResponse {
    if body["code"] == "123456" {
        Json(json!({
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "user": {"id": "u1", "email": body["email"], "role": "user"}
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": ["code must be valid", "code expired"]})),
        )
            .into_response()
    }
}

async fn auth_me(headers: HeaderMap) -> impl IntoResponse {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer access-1") => Json(json!({
            "id": "u1",
            "email": "runner@example.com",
            "username": "runner",
            "subscription": {"status": "active"}
        }))
        .into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response(),
    }
}

async fn request_otp(headers: HeaderMap) -> impl IntoResponse {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer firebase-id") => Json(json!({"sent": true})).into_response(),
        _ => (StatusCode::FORBIDDEN, Json(json!({"error": "App check failed"}))).into_response(),
    }
}

async fn plans() -> impl IntoResponse {
    Json(json!([
        {"id": "price_year", "amount": 11999, "currency": "usd", "interval": "year",
         "intervalCount": 1, "product": {"name": "Annual"}},
        {"id": "price_month", "amount": 1999, "currency": "usd", "interval": "month",
         "intervalCount": 1, "product": {"name": "Monthly"}}
    ]))
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}

/// Start the stub API on a random port and return its base URL.
async fn start_server() -> String {
    let app = Router::new()
        .route("/auth/request-otp", post(request_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/me", get(auth_me))
        .route("/subscriptions/active-subscriptions", get(|| async { "" }))
        .route("/subscriptions/plans", get(plans))
        .route(
            "/subscriptions/checkout",
            post(|| async { Json(json!({"id": "cs_1"})) }),
        )
        .route(
            "/users/finish-onboarding",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/auth/firebase", post(slow));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}/")
}

async fn client(base: &str, request_timeout: Duration) -> (HttpBackend, Arc<MemoryStore>) {
    let kv = Arc::new(MemoryStore::new());
    let tokens = Arc::new(TokenStore::load(kv.clone()).await);
    let backend = HttpBackend::new(
        Some(base.to_string()),
        request_timeout,
        tokens,
        Arc::new(NoIdentity),
    )
    .unwrap();
    (backend, kv)
}

#[tokio::test]
async fn verify_stores_tokens_and_authorizes_later_calls() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, kv) = client(&base, Duration::from_secs(2)).await;

        let response = backend
            .verify_otp("runner@example.com", "123456")
            .await
            .unwrap();
        assert_eq!(response.user.unwrap().email, "runner@example.com");
        assert_eq!(
            kv.get(storage_keys::ACCESS_TOKEN).await.unwrap(),
            Some(json!("access-1"))
        );
        assert!(backend.tokens().has_refresh_token().await);

        let me = backend.auth_me().await.unwrap();
        assert_eq!(me.username.as_deref(), Some("runner"));
        assert!(me.reports_subscription());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn error_messages_are_joined() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, _) = client(&base, Duration::from_secs(2)).await;

        let err = backend
            .verify_otp("runner@example.com", "000000")
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "code must be valid, code expired");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_json_error_uses_reason_phrase() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, _) = client(&base, Duration::from_secs(2)).await;

        let err = backend
            .finish_onboarding(&FinishOnboardingPayload::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "Internal Server Error (status 500)");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unauthorized_clears_session() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let kv = Arc::new(MemoryStore::with_entries([
            (storage_keys::ACCESS_TOKEN, json!("stale")),
            (storage_keys::REFRESH_TOKEN, json!("stale-refresh")),
        ]));
        let tokens = Arc::new(TokenStore::load(kv.clone()).await);
        let backend = HttpBackend::new(
            Some(base),
            Duration::from_secs(2),
            tokens,
            Arc::new(NoIdentity),
        )
        .unwrap();

        let err = backend.auth_me().await.unwrap_err();
        assert_eq!(err.to_string(), "Session expired. Please sign in again.");
        assert!(!backend.tokens().has_access_token().await);
        assert_eq!(kv.get(storage_keys::ACCESS_TOKEN).await.unwrap(), None);

        // Without a refresh token the message is plain.
        let err = backend.auth_me().await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_subscription_body_means_none() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, _) = client(&base, Duration::from_secs(2)).await;
        assert!(backend.active_subscription().await.unwrap().is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn plans_are_decoded_with_prices() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, _) = client(&base, Duration::from_secs(2)).await;

        let plans = backend.subscription_plans(3).await.unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].display_weekly_price().as_deref(), Some("$2.30/week"));
        assert_eq!(plans[1].label(), "Monthly");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn checkout_without_url_is_invalid() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, _) = client(&base, Duration::from_secs(2)).await;
        assert!(matches!(
            backend.create_checkout("price_year").await,
            Err(ApiError::InvalidResponse(_))
        ));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn identity_token_rides_along_on_otp_request() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStore::new())));
        let backend = HttpBackend::new(
            Some(base.clone()),
            Duration::from_secs(2),
            tokens,
            Arc::new(StaticIdentity::new(Some("firebase-id".into()), None)),
        )
        .unwrap();
        backend.request_otp("runner@example.com").await.unwrap();

        let (anonymous, _) = client(&base, Duration::from_secs(2)).await;
        let err = anonymous.request_otp("runner@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "App check failed (status 403)");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_backend_times_out() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let (backend, _) = client(&base, Duration::from_millis(200)).await;

        let err = backend
            .exchange_identity_token(&"google-id".to_string().into())
            .await
            .unwrap_err();
        match err {
            ApiError::Timeout { endpoint, timeout } => {
                assert_eq!(endpoint, "/auth/firebase");
                assert_eq!(timeout, Duration::from_millis(200));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}
