//! Axum router configuration for billing endpoints.

use axum::{routing::post, Router};

use super::handlers::{
    create_checkout_session, create_portal_session, handle_webhook, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
/// - `POST /api/webhook` - Provider webhooks (signature verified, no user auth)
/// - `POST /api/check-out-session` - Start a subscription checkout
/// - `POST /api/create-portal-session` - Open the billing portal
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .route("/api/webhook", post(handle_webhook))
        .route("/api/check-out-session", post(create_checkout_session))
        .route("/api/create-portal-session", post(create_portal_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::adapters::http::billing::SIGNATURE_HEADER;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryWebhookEventRepository};
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::{
        compute_test_signature, StripeWebhookVerifier, SubscriptionStatus,
    };
    use crate::ports::{PaymentError, SubscriptionStore};

    const TEST_SECRET: &str = "whsec_router_secret";

    struct TestApp {
        router: Router,
        store: InMemorySubscriptionStore,
        provider: MockPaymentProvider,
    }

    fn test_app() -> TestApp {
        let store = InMemorySubscriptionStore::new();
        let provider = MockPaymentProvider::new();
        let state = BillingAppState {
            subscription_store: Arc::new(store.clone()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            payment_provider: Arc::new(provider.clone()),
            webhook_verifier: StripeWebhookVerifier::new(Some(SecretString::new(
                TEST_SECRET.to_string(),
            ))),
            require_livemode: false,
            public_base_url: "https://app.example.com".to_string(),
        };
        TestApp {
            router: billing_router().with_state(state),
            store,
            provider,
        }
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn signed_webhook(payload: &Value) -> Request<Body> {
        let body = payload.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature(TEST_SECRET, timestamp, &body);
        Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .header(SIGNATURE_HEADER, format!("t={},v1={}", timestamp, signature))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn webhook_acknowledges_and_applies() {
        let app = test_app();
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {
                "id": "cs_1",
                "mode": "subscription",
                "metadata": { "userId": "u1" },
                "customer": "cus_1",
                "subscription": "sub_1"
            }}
        });

        let response = app.router.oneshot(signed_webhook(&payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "received": true }));
        let record = app.store.get(&UserId::new("u1").unwrap()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhook")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Missing credentials"));
    }

    #[tokio::test]
    async fn checkout_returns_url() {
        let app = test_app();

        let response = app
            .router
            .oneshot(json_post(
                "/api/check-out-session",
                json!({ "priceId": "price_pro", "userId": "u1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["url"].as_str().unwrap().contains("cs_mock_u1"));
        assert_eq!(app.provider.call_count("create_checkout_session"), 1);
    }

    #[tokio::test]
    async fn checkout_without_price_is_bad_request() {
        let app = test_app();

        let response = app
            .router
            .oneshot(json_post("/api/check-out-session", json!({ "userId": "u1" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Field 'priceId' cannot be empty" })
        );
    }

    #[tokio::test]
    async fn checkout_with_unparseable_body_is_bad_request() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/check-out-session")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn portal_provider_failure_is_generic_server_error() {
        let app = test_app();
        app.provider
            .set_error(PaymentError::invalid_request("No such customer: 'cus_x'"));

        let response = app
            .router
            .oneshot(json_post(
                "/api/create-portal-session",
                json!({ "customerId": "cus_x" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Payment provider request failed" })
        );
    }

    #[tokio::test]
    async fn portal_returns_url() {
        let app = test_app();

        let response = app
            .router
            .oneshot(json_post(
                "/api/create-portal-session",
                json!({ "customerId": "cus_1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "url": "https://billing.stripe.test/p/session/cus_1" })
        );
    }
}
