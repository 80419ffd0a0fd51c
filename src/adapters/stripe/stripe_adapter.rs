//! Stripe payment provider adapter.
//!
//! Implements `PaymentProvider` against the Stripe REST API using
//! form-encoded requests and basic auth with the secret key.
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::CustomerId;
use crate::domain::subscription::stripe_event::USER_ID_METADATA_KEY;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession,
};

use super::api_types::{StripeCheckoutSession, StripeErrorResponse, StripePortalSession};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Create an adapter sharing an existing HTTP client.
    pub fn with_client(config: StripeConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
        operation: &'static str,
    ) -> Result<T, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let mut request = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Stripe request failed to send");
            PaymentError::network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(operation, status = %status, body = %body, "Stripe API error");
            return Err(map_error_response(status, &body));
        }

        response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
///
/// The user id goes into both the session and the subscription metadata;
/// the completion webhook is correlated back to the user through it.
fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(String, String)> {
    let user_id = request.user_id.to_string();
    vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), user_id.clone()),
        (format!("metadata[{}]", USER_ID_METADATA_KEY), user_id.clone()),
        (
            format!("subscription_data[metadata][{}]", USER_ID_METADATA_KEY),
            user_id,
        ),
    ]
}

/// Maps a non-2xx Stripe response onto a `PaymentError`.
fn map_error_response(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|r| r.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        429 => PaymentErrorCode::RateLimitExceeded,
        400..=499 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    };

    let mut err = PaymentError::new(code, message);
    if let Some(provider_code) = parsed.and_then(|r| r.error.code) {
        err = err.with_provider_code(provider_code);
    }
    err
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = checkout_params(&request);

        let session: StripeCheckoutSession = self
            .post_form(
                "/v1/checkout/sessions",
                &params,
                request.idempotency_key.as_deref(),
                "create_checkout_session",
            )
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider(format!("Checkout session {} has no redirect url", session.id))
        })?;

        tracing::info!(
            session_id = %session.id,
            user_id = %request.user_id,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: session.expires_at,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &CustomerId,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = [
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        let portal: StripePortalSession = self
            .post_form(
                "/v1/billing_portal/sessions",
                &params,
                None,
                "create_portal_session",
            )
            .await?;

        Ok(PortalSession {
            id: portal.id,
            url: portal.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn test_config() -> StripeConfig {
        StripeConfig::new(SecretString::new("sk_test_key".to_string()))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_default_base_url() {
        assert_eq!(test_config().api_base_url, "https://api.stripe.com");
    }

    #[test]
    fn config_with_base_url() {
        let config = test_config().with_base_url("http://localhost:12111");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Request Building Tests
    // ════════════════════════════════════════════════════════════════════════════

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn checkout_params_carry_user_id_for_webhook_correlation() {
        let params = checkout_params(&CreateCheckoutRequest {
            user_id: UserId::new("user-42").unwrap(),
            price_id: "price_pro".to_string(),
            success_url: "https://app.example.com/success".to_string(),
            cancel_url: "https://app.example.com/cancel".to_string(),
            idempotency_key: None,
        });

        assert_eq!(param(&params, "mode"), Some("subscription"));
        assert_eq!(param(&params, "metadata[userId]"), Some("user-42"));
        assert_eq!(
            param(&params, "subscription_data[metadata][userId]"),
            Some("user-42")
        );
        assert_eq!(param(&params, "client_reference_id"), Some("user-42"));
        assert_eq!(param(&params, "line_items[0][price]"), Some("price_pro"));
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("1"));
        assert_eq!(
            param(&params, "success_url"),
            Some("https://app.example.com/success")
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn missing_resource_maps_to_invalid_request_with_code() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such price: 'price_x'"}}"#;

        let err = map_error_response(reqwest::StatusCode::BAD_REQUEST, body);

        assert_eq!(err.code, PaymentErrorCode::InvalidRequest);
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
        assert_eq!(err.message, "No such price: 'price_x'");
    }

    #[test]
    fn unauthorized_maps_to_authentication_error() {
        let err = map_error_response(reqwest::StatusCode::UNAUTHORIZED, "{}");
        assert_eq!(err.code, PaymentErrorCode::AuthenticationError);
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = map_error_response(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err.code, PaymentErrorCode::RateLimitExceeded);
        assert!(err.retryable);
    }

    #[test]
    fn server_error_with_unparseable_body_keeps_status() {
        let err = map_error_response(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(err.code, PaymentErrorCode::ProviderError);
        assert!(err.message.contains("502"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Transport Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unreachable_api_is_a_network_error() {
        let adapter =
            StripePaymentAdapter::new(test_config().with_base_url("http://127.0.0.1:9"));

        let result = adapter
            .create_checkout_session(CreateCheckoutRequest {
                user_id: UserId::new("user-1").unwrap(),
                price_id: "price_1".to_string(),
                success_url: "http://localhost/success".to_string(),
                cancel_url: "http://localhost/cancel".to_string(),
                idempotency_key: None,
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::NetworkError);
    }
}
