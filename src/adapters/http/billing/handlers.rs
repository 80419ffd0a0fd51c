//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the billing command handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::billing::{
    BillingError, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreatePortalSessionCommand, CreatePortalSessionHandler, HandleWebhookCommand,
    HandleWebhookHandler,
};
use crate::domain::subscription::{StripeWebhookVerifier, WebhookError};
use crate::ports::{PaymentProvider, SubscriptionStore, WebhookEventRepository};

use super::dto::{
    CheckoutSessionRequest, ErrorResponse, PortalSessionRequest, RedirectResponse,
    WebhookAckResponse,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped.
#[derive(Clone)]
pub struct BillingAppState {
    pub subscription_store: Arc<dyn SubscriptionStore>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub webhook_verifier: StripeWebhookVerifier,
    pub require_livemode: bool,
    /// Origin used for checkout and portal redirects.
    pub public_base_url: String,
}

impl BillingAppState {
    pub fn webhook_handler(&self) -> HandleWebhookHandler {
        HandleWebhookHandler::new(
            self.webhook_verifier.clone(),
            self.subscription_store.clone(),
            self.webhook_events.clone(),
        )
        .with_livemode_required(self.require_livemode)
    }

    pub fn checkout_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(self.payment_provider.clone(), self.public_base_url.clone())
    }

    pub fn portal_handler(&self) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(self.payment_provider.clone(), self.public_base_url.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhook - Receive a provider event
///
/// The body is taken as raw bytes; the signature covers them exactly.
pub async fn handle_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleWebhookCommand {
        payload: body.to_vec(),
        signature,
    };
    state.webhook_handler().handle(cmd).await?;

    Ok(Json(WebhookAckResponse::received()))
}

/// POST /api/check-out-session - Open a hosted checkout
pub async fn create_checkout_session(
    State(state): State<BillingAppState>,
    request: Result<Json<CheckoutSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = request?;
    let cmd = CreateCheckoutSessionCommand {
        user_id: request.user_id.unwrap_or_default(),
        price_id: request.price_id.unwrap_or_default(),
    };

    let result = state.checkout_handler().handle(cmd).await?;

    Ok(Json(RedirectResponse { url: result.url }))
}

/// POST /api/create-portal-session - Open the billing portal
pub async fn create_portal_session(
    State(state): State<BillingAppState>,
    request: Result<Json<PortalSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = request?;
    let cmd = CreatePortalSessionCommand {
        customer_id: request.customer_id.unwrap_or_default(),
    };

    let url = state.portal_handler().handle(cmd).await?;

    Ok(Json(RedirectResponse { url }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts handler errors to HTTP responses.
#[derive(Debug)]
pub enum BillingApiError {
    Webhook(WebhookError),
    Billing(BillingError),
    InvalidBody(String),
}

impl From<WebhookError> for BillingApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self::Billing(err)
    }
}

impl From<JsonRejection> for BillingApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            BillingApiError::Webhook(err) => {
                let status = err.status_code();
                let message = match err {
                    WebhookError::TransientStoreFailure(_) => "Internal server error".to_string(),
                    other => other.to_string(),
                };
                (status, message)
            }
            BillingApiError::Billing(err) => {
                let status = if err.is_validation() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.to_string())
            }
            BillingApiError::InvalidBody(detail) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", detail),
            ),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
