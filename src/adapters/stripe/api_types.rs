//! Stripe REST API response shapes.
//!
//! Only fields relevant to our processing are captured.

use serde::Deserialize;

/// `POST /v1/checkout/sessions` response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session ID (cs_...).
    pub id: String,

    /// Hosted checkout page. Absent only for embedded UI modes.
    #[serde(default)]
    pub url: Option<String>,

    /// Unix timestamp after which the session can no longer be completed.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// `POST /v1/billing_portal/sessions` response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePortalSession {
    /// Session ID (bps_...).
    pub id: String,

    /// Portal page for the customer.
    pub url: String,
}

/// Error envelope returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    /// `invalid_request_error`, `api_error`, `card_error`, ...
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    /// Machine-readable code such as `resource_missing`.
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}
