//! CreateCheckoutSessionHandler - Opens a hosted checkout for a plan price.
//!
//! The user id travels as session metadata so the completion webhook can be
//! correlated back to the user.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::ports::{CreateCheckoutRequest, PaymentProvider};

use super::errors::BillingError;

/// Repeated requests for the same user and price inside one window share an
/// idempotency key, so a retried request returns the same session.
const IDEMPOTENCY_WINDOW_SECS: i64 = 600;

/// Command to open a checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub user_id: String,
    pub price_id: String,
}

/// Redirect target for the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutSessionResult {
    pub session_id: String,
    pub url: String,
}

/// Handler for checkout session creation.
pub struct CreateCheckoutSessionHandler {
    payment_provider: Arc<dyn PaymentProvider>,
    public_base_url: String,
}

impl CreateCheckoutSessionHandler {
    pub fn new(payment_provider: Arc<dyn PaymentProvider>, public_base_url: impl Into<String>) -> Self {
        Self {
            payment_provider,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CreateCheckoutSessionResult, BillingError> {
        let price_id = cmd.price_id.trim();
        if price_id.is_empty() {
            return Err(ValidationError::empty_field("priceId").into());
        }
        let user_id =
            UserId::new(cmd.user_id.trim()).map_err(|_| ValidationError::empty_field("userId"))?;

        let request = CreateCheckoutRequest {
            user_id: user_id.clone(),
            price_id: price_id.to_string(),
            success_url: format!(
                "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.public_base_url
            ),
            cancel_url: format!("{}/cancel", self.public_base_url),
            idempotency_key: Some(idempotency_key(&user_id, price_id, Timestamp::now())),
        };

        let session = self
            .payment_provider
            .create_checkout_session(request)
            .await
            .map_err(|err| {
                tracing::error!(
                    user_id = %user_id,
                    price_id = %price_id,
                    code = %err.code,
                    error = %err,
                    "Checkout session creation failed"
                );
                BillingError::from(err)
            })?;

        Ok(CreateCheckoutSessionResult {
            session_id: session.id,
            url: session.url,
        })
    }
}

fn idempotency_key(user_id: &UserId, price_id: &str, at: Timestamp) -> String {
    let window = at.as_unix_secs().div_euclid(IDEMPOTENCY_WINDOW_SECS);
    let digest = Sha256::new()
        .chain_update(user_id.as_str().as_bytes())
        .chain_update([0u8])
        .chain_update(price_id.as_bytes())
        .chain_update([0u8])
        .chain_update(window.to_be_bytes())
        .finalize();
    format!("checkout-{}", hex::encode(digest))
}
