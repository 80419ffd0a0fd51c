//! CreatePortalSessionHandler - Opens the provider's billing portal for a customer.

use std::sync::Arc;

use crate::domain::foundation::{CustomerId, ValidationError};
use crate::ports::PaymentProvider;

use super::errors::BillingError;

/// Command to open a billing portal session.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionCommand {
    pub customer_id: String,
}

/// Handler for billing portal sessions. The portal returns to the public base URL.
pub struct CreatePortalSessionHandler {
    payment_provider: Arc<dyn PaymentProvider>,
    return_url: String,
}

impl CreatePortalSessionHandler {
    pub fn new(payment_provider: Arc<dyn PaymentProvider>, return_url: impl Into<String>) -> Self {
        Self {
            payment_provider,
            return_url: return_url.into(),
        }
    }

    /// Returns the portal URL.
    pub async fn handle(&self, cmd: CreatePortalSessionCommand) -> Result<String, BillingError> {
        let customer_id = CustomerId::new(cmd.customer_id.trim())
            .map_err(|_| ValidationError::empty_field("customerId"))?;

        let session = self
            .payment_provider
            .create_portal_session(&customer_id, &self.return_url)
            .await
            .map_err(|err| {
                tracing::error!(
                    customer_id = %customer_id,
                    code = %err.code,
                    error = %err,
                    "Billing portal session creation failed"
                );
                BillingError::from(err)
            })?;

        Ok(session.url)
    }
}
