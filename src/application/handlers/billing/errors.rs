//! Errors for the checkout and portal handlers.

use thiserror::Error;

use crate::domain::foundation::ValidationError;
use crate::ports::PaymentError;

/// Failure of a checkout or portal request.
///
/// Provider detail stays in the source error; `Display` is safe to return
/// to the caller.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Payment provider request failed")]
    Provider(#[source] PaymentError),
}

impl BillingError {
    pub fn is_validation(&self) -> bool {
        matches!(self, BillingError::Validation(_))
    }
}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        BillingError::Provider(err)
    }
}
