//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for hosted checkout and billing
//! portal sessions. Webhook verification lives in the domain layer since it
//! needs only the signing secret.
//!
//! Secrets are handled via `secrecy::SecretString`.

mod api_types;
mod mock_payment_provider;
mod stripe_adapter;

pub use api_types::{StripeApiError, StripeCheckoutSession, StripeErrorResponse, StripePortalSession};
pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
