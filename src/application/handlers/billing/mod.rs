//! Billing handlers.
//!
//! - `HandleWebhookHandler` - Verifies, classifies and applies provider webhooks
//! - `ApplySubscriptionEventHandler` - Transition applier with compare-and-set retries
//! - `CreateCheckoutSessionHandler` - Hosted checkout for a plan price
//! - `CreatePortalSessionHandler` - Billing portal redirect

mod apply_subscription_event;
mod create_checkout_session;
mod create_portal_session;
mod errors;
mod handle_webhook;

pub use apply_subscription_event::{
    ApplyOutcome, ApplySubscriptionEventCommand, ApplySubscriptionEventHandler,
    DEFAULT_MAX_ATTEMPTS,
};
pub use create_checkout_session::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
};
pub use create_portal_session::{CreatePortalSessionCommand, CreatePortalSessionHandler};
pub use errors::BillingError;
pub use handle_webhook::{HandleWebhookCommand, HandleWebhookHandler, HandleWebhookResult};
