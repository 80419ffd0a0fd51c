//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    ApplyOutcome, ApplySubscriptionEventCommand, ApplySubscriptionEventHandler, BillingError,
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
    CreatePortalSessionCommand, CreatePortalSessionHandler, HandleWebhookCommand,
    HandleWebhookHandler, HandleWebhookResult,
};
