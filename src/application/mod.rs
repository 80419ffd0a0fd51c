//! Application layer - Command handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    ApplyOutcome, ApplySubscriptionEventCommand, ApplySubscriptionEventHandler, BillingError,
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
    CreatePortalSessionCommand, CreatePortalSessionHandler, HandleWebhookCommand,
    HandleWebhookHandler, HandleWebhookResult,
};
