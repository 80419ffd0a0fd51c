//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `SubscriptionStore` - Per-user subscription records (compare-and-set writes)
//! - `WebhookEventRepository` - Ledger of processed Stripe webhook events
//! - `PaymentProvider` - Hosted checkout and billing portal sessions

mod payment_provider;
mod subscription_store;
mod webhook_event_repository;

pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession,
};
pub use subscription_store::{SubscriptionStore, UpsertOutcome};
pub use webhook_event_repository::{
    ClaimResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
