//! Subscription domain module.
//!
//! Mirrors the payment provider's subscription lifecycle onto one record
//! per user.
//!
//! # Module Structure
//!
//! - `record` - SubscriptionRecord aggregate
//! - `status` - SubscriptionStatus state machine
//! - `plan` - Plan tiers
//! - `domain_event` - Classified billing events
//! - `transition` - Pure transition rules
//! - `stripe_event` - Webhook envelope and object shapes
//! - `classifier` - Raw event → DomainEvent
//! - `webhook_verifier` - Signature verification
//! - `webhook_errors` - Webhook pipeline errors

mod classifier;
mod domain_event;
mod plan;
mod record;
mod status;
pub mod stripe_event;
mod transition;
mod webhook_errors;
mod webhook_verifier;

pub use classifier::classify;
pub use domain_event::{DomainEvent, RecordKey};
pub use plan::Plan;
pub use record::SubscriptionRecord;
pub use status::SubscriptionStatus;
pub use stripe_event::{StripeEvent, StripeEventType};
pub use transition::{decide, Transition};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{SignatureHeader, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS};

#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
