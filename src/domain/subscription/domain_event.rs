//! Closed set of billing events the service reacts to.

use crate::domain::foundation::{CustomerId, SubscriptionId, UserId};

/// A verified provider event, decoded into the only shapes the
/// subscription lifecycle cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// Hosted checkout finished and a subscription now exists.
    SubscriptionStarted {
        user_id: UserId,
        subscription_id: SubscriptionId,
        customer_id: CustomerId,
    },

    /// A recurring invoice was paid.
    SubscriptionRenewed { subscription_id: SubscriptionId },

    /// A recurring invoice payment failed.
    PaymentFailed { subscription_id: SubscriptionId },

    /// The subscription was deleted at the provider.
    SubscriptionCancelled { subscription_id: SubscriptionId },

    /// Any event type this service does not model.
    Unrecognized { type_tag: String },
}

/// How the applier locates the record an event targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey<'a> {
    User(&'a UserId),
    Subscription(&'a SubscriptionId),
}

impl DomainEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::SubscriptionStarted { .. } => "subscription_started",
            DomainEvent::SubscriptionRenewed { .. } => "subscription_renewed",
            DomainEvent::PaymentFailed { .. } => "payment_failed",
            DomainEvent::SubscriptionCancelled { .. } => "subscription_cancelled",
            DomainEvent::Unrecognized { .. } => "unrecognized",
        }
    }

    /// Record lookup key, `None` for events that never touch the store.
    pub fn record_key(&self) -> Option<RecordKey<'_>> {
        match self {
            DomainEvent::SubscriptionStarted { user_id, .. } => Some(RecordKey::User(user_id)),
            DomainEvent::SubscriptionRenewed { subscription_id }
            | DomainEvent::PaymentFailed { subscription_id }
            | DomainEvent::SubscriptionCancelled { subscription_id } => {
                Some(RecordKey::Subscription(subscription_id))
            }
            DomainEvent::Unrecognized { .. } => None,
        }
    }
}
