//! Subscription record aggregate.
//!
//! One record per user, mirroring the provider's view of that user's
//! subscription. Records are never deleted; cancellation is a status.

use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, EventId, StateMachine, SubscriptionId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use super::{Plan, SubscriptionStatus};

/// A user's subscription state.
///
/// # Invariants
///
/// - `Active`/`PastDue` ⇒ `subscription_id` and `customer_id` are set
/// - `None` ⇒ `plan == Free`
/// - `customer_id` never changes once set
/// - `version` increments on every persisted write (0 = never persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub customer_id: Option<CustomerId>,
    pub subscription_id: Option<SubscriptionId>,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    /// Most recently applied provider event.
    pub last_event_id: Option<EventId>,
    pub updated_at: Timestamp,
    /// Optimistic concurrency token, owned by the store.
    pub version: i64,
}

impl SubscriptionRecord {
    /// Fresh record for a user that has never subscribed.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            customer_id: None,
            subscription_id: None,
            status: SubscriptionStatus::None,
            plan: Plan::Free,
            last_event_id: None,
            updated_at: Timestamp::now(),
            version: 0,
        }
    }

    /// Returns true if `event_id` was the last event applied to this record.
    pub fn has_applied(&self, event_id: &EventId) -> bool {
        self.last_event_id.as_ref() == Some(event_id)
    }

    /// Start (or restart after cancellation) a paid subscription.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if a subscription is already live
    /// - `InvalidStateTransition` if `customer_id` differs from the stored one
    pub fn start(
        &mut self,
        subscription_id: SubscriptionId,
        customer_id: CustomerId,
        event_id: EventId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        if self.status.is_live() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Subscription already {}", self.status),
            ));
        }
        if let Some(existing) = &self.customer_id {
            if existing != &customer_id {
                return Err(DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    "Customer id cannot be reassigned",
                )
                .with_detail("stored", existing.as_str())
                .with_detail("received", customer_id.as_str()));
            }
        }

        self.transition_to(SubscriptionStatus::Active)?;
        self.customer_id = Some(customer_id);
        self.subscription_id = Some(subscription_id);
        self.plan = Plan::Pro;
        self.touch(event_id, at);
        Ok(())
    }

    /// Recurring payment succeeded (renewal, or recovery from past due).
    pub fn renew(&mut self, event_id: EventId, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        self.touch(event_id, at);
        Ok(())
    }

    /// Recurring payment failed.
    pub fn mark_past_due(&mut self, event_id: EventId, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::PastDue)?;
        self.touch(event_id, at);
        Ok(())
    }

    /// Subscription ended; the user drops back to the free plan.
    pub fn cancel(&mut self, event_id: EventId, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Cancelled)?;
        self.plan = Plan::Free;
        self.touch(event_id, at);
        Ok(())
    }

    /// Checks the structural invariants, used by stores before writing.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.status.is_live() && (self.subscription_id.is_none() || self.customer_id.is_none())
        {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "{} subscription requires subscription and customer ids",
                    self.status
                ),
            ));
        }
        if self.status == SubscriptionStatus::None && self.plan != Plan::Free {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "User without a subscription must be on the free plan",
            ));
        }
        Ok(())
    }

    fn touch(&mut self, event_id: EventId, at: Timestamp) {
        self.last_event_id = Some(event_id);
        self.updated_at = at;
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition subscription from {} to {}", self.status, target),
            )
        })?;
        Ok(())
    }
}
