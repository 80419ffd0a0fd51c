//! Subscription status state machine.
//!
//! `None → Active → {PastDue ⇄ Active} → Cancelled`, plus the
//! resubscribe edge `Cancelled → Active`.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a user's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// No subscription has ever started for this user.
    #[default]
    None,

    /// Paid and current.
    Active,

    /// Latest recurring payment failed; the provider is retrying.
    PastDue,

    /// Subscription ended at the provider.
    Cancelled,
}

impl SubscriptionStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if the user currently holds a live subscription.
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus as S;
        matches!(
            (self, target),
            (S::None, S::Active)
                | (S::Active, S::Active) // Renewal
                | (S::Active, S::PastDue)
                | (S::Active, S::Cancelled)
                | (S::PastDue, S::Active)
                | (S::PastDue, S::Cancelled)
                | (S::Cancelled, S::Active) // Resubscribe
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus as S;
        match self {
            S::None => vec![S::Active],
            S::Active => vec![S::Active, S::PastDue, S::Cancelled],
            S::PastDue => vec![S::Active, S::Cancelled],
            S::Cancelled => vec![S::Active],
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionStatus::None),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}
