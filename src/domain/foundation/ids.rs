//! Strongly-typed identifier value objects.
//!
//! All identifiers here are opaque strings issued by someone else: the
//! application's auth layer (users) or the payment provider (customers,
//! subscriptions, events). They are only checked for emptiness.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, returning error if empty.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

string_id!(
    /// Application user identifier (from the auth layer).
    UserId,
    "user_id"
);

string_id!(
    /// Provider billing identity (`cus_...`).
    CustomerId,
    "customer_id"
);

string_id!(
    /// Provider subscription identity (`sub_...`).
    SubscriptionId,
    "subscription_id"
);

string_id!(
    /// Provider event identifier (`evt_...`), unique per delivery payload.
    EventId,
    "event_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_non_empty_string() {
        let id = UserId::new("user-123").unwrap();
        assert_eq!(id.as_str(), "user-123");
    }

    #[test]
    fn user_id_rejects_empty_string() {
        let result = UserId::new("");
        match result {
            Err(ValidationError::EmptyField { field }) => assert_eq!(field, "user_id"),
            _ => panic!("Expected EmptyField error"),
        }
    }

    #[test]
    fn whitespace_only_is_rejected() {
        assert!(CustomerId::new("   ").is_err());
    }

    #[test]
    fn ids_display_their_value() {
        let id = SubscriptionId::new("sub_123").unwrap();
        assert_eq!(format!("{}", id), "sub_123");
    }

    #[test]
    fn ids_deserialize_from_plain_strings() {
        let id: EventId = serde_json::from_str("\"evt_1\"").unwrap();
        assert_eq!(id.as_str(), "evt_1");
    }

    #[test]
    fn empty_ids_fail_to_deserialize() {
        let result: Result<CustomerId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
