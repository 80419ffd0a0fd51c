//! Subscription store port.
//!
//! Durable home of [`SubscriptionRecord`]s, one per user. Writes are
//! compare-and-set on the record's `version` so concurrent deliveries of
//! the same event cannot both apply.

use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::subscription::SubscriptionRecord;
use async_trait::async_trait;

/// Result of a compare-and-set write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Written; carries the new version.
    Written { version: i64 },
    /// The stored version no longer matches; re-read and decide again.
    Conflict,
    /// The record's customer id is already held by another user.
    CustomerTaken,
}

/// Repository port for subscription records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Find the record for a user.
    ///
    /// Returns `None` if the user never subscribed.
    async fn get(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Find the record currently holding a provider subscription id.
    async fn find_by_subscription_id(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Write `record` if the stored version still equals `record.version`.
    ///
    /// `record.version == 0` means "insert only if no record exists".
    /// Content fields are last-write-wins apart from `customer_id`, which at
    /// most one user may hold.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the record breaks its invariants (whether the
    ///   check fails in code or in a storage constraint)
    /// - `DatabaseError` on persistence failure
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<UpsertOutcome, DomainError>;
}
