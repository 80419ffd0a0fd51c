//! In-memory subscription store.
//!
//! Backs development runs without a database and the test suites.
//! Compare-and-set and customer ownership are enforced under a single
//! write lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::subscription::SubscriptionRecord;
use crate::ports::{SubscriptionStore, UpsertOutcome};

/// In-memory storage for subscription records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    records: Arc<RwLock<HashMap<UserId, SubscriptionRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `DatabaseError` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::database("subscription store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_available()?;
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.subscription_id.as_ref() == Some(subscription_id))
            .cloned())
    }

    async fn upsert(&self, record: &SubscriptionRecord) -> Result<UpsertOutcome, DomainError> {
        self.check_available()?;
        record.check_invariants()?;

        let mut records = self.records.write().await;
        let stored_version = records.get(&record.user_id).map(|r| r.version).unwrap_or(0);
        if stored_version != record.version {
            return Ok(UpsertOutcome::Conflict);
        }
        if let Some(customer_id) = &record.customer_id {
            let taken = records.values().any(|other| {
                other.user_id != record.user_id && other.customer_id.as_ref() == Some(customer_id)
            });
            if taken {
                return Ok(UpsertOutcome::CustomerTaken);
            }
        }

        let version = stored_version + 1;
        let mut stored = record.clone();
        stored.version = version;
        records.insert(record.user_id.clone(), stored);
        Ok(UpsertOutcome::Written { version })
    }
}
