//! In-memory processed-event ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::{ClaimResult, WebhookEventRecord, WebhookEventRepository};

#[derive(Debug, Clone)]
enum LedgerEntry {
    Pending { claimed_at: Timestamp },
    Settled(WebhookEventRecord),
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    entries: Arc<RwLock<HashMap<EventId, LedgerEntry>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of settled events.
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| matches!(e, LedgerEntry::Settled(_)))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns true if a delivery currently holds a claim on `event_id`.
    pub async fn is_pending(&self, event_id: &EventId) -> bool {
        matches!(
            self.entries.read().await.get(event_id),
            Some(LedgerEntry::Pending { .. })
        )
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let entries = self.entries.read().await;
        Ok(match entries.get(event_id) {
            Some(LedgerEntry::Settled(record)) => Some(record.clone()),
            _ => None,
        })
    }

    async fn claim(
        &self,
        event_id: &EventId,
        _event_type: &str,
        lease: Duration,
    ) -> Result<ClaimResult, DomainError> {
        let mut entries = self.entries.write().await;
        let now = Timestamp::now();

        match entries.get(event_id) {
            Some(LedgerEntry::Settled(record)) => return Ok(ClaimResult::Settled(record.clone())),
            Some(LedgerEntry::Pending { claimed_at }) => {
                let held = now
                    .duration_since(claimed_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if held < lease {
                    return Ok(ClaimResult::InFlight);
                }
            }
            None => {}
        }

        entries.insert(event_id.clone(), LedgerEntry::Pending { claimed_at: now });
        Ok(ClaimResult::Claimed)
    }

    async fn settle(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        if !matches!(entries.get(&record.event_id), Some(LedgerEntry::Settled(_))) {
            entries.insert(record.event_id.clone(), LedgerEntry::Settled(record));
        }
        Ok(())
    }

    async fn release(&self, event_id: &EventId) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        if matches!(entries.get(event_id), Some(LedgerEntry::Pending { .. })) {
            entries.remove(event_id);
        }
        Ok(())
    }
}
