//! HandleWebhookHandler - Processes one inbound payment-provider webhook.
//!
//! Verify → livemode check → ledger claim → classify → apply → settle.
//! Verification and classification failures never reach the store. Only the
//! delivery holding the claim on an event id may apply it, so an event is
//! applied at most once even when redelivered after newer events.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::EventId;
use crate::domain::subscription::{classify, StripeWebhookVerifier, WebhookError};
use crate::ports::{
    ClaimResult, SubscriptionStore, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};

use super::apply_subscription_event::{
    ApplyOutcome, ApplySubscriptionEventCommand, ApplySubscriptionEventHandler,
};

/// How long a pending claim blocks other deliveries of the same event.
/// Longer than the request timeout, so only a crashed worker's claim expires.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(120);

/// Command to handle a webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleWebhookCommand {
    /// Raw request body, byte-exact.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value, if present.
    pub signature: Option<String>,
}

/// Result of webhook processing. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleWebhookResult {
    /// The event went through the applier.
    Processed { event_id: EventId, outcome: ApplyOutcome },
    /// The ledger already holds this event.
    AlreadyProcessed {
        event_id: EventId,
        outcome: WebhookOutcome,
    },
}

/// Handler orchestrating verifier, classifier and applier.
pub struct HandleWebhookHandler {
    verifier: StripeWebhookVerifier,
    applier: ApplySubscriptionEventHandler,
    ledger: Arc<dyn WebhookEventRepository>,
    require_livemode: bool,
    claim_lease: Duration,
}

impl HandleWebhookHandler {
    pub fn new(
        verifier: StripeWebhookVerifier,
        store: Arc<dyn SubscriptionStore>,
        ledger: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        Self {
            verifier,
            applier: ApplySubscriptionEventHandler::new(store),
            ledger,
            require_livemode: false,
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    /// Reject events created in test mode.
    pub fn with_livemode_required(mut self, require_livemode: bool) -> Self {
        self.require_livemode = require_livemode;
        self
    }

    pub async fn handle(
        &self,
        cmd: HandleWebhookCommand,
    ) -> Result<HandleWebhookResult, WebhookError> {
        // 1. Verify signature and parse the envelope
        let event = self
            .verifier
            .verify(&cmd.payload, cmd.signature.as_deref())
            .map_err(|err| {
                tracing::warn!(error = %err, "Webhook verification failed");
                err
            })?;

        let event_id = EventId::new(event.id.as_str()).map_err(|_| {
            tracing::warn!(event_type = %event.event_type, "Webhook event has no id");
            WebhookError::MalformedEvent("event id is empty".to_string())
        })?;

        if self.require_livemode && !event.livemode {
            tracing::warn!(
                event_id = %event_id,
                event_type = %event.event_type,
                "Test-mode event rejected"
            );
            return Err(WebhookError::MalformedEvent(
                "test-mode event not accepted".to_string(),
            ));
        }

        // 2. Claim the event id; settled events are acknowledged as-is
        let claim = self
            .ledger
            .claim(&event_id, &event.event_type, self.claim_lease)
            .await
            .map_err(|err| {
                tracing::error!(event_id = %event_id, error = %err, "Webhook ledger claim failed");
                WebhookError::TransientStoreFailure(err.to_string())
            })?;
        match claim {
            ClaimResult::Claimed => {}
            ClaimResult::InFlight => {
                tracing::info!(
                    event_id = %event_id,
                    event_type = %event.event_type,
                    "Webhook event already in flight"
                );
                return Err(WebhookError::EventInFlight(event_id.to_string()));
            }
            ClaimResult::Settled(prior) => {
                tracing::debug!(
                    event_id = %event_id,
                    event_type = %event.event_type,
                    outcome = prior.outcome.as_str(),
                    "Duplicate webhook delivery acknowledged"
                );
                return Ok(HandleWebhookResult::AlreadyProcessed {
                    event_id,
                    outcome: prior.outcome,
                });
            }
        }

        // 3. Classify
        let domain_event = match classify(&event) {
            Ok(domain_event) => domain_event,
            Err(err) => {
                tracing::warn!(
                    event_id = %event_id,
                    event_type = %event.event_type,
                    error = %err,
                    "Malformed webhook event"
                );
                self.release(&event_id).await;
                return Err(err);
            }
        };

        // 4. Apply
        let outcome = match self
            .applier
            .handle(ApplySubscriptionEventCommand {
                event_id: event_id.clone(),
                event: domain_event,
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.release(&event_id).await;
                return Err(err);
            }
        };

        // 5. Settle the claim
        let entry = match &outcome {
            ApplyOutcome::Applied { .. } | ApplyOutcome::Duplicate => {
                WebhookEventRecord::applied(event_id.clone(), event.event_type.as_str())
            }
            ApplyOutcome::Ignored { reason } => {
                WebhookEventRecord::ignored(event_id.clone(), event.event_type.as_str(), reason)
            }
        };
        // The record write already landed; the pending claim keeps blocking
        // redeliveries until its lease runs out.
        if let Err(err) = self.ledger.settle(entry).await {
            tracing::error!(event_id = %event_id, error = %err, "Webhook ledger settle failed");
        }

        Ok(HandleWebhookResult::Processed { event_id, outcome })
    }

    async fn release(&self, event_id: &EventId) {
        if let Err(err) = self.ledger.release(event_id).await {
            tracing::error!(event_id = %event_id, error = %err, "Webhook ledger release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryWebhookEventRepository};
    use crate::domain::foundation::UserId;
    use crate::domain::foundation::DomainError;
    use crate::domain::subscription::{compute_test_signature, SubscriptionStatus};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    const TEST_SECRET: &str = "whsec_test_secret";

    struct Harness {
        handler: HandleWebhookHandler,
        store: InMemorySubscriptionStore,
        ledger: InMemoryWebhookEventRepository,
    }

    fn harness() -> Harness {
        let store = InMemorySubscriptionStore::new();
        let ledger = InMemoryWebhookEventRepository::new();
        let verifier = StripeWebhookVerifier::new(Some(SecretString::new(TEST_SECRET.to_string())));
        let handler =
            HandleWebhookHandler::new(verifier, Arc::new(store.clone()), Arc::new(ledger.clone()));
        Harness {
            handler,
            store,
            ledger,
        }
    }

    fn signed(payload: &serde_json::Value) -> HandleWebhookCommand {
        let body = payload.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature(TEST_SECRET, timestamp, &body);
        HandleWebhookCommand {
            payload: body.into_bytes(),
            signature: Some(format!("t={},v1={}", timestamp, signature)),
        }
    }

    fn checkout_completed(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "checkout.session.completed",
            "created": 1704067200,
            "livemode": false,
            "data": { "object": {
                "id": "cs_1",
                "mode": "subscription",
                "metadata": { "userId": "u1" },
                "customer": "cus_1",
                "subscription": "sub_1"
            }}
        })
    }

    fn invoice(id: &str, event_type: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": event_type,
            "created": 1704067200,
            "livemode": false,
            "data": { "object": { "id": "in_1", "subscription": "sub_1" } }
        })
    }

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn evt(id: &str) -> EventId {
        EventId::new(id).unwrap()
    }

    async fn status(h: &Harness) -> SubscriptionStatus {
        h.store.get(&user()).await.unwrap().unwrap().status
    }

    /// Ledger whose settle step can be made to fail.
    #[derive(Clone, Default)]
    struct FailingSettleLedger {
        inner: InMemoryWebhookEventRepository,
        fail_settle: Arc<AtomicBool>,
    }

    #[async_trait]
    impl WebhookEventRepository for FailingSettleLedger {
        async fn find_by_event_id(
            &self,
            event_id: &EventId,
        ) -> Result<Option<WebhookEventRecord>, DomainError> {
            self.inner.find_by_event_id(event_id).await
        }

        async fn claim(
            &self,
            event_id: &EventId,
            event_type: &str,
            lease: Duration,
        ) -> Result<ClaimResult, DomainError> {
            self.inner.claim(event_id, event_type, lease).await
        }

        async fn settle(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
            if self.fail_settle.load(Ordering::SeqCst) {
                return Err(DomainError::database("ledger unavailable"));
            }
            self.inner.settle(record).await
        }

        async fn release(&self, event_id: &EventId) -> Result<(), DomainError> {
            self.inner.release(event_id).await
        }
    }

    #[tokio::test]
    async fn checkout_completed_activates_and_records_ledger() {
        let h = harness();

        let result = h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap();

        assert!(matches!(
            result,
            HandleWebhookResult::Processed {
                outcome: ApplyOutcome::Applied { status: SubscriptionStatus::Active, .. },
                ..
            }
        ));
        let record = h.store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        let entry = h
            .ledger
            .find_by_event_id(&EventId::new("evt_1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.outcome, WebhookOutcome::Applied);
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged_from_ledger() {
        let h = harness();
        h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap();
        h.store.set_unavailable(true);

        let result = h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap();

        assert_eq!(
            result,
            HandleWebhookResult::AlreadyProcessed {
                event_id: EventId::new("evt_1").unwrap(),
                outcome: WebhookOutcome::Applied,
            }
        );
    }

    #[tokio::test]
    async fn unrecognized_event_is_ignored_and_recorded() {
        let h = harness();
        let payload = json!({
            "id": "evt_9",
            "type": "customer.created",
            "created": 1704067200,
            "data": { "object": { "id": "cus_1" } }
        });

        let result = h.handler.handle(signed(&payload)).await.unwrap();

        assert!(matches!(
            result,
            HandleWebhookResult::Processed { outcome: ApplyOutcome::Ignored { .. }, .. }
        ));
        assert!(h.store.is_empty().await);
        assert_eq!(h.ledger.len().await, 1);
    }

    #[tokio::test]
    async fn tampered_payload_never_reaches_store() {
        let h = harness();
        let mut cmd = signed(&checkout_completed("evt_1"));
        cmd.payload = checkout_completed("evt_1")
            .to_string()
            .replace("u1", "u2")
            .into_bytes();

        let err = h.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature));
        assert!(h.store.is_empty().await);
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn missing_signature_is_missing_credentials() {
        let h = harness();
        let mut cmd = signed(&checkout_completed("evt_1"));
        cmd.signature = None;

        let err = h.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, WebhookError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn checkout_without_user_metadata_is_malformed() {
        let h = harness();
        let mut payload = checkout_completed("evt_1");
        payload["data"]["object"]["metadata"] = json!({});

        let err = h.handler.handle(signed(&payload)).await.unwrap_err();

        assert!(matches!(err, WebhookError::MalformedEvent(_)));
        assert!(h.store.is_empty().await);
        assert!(h.ledger.is_empty().await);
        assert!(!h.ledger.is_pending(&evt("evt_1")).await);
    }

    #[tokio::test]
    async fn older_event_redelivered_after_newer_ones_is_not_reapplied() {
        let h = harness();
        h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap();
        h.handler
            .handle(signed(&invoice("evt_2", "invoice.payment_failed")))
            .await
            .unwrap();
        h.handler.handle(signed(&invoice("evt_3", "invoice.paid"))).await.unwrap();
        assert_eq!(status(&h).await, SubscriptionStatus::Active);

        let result = h
            .handler
            .handle(signed(&invoice("evt_2", "invoice.payment_failed")))
            .await
            .unwrap();

        assert_eq!(
            result,
            HandleWebhookResult::AlreadyProcessed {
                event_id: evt("evt_2"),
                outcome: WebhookOutcome::Applied,
            }
        );
        assert_eq!(status(&h).await, SubscriptionStatus::Active);
        assert_eq!(h.store.get(&user()).await.unwrap().unwrap().version, 3);
    }

    #[tokio::test]
    async fn delivery_of_an_in_flight_event_is_retryable_and_skips_store() {
        let h = harness();
        h.ledger
            .claim(&evt("evt_1"), "checkout.session.completed", DEFAULT_CLAIM_LEASE)
            .await
            .unwrap();

        let err = h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap_err();

        assert!(matches!(err, WebhookError::EventInFlight(_)));
        assert!(err.is_retryable());
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn failed_settle_still_blocks_stale_redelivery() {
        let store = InMemorySubscriptionStore::new();
        let ledger = FailingSettleLedger::default();
        let verifier = StripeWebhookVerifier::new(Some(SecretString::new(TEST_SECRET.to_string())));
        let handler =
            HandleWebhookHandler::new(verifier, Arc::new(store.clone()), Arc::new(ledger.clone()));
        handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap();

        ledger.fail_settle.store(true, Ordering::SeqCst);
        let result = handler
            .handle(signed(&invoice("evt_2", "invoice.payment_failed")))
            .await
            .unwrap();
        assert!(matches!(result, HandleWebhookResult::Processed { .. }));
        ledger.fail_settle.store(false, Ordering::SeqCst);
        handler.handle(signed(&invoice("evt_3", "invoice.paid"))).await.unwrap();

        let err = handler
            .handle(signed(&invoice("evt_2", "invoice.payment_failed")))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::EventInFlight(_)));
        let record = store.get(&user()).await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.last_event_id, Some(evt("evt_3")));
    }

    #[tokio::test]
    async fn livemode_requirement_rejects_test_events() {
        let h = harness();
        let handler = h.handler.with_livemode_required(true);

        let err = handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap_err();

        assert!(matches!(err, WebhookError::MalformedEvent(_)));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn store_outage_is_retryable_and_not_recorded() {
        let h = harness();
        h.store.set_unavailable(true);

        let err = h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(h.ledger.is_empty().await);
        assert!(!h.ledger.is_pending(&evt("evt_1")).await);

        h.store.set_unavailable(false);
        let result = h.handler.handle(signed(&checkout_completed("evt_1"))).await.unwrap();
        assert!(matches!(
            result,
            HandleWebhookResult::Processed { outcome: ApplyOutcome::Applied { .. }, .. }
        ));
    }
}
