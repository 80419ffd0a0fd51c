//! WebhookEventRepository port - Ledger of processed Stripe webhook events.
//!
//! Stripe may deliver the same event many times (timeouts, 5xx responses,
//! acknowledgements lost in transit). A delivery first claims its event id;
//! only the claim holder may apply the event, and it settles the claim with
//! the final outcome. Retryable failures release the claim.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

/// Final outcome of processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A state transition was written.
    Applied,
    /// Acknowledged without a state change (unrecognised or unmodeled).
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(WebhookOutcome::Applied),
            "ignored" => Some(WebhookOutcome::Ignored),
            _ => None,
        }
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: EventId,

    /// Type of Stripe event (e.g., "checkout.session.completed").
    pub event_type: String,

    pub outcome: WebhookOutcome,

    /// Why the event was ignored, if it was.
    pub reason: Option<String>,

    pub processed_at: Timestamp,
}

impl WebhookEventRecord {
    /// Creates a record for an event that changed state.
    pub fn applied(event_id: EventId, event_type: impl Into<String>) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            outcome: WebhookOutcome::Applied,
            reason: None,
            processed_at: Timestamp::now(),
        }
    }

    /// Creates a record for an acknowledged no-op.
    pub fn ignored(
        event_id: EventId,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            outcome: WebhookOutcome::Ignored,
            reason: Some(reason.into()),
            processed_at: Timestamp::now(),
        }
    }
}

/// Result of claiming an event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    /// This delivery owns the event and must settle or release it.
    Claimed,
    /// Another delivery holds an unexpired claim.
    InFlight,
    /// The event already has a final outcome.
    Settled(WebhookEventRecord),
}

/// Port for the processed-event ledger.
///
/// Implementations must make `claim` atomic per `event_id` (a uniqueness
/// constraint or a single lock), so concurrent deliveries of one event see
/// exactly one `Claimed`.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a settled event by its Stripe event ID. Pending claims are not
    /// returned.
    async fn find_by_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Claim `event_id` for processing.
    ///
    /// A pending claim older than `lease` is taken over.
    async fn claim(
        &self,
        event_id: &EventId,
        event_type: &str,
        lease: Duration,
    ) -> Result<ClaimResult, DomainError>;

    /// Record the final outcome, replacing the pending claim.
    async fn settle(&self, record: WebhookEventRecord) -> Result<(), DomainError>;

    /// Drop a pending claim so a redelivery can process the event.
    /// Settled records are left untouched.
    async fn release(&self, event_id: &EventId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evt(id: &str) -> EventId {
        EventId::new(id).unwrap()
    }

    #[test]
    fn webhook_event_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn WebhookEventRepository) {}
    }

    #[test]
    fn applied_record_has_no_reason() {
        let record = WebhookEventRecord::applied(evt("evt_123"), "checkout.session.completed");

        assert_eq!(record.event_id, evt("evt_123"));
        assert_eq!(record.outcome, WebhookOutcome::Applied);
        assert!(record.reason.is_none());
    }

    #[test]
    fn ignored_record_includes_reason() {
        let record = WebhookEventRecord::ignored(evt("evt_456"), "customer.created", "unrecognized");

        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert_eq!(record.reason, Some("unrecognized".to_string()));
    }

    #[test]
    fn outcome_strings_parse_back() {
        for outcome in [WebhookOutcome::Applied, WebhookOutcome::Ignored] {
            assert_eq!(WebhookOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(WebhookOutcome::parse("failed"), None);
    }
}
