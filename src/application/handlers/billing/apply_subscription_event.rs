//! ApplySubscriptionEventHandler - Applies a classified billing event to the
//! affected subscription record.
//!
//! Reads the current record, asks [`decide`] for the next state and writes it
//! with a compare-and-set. A lost race re-reads and decides again, so a
//! concurrent duplicate delivery resolves to [`ApplyOutcome::Duplicate`].

use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventId, Timestamp, UserId};
use crate::domain::subscription::{
    decide, DomainEvent, RecordKey, SubscriptionRecord, SubscriptionStatus, Transition,
    WebhookError,
};
use crate::ports::{SubscriptionStore, UpsertOutcome};

/// Compare-and-set attempts before giving up with a retryable failure.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Command to apply one classified event.
#[derive(Debug, Clone)]
pub struct ApplySubscriptionEventCommand {
    /// Provider event id, recorded as the record's `last_event_id`.
    pub event_id: EventId,
    pub event: DomainEvent,
}

/// What happened to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record moved to `status`.
    Applied {
        user_id: UserId,
        status: SubscriptionStatus,
        version: i64,
    },
    /// The record already carries this event.
    Duplicate,
    /// Acknowledged without a write.
    Ignored { reason: String },
}

/// Handler implementing the transition table against the store.
pub struct ApplySubscriptionEventHandler {
    store: Arc<dyn SubscriptionStore>,
    max_attempts: u32,
}

impl ApplySubscriptionEventHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the compare-and-set attempt budget (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn handle(
        &self,
        cmd: ApplySubscriptionEventCommand,
    ) -> Result<ApplyOutcome, WebhookError> {
        let Some(key) = cmd.event.record_key() else {
            let reason = match &cmd.event {
                DomainEvent::Unrecognized { type_tag } => {
                    format!("unrecognized event type {}", type_tag)
                }
                other => format!("{} does not address a record", other.kind()),
            };
            tracing::debug!(event_id = %cmd.event_id, reason = %reason, "Event ignored");
            return Ok(ApplyOutcome::Ignored { reason });
        };

        for attempt in 1..=self.max_attempts {
            let current = self.load(&key).await?;

            match decide(current.as_ref(), &cmd.event_id, &cmd.event, Timestamp::now()) {
                Transition::Duplicate => {
                    tracing::debug!(
                        event_id = %cmd.event_id,
                        event_kind = cmd.event.kind(),
                        "Event already applied to record"
                    );
                    return Ok(ApplyOutcome::Duplicate);
                }
                Transition::NoOp => {
                    return Ok(ApplyOutcome::Ignored {
                        reason: format!("{} leaves state unchanged", cmd.event.kind()),
                    });
                }
                Transition::Unmodeled { reason } => {
                    tracing::info!(
                        event_id = %cmd.event_id,
                        event_kind = cmd.event.kind(),
                        status = current.as_ref().map(|r| r.status.as_str()).unwrap_or("absent"),
                        reason = %reason,
                        "Unmodeled transition ignored"
                    );
                    return Ok(ApplyOutcome::Ignored { reason });
                }
                Transition::Apply(next) => {
                    match self.store.upsert(&next).await.map_err(store_failure)? {
                        UpsertOutcome::Written { version } => {
                            tracing::info!(
                                event_id = %cmd.event_id,
                                event_kind = cmd.event.kind(),
                                user_id = %next.user_id,
                                subscription_id = ?next.subscription_id.as_ref().map(|s| s.as_str()),
                                status = next.status.as_str(),
                                version,
                                "Subscription transition applied"
                            );
                            return Ok(ApplyOutcome::Applied {
                                user_id: next.user_id,
                                status: next.status,
                                version,
                            });
                        }
                        UpsertOutcome::CustomerTaken => {
                            let reason = format!(
                                "customer {} already belongs to another user",
                                next.customer_id.as_ref().map(|c| c.as_str()).unwrap_or("?")
                            );
                            tracing::warn!(
                                event_id = %cmd.event_id,
                                event_kind = cmd.event.kind(),
                                user_id = %next.user_id,
                                reason = %reason,
                                "Customer reassignment rejected"
                            );
                            return Ok(ApplyOutcome::Ignored { reason });
                        }
                        UpsertOutcome::Conflict => {
                            tracing::debug!(
                                event_id = %cmd.event_id,
                                user_id = %next.user_id,
                                attempt,
                                "Concurrent write on subscription record, retrying"
                            );
                        }
                    }
                }
            }
        }

        tracing::error!(
            event_id = %cmd.event_id,
            attempts = self.max_attempts,
            "Subscription record contention not resolved"
        );
        Err(WebhookError::TransientStoreFailure(format!(
            "write contention not resolved after {} attempts",
            self.max_attempts
        )))
    }

    async fn load(&self, key: &RecordKey<'_>) -> Result<Option<SubscriptionRecord>, WebhookError> {
        let result = match key {
            RecordKey::User(user_id) => self.store.get(user_id).await,
            RecordKey::Subscription(subscription_id) => {
                self.store.find_by_subscription_id(subscription_id).await
            }
        };
        result.map_err(|err| {
            tracing::error!(error = %err, "Subscription store read failed");
            WebhookError::TransientStoreFailure(err.to_string())
        })
    }
}

fn store_failure(err: DomainError) -> WebhookError {
    tracing::error!(error = %err, code = %err.code, "Subscription store write failed");
    WebhookError::from(err)
}
