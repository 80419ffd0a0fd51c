//! Transition rules: current record + classified event → next record.
//!
//! Pure; the applier handles reads, writes and retries around it.

use crate::domain::foundation::{EventId, Timestamp};

use super::{DomainEvent, SubscriptionRecord};

/// What the applier should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Persist this record.
    Apply(SubscriptionRecord),
    /// The event was already applied to the record.
    Duplicate,
    /// The event does not touch subscription state.
    NoOp,
    /// Recognised event, but no edge exists from the current state.
    Unmodeled { reason: String },
}

/// Computes the next state for `event` against `current`.
///
/// `current` is the record found via [`DomainEvent::record_key`], or
/// `None` if the store has none.
pub fn decide(
    current: Option<&SubscriptionRecord>,
    event_id: &EventId,
    event: &DomainEvent,
    at: Timestamp,
) -> Transition {
    if let Some(record) = current {
        if record.has_applied(event_id) {
            return Transition::Duplicate;
        }
    }

    let result = match event {
        DomainEvent::Unrecognized { .. } => return Transition::NoOp,
        DomainEvent::SubscriptionStarted {
            user_id,
            subscription_id,
            customer_id,
        } => {
            let mut next = current
                .cloned()
                .unwrap_or_else(|| SubscriptionRecord::new(user_id.clone()));
            next.start(
                subscription_id.clone(),
                customer_id.clone(),
                event_id.clone(),
                at,
            )
            .map(|_| next)
        }
        DomainEvent::SubscriptionRenewed { subscription_id }
        | DomainEvent::PaymentFailed { subscription_id }
        | DomainEvent::SubscriptionCancelled { subscription_id } => {
            let Some(record) = current else {
                return Transition::Unmodeled {
                    reason: format!("no record holds subscription {}", subscription_id),
                };
            };
            let mut next = record.clone();
            let outcome = match event {
                DomainEvent::SubscriptionRenewed { .. } => next.renew(event_id.clone(), at),
                DomainEvent::PaymentFailed { .. } => next.mark_past_due(event_id.clone(), at),
                _ => next.cancel(event_id.clone(), at),
            };
            outcome.map(|_| next)
        }
    };

    match result {
        Ok(next) => Transition::Apply(next),
        Err(err) => Transition::Unmodeled {
            reason: err.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CustomerId, SubscriptionId, UserId};
    use crate::domain::subscription::{Plan, SubscriptionStatus};
    use proptest::prelude::*;

    fn evt(id: &str) -> EventId {
        EventId::new(id).unwrap()
    }

    fn sub_id() -> SubscriptionId {
        SubscriptionId::new("sub_1").unwrap()
    }

    fn started() -> DomainEvent {
        DomainEvent::SubscriptionStarted {
            user_id: UserId::new("user-1").unwrap(),
            subscription_id: sub_id(),
            customer_id: CustomerId::new("cus_1").unwrap(),
        }
    }

    fn renewed() -> DomainEvent {
        DomainEvent::SubscriptionRenewed {
            subscription_id: sub_id(),
        }
    }

    fn failed() -> DomainEvent {
        DomainEvent::PaymentFailed {
            subscription_id: sub_id(),
        }
    }

    fn cancelled() -> DomainEvent {
        DomainEvent::SubscriptionCancelled {
            subscription_id: sub_id(),
        }
    }

    fn applied(transition: Transition) -> SubscriptionRecord {
        match transition {
            Transition::Apply(record) => record,
            other => panic!("Expected Apply, got {:?}", other),
        }
    }

    fn active() -> SubscriptionRecord {
        applied(decide(None, &evt("evt_start"), &started(), Timestamp::now()))
    }

    // ══════════════════════════════════════════════════════════════
    // Table edges
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn started_without_record_creates_active_pro() {
        let record = active();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.plan, Plan::Pro);
        assert_eq!(record.last_event_id, Some(evt("evt_start")));
    }

    #[test]
    fn renewed_keeps_active_and_refreshes_updated_at() {
        let record = active();
        let later = Timestamp::from_unix_secs(record.updated_at.as_unix_secs() + 3600).unwrap();
        let next = applied(decide(Some(&record), &evt("evt_2"), &renewed(), later));
        assert_eq!(next.status, SubscriptionStatus::Active);
        assert_eq!(next.updated_at, later);
    }

    #[test]
    fn failure_then_renewal_round_trips_through_past_due() {
        let record = active();
        let past_due = applied(decide(Some(&record), &evt("evt_2"), &failed(), Timestamp::now()));
        assert_eq!(past_due.status, SubscriptionStatus::PastDue);

        let recovered = applied(decide(Some(&past_due), &evt("evt_3"), &renewed(), Timestamp::now()));
        assert_eq!(recovered.status, SubscriptionStatus::Active);
    }

    #[test]
    fn cancellation_from_past_due_drops_to_free() {
        let record = active();
        let past_due = applied(decide(Some(&record), &evt("evt_2"), &failed(), Timestamp::now()));
        let ended = applied(decide(Some(&past_due), &evt("evt_3"), &cancelled(), Timestamp::now()));
        assert_eq!(ended.status, SubscriptionStatus::Cancelled);
        assert_eq!(ended.plan, Plan::Free);
    }

    #[test]
    fn unrecognized_is_noop() {
        let event = DomainEvent::Unrecognized {
            type_tag: "customer.created".to_string(),
        };
        assert_eq!(decide(None, &evt("evt_x"), &event, Timestamp::now()), Transition::NoOp);
    }

    // ══════════════════════════════════════════════════════════════
    // Idempotency and ordering
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn same_event_id_is_duplicate() {
        let record = active();
        assert_eq!(
            decide(Some(&record), &evt("evt_start"), &started(), Timestamp::now()),
            Transition::Duplicate
        );
    }

    #[test]
    fn renewal_before_start_is_unmodeled() {
        let result = decide(None, &evt("evt_r"), &renewed(), Timestamp::now());
        assert!(matches!(result, Transition::Unmodeled { .. }));
    }

    #[test]
    fn second_failure_while_past_due_is_unmodeled() {
        let record = active();
        let past_due = applied(decide(Some(&record), &evt("evt_2"), &failed(), Timestamp::now()));
        let result = decide(Some(&past_due), &evt("evt_3"), &failed(), Timestamp::now());
        assert!(matches!(result, Transition::Unmodeled { .. }));
    }

    #[test]
    fn renewal_after_cancel_is_unmodeled() {
        let record = active();
        let ended = applied(decide(Some(&record), &evt("evt_2"), &cancelled(), Timestamp::now()));
        let result = decide(Some(&ended), &evt("evt_3"), &renewed(), Timestamp::now());
        assert!(matches!(result, Transition::Unmodeled { .. }));
    }

    #[test]
    fn start_while_active_is_unmodeled() {
        let record = active();
        let result = decide(Some(&record), &evt("evt_2"), &started(), Timestamp::now());
        assert!(matches!(result, Transition::Unmodeled { .. }));
    }

    #[test]
    fn unmodeled_never_mutates_input() {
        let record = active();
        let before = record.clone();
        let _ = decide(Some(&record), &evt("evt_2"), &started(), Timestamp::now());
        assert_eq!(record, before);
    }

    fn arb_event() -> impl Strategy<Value = DomainEvent> {
        prop_oneof![
            Just(started()),
            Just(renewed()),
            Just(failed()),
            Just(cancelled()),
        ]
    }

    proptest! {
        #[test]
        fn replaying_each_event_is_idempotent(events in prop::collection::vec(arb_event(), 1..12)) {
            let mut once: Option<SubscriptionRecord> = None;
            let mut twice: Option<SubscriptionRecord> = None;
            let at = Timestamp::now();

            for (i, event) in events.iter().enumerate() {
                let id = evt(&format!("evt_{}", i));

                if let Transition::Apply(next) = decide(once.as_ref(), &id, event, at) {
                    once = Some(next);
                }

                for _ in 0..2 {
                    if let Transition::Apply(next) = decide(twice.as_ref(), &id, event, at) {
                        twice = Some(next);
                    }
                }
            }

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn applied_records_satisfy_invariants(events in prop::collection::vec(arb_event(), 1..12)) {
            let mut current: Option<SubscriptionRecord> = None;
            for (i, event) in events.iter().enumerate() {
                let id = evt(&format!("evt_{}", i));
                if let Transition::Apply(next) = decide(current.as_ref(), &id, event, Timestamp::now()) {
                    prop_assert!(next.check_invariants().is_ok());
                    current = Some(next);
                }
            }
        }
    }
}
