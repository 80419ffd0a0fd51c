//! Maps verified Stripe events onto [`DomainEvent`]s.
//!
//! The only place raw payloads are inspected. A recognised type whose
//! object is missing a required field is `MalformedEvent`; an unknown type
//! is `Unrecognized` and not an error.

use crate::domain::foundation::{CustomerId, SubscriptionId, UserId};

use super::stripe_event::{
    CheckoutSessionObject, InvoiceObject, StripeEvent, StripeEventType, SubscriptionObject,
    USER_ID_METADATA_KEY,
};
use super::{DomainEvent, WebhookError};

/// Classifies a verified event.
///
/// # Errors
///
/// `MalformedEvent` when a recognised event lacks a required field or the
/// object does not decode.
pub fn classify(event: &StripeEvent) -> Result<DomainEvent, WebhookError> {
    match event.parsed_type() {
        StripeEventType::CheckoutSessionCompleted => classify_checkout(event),
        StripeEventType::InvoicePaid => {
            Ok(invoice_subscription(event)?
                .map(|subscription_id| DomainEvent::SubscriptionRenewed { subscription_id })
                .unwrap_or_else(|| unrecognized(event)))
        }
        StripeEventType::InvoicePaymentFailed => {
            Ok(invoice_subscription(event)?
                .map(|subscription_id| DomainEvent::PaymentFailed { subscription_id })
                .unwrap_or_else(|| unrecognized(event)))
        }
        StripeEventType::CustomerSubscriptionDeleted => {
            let subscription: SubscriptionObject = decode(event)?;
            Ok(DomainEvent::SubscriptionCancelled {
                subscription_id: required(SubscriptionId::new(subscription.id), "subscription.id")?,
            })
        }
        StripeEventType::Unknown => Ok(unrecognized(event)),
    }
}

fn classify_checkout(event: &StripeEvent) -> Result<DomainEvent, WebhookError> {
    let session: CheckoutSessionObject = decode(event)?;

    // One-time payments and setup sessions never create a subscription.
    if let Some(mode) = session.mode.as_deref() {
        if mode != "subscription" {
            return Ok(unrecognized(event));
        }
    }

    let user_id = session
        .metadata_value(USER_ID_METADATA_KEY)
        .ok_or_else(|| malformed("checkout session missing metadata.userId"))?;
    let subscription = session
        .subscription
        .as_ref()
        .ok_or_else(|| malformed("checkout session missing subscription"))?;
    let customer = session
        .customer
        .as_ref()
        .ok_or_else(|| malformed("checkout session missing customer"))?;

    Ok(DomainEvent::SubscriptionStarted {
        user_id: required(UserId::new(user_id), "metadata.userId")?,
        subscription_id: required(SubscriptionId::new(subscription.id()), "subscription")?,
        customer_id: required(CustomerId::new(customer.id()), "customer")?,
    })
}

/// `Ok(None)` for invoices that bill no subscription (one-off invoices).
fn invoice_subscription(event: &StripeEvent) -> Result<Option<SubscriptionId>, WebhookError> {
    let invoice: InvoiceObject = decode(event)?;
    invoice
        .subscription_ref()
        .map(|id| required(SubscriptionId::new(id), "invoice subscription"))
        .transpose()
}

fn decode<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> Result<T, WebhookError> {
    event.deserialize_object().map_err(|e| {
        WebhookError::MalformedEvent(format!("{} object: {}", event.event_type, e))
    })
}

fn required<T, E>(value: Result<T, E>, field: &str) -> Result<T, WebhookError> {
    value.map_err(|_| malformed(&format!("empty {}", field)))
}

fn malformed(reason: &str) -> WebhookError {
    WebhookError::MalformedEvent(reason.to_string())
}

fn unrecognized(event: &StripeEvent) -> DomainEvent {
    DomainEvent::Unrecognized {
        type_tag: event.event_type.clone(),
    }
}
