//! Webhook error types.
//!
//! Every failure the webhook pipeline can surface, with the HTTP status the
//! provider sees and whether a redelivery could succeed.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header absent, or no signing secret configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// Signature header malformed or no signature matched.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature timestamp older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signature timestamp in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Authentic payload whose shape does not match its declared type.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Store unavailable or contention not resolved; safe to redeliver.
    #[error("Transient store failure: {0}")]
    TransientStoreFailure(String),

    /// Another delivery of the same event is still being processed.
    #[error("Event {0} is already being processed")]
    EventInFlight(String),
}

impl WebhookError {
    /// Returns true if redelivering the same event could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::TransientStoreFailure(_) | WebhookError::EventInFlight(_)
        )
    }

    /// Returns true if the error is an authentication failure.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingCredentials(_)
                | WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
        )
    }

    /// Maps the error to the status returned to the provider.
    ///
    /// The provider redelivers on any non-2xx, so only faults on our side
    /// are 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingCredentials(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::MalformedEvent(_) => StatusCode::BAD_REQUEST,

            WebhookError::EventInFlight(_) => StatusCode::CONFLICT,

            WebhookError::TransientStoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => WebhookError::MalformedEvent(err.message),
            _ => WebhookError::TransientStoreFailure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Error Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn missing_credentials_names_what_is_missing() {
        let err = WebhookError::MissingCredentials("signature header");
        assert_eq!(format!("{}", err), "Missing credentials: signature header");
    }

    #[test]
    fn invalid_signature_displays_correctly() {
        assert_eq!(format!("{}", WebhookError::InvalidSignature), "Invalid signature");
    }

    #[test]
    fn malformed_event_displays_reason() {
        let err = WebhookError::MalformedEvent("missing metadata.userId".to_string());
        assert_eq!(format!("{}", err), "Malformed event: missing metadata.userId");
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn only_store_failures_and_in_flight_events_are_retryable() {
        assert!(WebhookError::TransientStoreFailure("timeout".to_string()).is_retryable());
        assert!(WebhookError::EventInFlight("evt_1".to_string()).is_retryable());
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::MissingCredentials("signing secret").is_retryable());
        assert!(!WebhookError::MalformedEvent("bad".to_string()).is_retryable());
        assert!(!WebhookError::TimestampOutOfRange.is_retryable());
    }

    #[test]
    fn verification_failures_are_flagged() {
        assert!(WebhookError::InvalidSignature.is_verification_failure());
        assert!(WebhookError::InvalidTimestamp.is_verification_failure());
        assert!(!WebhookError::MalformedEvent("x".to_string()).is_verification_failure());
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn rejections_return_bad_request() {
        for err in [
            WebhookError::MissingCredentials("signature header"),
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
            WebhookError::MalformedEvent("bad".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{:?}", err);
        }
    }

    #[test]
    fn in_flight_event_returns_conflict() {
        let err = WebhookError::EventInFlight("evt_1".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_failure_returns_internal_server_error() {
        let err = WebhookError::TransientStoreFailure("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ══════════════════════════════════════════════════════════════
    // Conversion Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn database_domain_error_becomes_transient_failure() {
        let err: WebhookError = DomainError::database("pool timed out").into();
        assert!(matches!(err, WebhookError::TransientStoreFailure(_)));
    }

    #[test]
    fn validation_domain_error_becomes_malformed_event() {
        let err: WebhookError =
            DomainError::new(ErrorCode::ValidationFailed, "Field 'user_id' cannot be empty").into();
        assert!(matches!(err, WebhookError::MalformedEvent(_)));
    }
}
