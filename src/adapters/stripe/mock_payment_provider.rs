//! Mock payment provider for testing and local development.
//!
//! Returns deterministic sessions unless told otherwise, records every call
//! and supports error injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::foundation::CustomerId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider, PortalSession,
};

/// Mock payment provider.
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.set_method_error("create_checkout_session", PaymentError::network("down"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_checkout: Option<CheckoutSession>,
    next_portal: Option<PortalSession>,
    next_error: Option<PaymentError>,
    method_errors: HashMap<String, PaymentError>,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the checkout session to return.
    pub fn set_checkout_session(&self, session: CheckoutSession) {
        self.state().next_checkout = Some(session);
    }

    /// Set the portal session to return.
    pub fn set_portal_session(&self, session: PortalSession) {
        self.state().next_portal = Some(session);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.user_id.to_string(),
                request.price_id.clone(),
                request.success_url.clone(),
                request.cancel_url.clone(),
                request.idempotency_key.clone().unwrap_or_default(),
            ],
        );
        self.check_error("create_checkout_session")?;

        let session = self.state().next_checkout.take();
        Ok(session.unwrap_or_else(|| CheckoutSession {
            id: format!("cs_mock_{}", request.user_id),
            url: format!("https://checkout.stripe.test/c/pay/cs_mock_{}", request.user_id),
            expires_at: Some(chrono::Utc::now().timestamp() + 24 * 60 * 60),
        }))
    }

    async fn create_portal_session(
        &self,
        customer_id: &CustomerId,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.record_call(
            "create_portal_session",
            vec![customer_id.to_string(), return_url.to_string()],
        );
        self.check_error("create_portal_session")?;

        let session = self.state().next_portal.take();
        Ok(session.unwrap_or_else(|| PortalSession {
            id: format!("bps_mock_{}", customer_id),
            url: format!("https://billing.stripe.test/p/session/{}", customer_id),
        }))
    }
}
