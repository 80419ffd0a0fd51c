//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/webhook` - Payment-provider webhooks
//! - `POST /api/check-out-session` - Hosted checkout redirect
//! - `POST /api/create-portal-session` - Billing portal redirect

pub mod dto;
mod handlers;
mod routes;

pub use handlers::{BillingApiError, BillingAppState, SIGNATURE_HEADER};
pub use routes::billing_router;
