//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-memory store and ledger (development, tests)
//! - `postgres` - PostgreSQL store and ledger
//! - `stripe` - Stripe API client and mock provider
//! - `http` - Axum routes

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
