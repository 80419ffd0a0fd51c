//! Subscription Billing - Payment-provider webhook processor
//!
//! Authenticates Stripe webhook deliveries, classifies them into a closed set
//! of billing events and mirrors the resulting subscription state onto one
//! record per user. Also opens hosted checkout and billing portal sessions.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
