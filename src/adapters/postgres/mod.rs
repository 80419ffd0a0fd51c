//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresSubscriptionStore` - Subscription records with version-column compare-and-set
//! - `PostgresWebhookEventRepository` - Processed-event ledger
//!
//! Schema lives in `migrations/` and is applied at startup.

mod subscription_store;
mod webhook_event_repository;

pub use subscription_store::PostgresSubscriptionStore;
pub use webhook_event_repository::PostgresWebhookEventRepository;
