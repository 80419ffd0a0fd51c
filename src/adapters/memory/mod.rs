//! In-memory adapters for development and tests.

mod subscription_store;
mod webhook_event_repository;

pub use subscription_store::InMemorySubscriptionStore;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
