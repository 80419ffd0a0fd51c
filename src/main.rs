//! Subscription billing service binary.
//!
//! Loads configuration, initialises tracing, selects the storage backend and
//! serves the billing router until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subscription_billing::adapters::http::{billing_router, BillingAppState};
use subscription_billing::adapters::memory::{
    InMemorySubscriptionStore, InMemoryWebhookEventRepository,
};
use subscription_billing::adapters::postgres::{
    PostgresSubscriptionStore, PostgresWebhookEventRepository,
};
use subscription_billing::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use subscription_billing::config::{AppConfig, DatabaseConfig, ServerConfig};
use subscription_billing::domain::subscription::StripeWebhookVerifier;
use subscription_billing::ports::{SubscriptionStore, WebhookEventRepository};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);

    let (subscription_store, webhook_events) = match &config.database {
        Some(database) => connect_postgres(database).await?,
        None => {
            tracing::warn!("No database configured; subscription state is kept in memory");
            let store: Arc<dyn SubscriptionStore> = Arc::new(InMemorySubscriptionStore::new());
            let ledger: Arc<dyn WebhookEventRepository> =
                Arc::new(InMemoryWebhookEventRepository::new());
            (store, ledger)
        }
    };

    let payment = &config.payment;
    if payment.is_test_mode() {
        tracing::info!("Stripe API key is in test mode");
    }

    let state = BillingAppState {
        subscription_store,
        webhook_events,
        payment_provider: Arc::new(StripePaymentAdapter::new(StripeConfig::new(
            payment.stripe_api_key.clone(),
        ))),
        webhook_verifier: StripeWebhookVerifier::new(Some(payment.stripe_webhook_secret.clone()))
            .with_tolerance_secs(payment.webhook_tolerance_secs),
        require_livemode: payment.require_livemode,
        public_base_url: config.server.public_base_url().to_string(),
    };

    let app = billing_router()
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Billing service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `RUST_LOG` wins over the configured filter; JSON output in production.
fn init_tracing(server: &ServerConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn connect_postgres(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn SubscriptionStore>, Arc<dyn WebhookEventRepository>), BoxError> {
    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok((
        Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        Arc::new(PostgresWebhookEventRepository::new(pool)),
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
