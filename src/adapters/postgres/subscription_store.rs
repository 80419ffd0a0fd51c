//! PostgreSQL implementation of SubscriptionStore.
//!
//! Compare-and-set uses the `version` column: inserts are
//! `ON CONFLICT DO NOTHING`, updates carry `WHERE version = $expected`.
//! Zero affected rows means another writer got there first.
//!
//! The partial unique index on `customer_id` keeps a billing identity with
//! one user; CHECK constraints mirror `SubscriptionRecord::check_invariants`.

use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, EventId, SubscriptionId, Timestamp, UserId,
};
use crate::domain::subscription::SubscriptionRecord;
use crate::ports::{SubscriptionStore, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const SELECT_COLUMNS: &str = r#"
    SELECT user_id, customer_id, subscription_id, status, plan,
           last_event_id, updated_at, version
    FROM subscriptions
"#;

const CUSTOMER_ID_INDEX: &str = "subscriptions_customer_id_key";

const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Creates a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription record.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: String,
    customer_id: Option<String>,
    subscription_id: Option<String>,
    status: String,
    plan: String,
    last_event_id: Option<String>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRecord {
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            customer_id: row.customer_id.map(CustomerId::new).transpose().map_err(corrupt)?,
            subscription_id: row
                .subscription_id
                .map(SubscriptionId::new)
                .transpose()
                .map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            plan: row.plan.parse().map_err(corrupt)?,
            last_event_id: row.last_event_id.map(EventId::new).transpose().map_err(corrupt)?,
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn corrupt(err: impl std::fmt::Display) -> DomainError {
    DomainError::database(format!("Invalid subscription row: {}", err))
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, err))
}

/// How a rejected write maps onto the port contract.
#[derive(Debug, PartialEq, Eq)]
enum WriteRejection {
    CustomerTaken,
    Invariant,
    Other,
}

fn classify_rejection(code: Option<&str>, constraint: Option<&str>) -> WriteRejection {
    match (code, constraint) {
        (Some(UNIQUE_VIOLATION), Some(CUSTOMER_ID_INDEX)) => WriteRejection::CustomerTaken,
        (Some(CHECK_VIOLATION), _) => WriteRejection::Invariant,
        _ => WriteRejection::Other,
    }
}

fn write_failure(err: sqlx::Error) -> Result<UpsertOutcome, DomainError> {
    let rejection = match err.as_database_error() {
        Some(db) => classify_rejection(db.code().as_deref(), db.constraint()),
        None => WriteRejection::Other,
    };
    match rejection {
        WriteRejection::CustomerTaken => Ok(UpsertOutcome::CustomerTaken),
        WriteRejection::Invariant => Err(DomainError::new(
            ErrorCode::ValidationFailed,
            format!("Subscription record rejected by constraint: {}", err),
        )),
        WriteRejection::Other => Err(db_error("Failed to write subscription", err)),
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE user_id = $1", SELECT_COLUMNS))
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE subscription_id = $1", SELECT_COLUMNS))
                .bind(subscription_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn upsert(&self, record: &SubscriptionRecord) -> Result<UpsertOutcome, DomainError> {
        record.check_invariants()?;

        let customer_id = record.customer_id.as_ref().map(CustomerId::as_str);
        let subscription_id = record.subscription_id.as_ref().map(SubscriptionId::as_str);
        let last_event_id = record.last_event_id.as_ref().map(EventId::as_str);

        let executed = if record.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO subscriptions (
                    user_id, customer_id, subscription_id, status, plan,
                    last_event_id, updated_at, version
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(record.user_id.as_str())
            .bind(customer_id)
            .bind(subscription_id)
            .bind(record.status.as_str())
            .bind(record.plan.as_str())
            .bind(last_event_id)
            .bind(record.updated_at.as_datetime())
            .execute(&self.pool)
            .await
        } else {
            // customer_id is only filled when still NULL.
            sqlx::query(
                r#"
                UPDATE subscriptions SET
                    customer_id = COALESCE(customer_id, $2),
                    subscription_id = $3,
                    status = $4,
                    plan = $5,
                    last_event_id = $6,
                    updated_at = $7,
                    version = version + 1
                WHERE user_id = $1 AND version = $8
                "#,
            )
            .bind(record.user_id.as_str())
            .bind(customer_id)
            .bind(subscription_id)
            .bind(record.status.as_str())
            .bind(record.plan.as_str())
            .bind(last_event_id)
            .bind(record.updated_at.as_datetime())
            .bind(record.version)
            .execute(&self.pool)
            .await
        };
        let result = match executed {
            Ok(result) => result,
            Err(err) => return write_failure(err),
        };

        if result.rows_affected() == 0 {
            return Ok(UpsertOutcome::Conflict);
        }

        Ok(UpsertOutcome::Written {
            version: record.version + 1,
        })
    }
}
